//! Build script rendering the `rdsctl` manual pages.
//!
//! Writes `rdsctl.1` plus one `rdsctl-<subcommand>.1` page per operation
//! into the build output directory.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

fn render(command: clap::Command, target: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut buffer = Vec::new();
    Man::new(command).render(&mut buffer)?;
    fs::write(target, buffer)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    writeln!(stdout, "cargo:rerun-if-changed=build.rs")?;
    writeln!(stdout, "cargo:rerun-if-changed=src/cli/mod.rs")?;

    let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::NotFound, "OUT_DIR was not set")
    })?);

    let command = cli::Cli::command();
    for sub in command.get_subcommands() {
        let target = out_dir.join(format!("rdsctl-{}.1", sub.get_name()));
        render(sub.clone(), &target)?;
    }
    render(command, &out_dir.join("rdsctl.1"))
}
