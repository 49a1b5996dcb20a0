//! Binary entry point for the `rdsctl` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use rdsctl::{
    AppConfig, ConfigError, ControllerError, DescribeQuery, InstanceController, InstanceFile,
    ProvisionOrchestrator, RdsBackend, RunError, SecretError, SecretResolver, SecretsManagerStore,
    report,
};

mod cli;

use cli::{Cli, Command, DescribeCommand};

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;
const EXIT_SECRET_FETCH: i32 = 3;
const EXIT_SECRET_DECODE: i32 = 4;
const EXIT_CREATE: i32 = 5;
const EXIT_DELETE: i32 = 6;
const EXIT_TIMEOUT: i32 = 7;
const EXIT_DESCRIBE: i32 = 8;
const EXIT_CANCELLED: i32 = 130;

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Run(#[from] RunError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl CliError {
    const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => EXIT_CONFIG,
            Self::Output(_) => EXIT_FAILURE,
            Self::Run(RunError::Secret(SecretError::Fetch { .. })) => EXIT_SECRET_FETCH,
            Self::Run(RunError::Secret(SecretError::Decode { .. })) => EXIT_SECRET_DECODE,
            Self::Run(RunError::Cancelled { .. }) => EXIT_CANCELLED,
            Self::Run(RunError::Controller(err)) => controller_exit_code(err),
        }
    }
}

const fn controller_exit_code(err: &ControllerError) -> i32 {
    match err {
        ControllerError::Cancelled { .. } => EXIT_CANCELLED,
        ControllerError::WaitBudget { .. } => EXIT_CONFIG,
        ControllerError::Timeout { .. } => EXIT_TIMEOUT,
        ControllerError::Describe { .. } => EXIT_DESCRIBE,
        ControllerError::Create { .. }
        | ControllerError::Delete { .. }
        | ControllerError::FailedState { .. } => match err.operation() {
            rdsctl::Operation::Create => EXIT_CREATE,
            rdsctl::Operation::Delete => EXIT_DELETE,
            rdsctl::Operation::Describe => EXIT_DESCRIBE,
        },
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing();

    let cancel = CancellationToken::new();
    let watcher = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            watcher.cancel();
        }
    });

    let exit_code = match dispatch(cli, &cancel).await {
        Ok(()) => 0,
        Err(err) => {
            error!("{err}");
            err.exit_code()
        }
    };

    process::exit(exit_code);
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

/// Settings and the instance definition for one invocation.
struct Invocation {
    config: AppConfig,
    file: InstanceFile,
    secret_name: String,
}

/// Loads settings, applies CLI overrides, and reads the instance definition.
/// No network access happens here.
fn prepare(cli: &Cli) -> Result<Invocation, CliError> {
    let mut config = AppConfig::load_without_cli_args()?;
    if let Some(path) = &cli.config {
        config.instance_config.clone_from(path);
    }
    if let Some(name) = &cli.secret_name {
        config.secret_name = Some(name.clone());
    }
    config.validate()?;

    let file = InstanceFile::load(&config.instance_config_path())?;
    let secret_name = config
        .secret_name
        .as_deref()
        .map_or_else(|| file.secret_name(), str::trim)
        .to_owned();
    Ok(Invocation {
        config,
        file,
        secret_name,
    })
}

fn describe_query(args: &DescribeCommand, invocation: &Invocation) -> DescribeQuery {
    let query = if args.all {
        DescribeQuery::all()
    } else {
        DescribeQuery::by_identifier(
            args.identifier
                .clone()
                .unwrap_or_else(|| invocation.file.options().db_instance_identifier.clone()),
        )
    };
    query.with_max_records(invocation.config.describe_max_records)
}

async fn dispatch(cli: Cli, cancel: &CancellationToken) -> Result<(), CliError> {
    let invocation = prepare(&cli)?;

    let sdk_config = invocation.config.sdk_config().await;
    let controller = InstanceController::new(RdsBackend::new(aws_sdk_rds::Client::new(
        &sdk_config,
    )))
    .with_policy(invocation.config.poll_policy());
    let resolver = SecretResolver::new(SecretsManagerStore::new(
        aws_sdk_secretsmanager::Client::new(&sdk_config),
    ));
    let orchestrator = ProvisionOrchestrator::new(controller, resolver);

    let options = invocation.file.options();
    let rendered = match cli.command.unwrap_or(Command::Create) {
        Command::Create => report::render_created(
            &orchestrator
                .create(options, &invocation.secret_name, cancel)
                .await?,
        ),
        Command::Delete => report::render_deleted(
            &orchestrator
                .delete(options, &invocation.secret_name, cancel)
                .await?,
        ),
        Command::Describe(args) => report::render_instances(
            &orchestrator
                .describe(&describe_query(&args, &invocation), cancel)
                .await?,
        ),
    };

    writeln!(io::stdout(), "{rendered}")?;
    Ok(())
}
