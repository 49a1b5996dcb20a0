//! Time source used by wait loops.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

/// Future returned by [`Clock::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Supplies the current instant and a way to wait.
///
/// Tests swap in a manual clock so a twenty-minute wait runs instantly.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;

    /// Waits for `duration` to pass.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// Wall clock backed by Tokio's timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}
