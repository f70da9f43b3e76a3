use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::debug;

/// A running interval task. Dropping the handle aborts the task, so every
/// owner teardown path stops the timer.
#[derive(Debug)]
pub struct PollHandle {
    handle: JoinHandle<()>,
    period: Duration,
}

impl PollHandle {
    /// Calls `on_tick` immediately and then once per `period` until it returns
    /// `false` or the handle is dropped. Must be called inside a tokio runtime.
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !on_tick() {
                    debug!("Poll owner is gone, stopping timer.");
                    break;
                }
            }
        });

        Self { handle, period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
