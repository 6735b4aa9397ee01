use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

/// One period of wall time passed while the session was open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElapsedTick {
    pub secs: u64,
}

/// Cancellable periodic timer, once per second unless built with [`every`].
///
/// Shares nothing with the controller or the metronome: the owner receives
/// ticks from the channel and applies them.
///
/// [`every`]: ElapsedTicker::every
#[derive(Debug)]
pub struct ElapsedTicker {
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Default for ElapsedTicker {
    fn default() -> Self {
        Self::new()
    }
}

impl ElapsedTicker {
    #[must_use]
    pub fn new() -> Self {
        Self::every(Duration::from_secs(1))
    }

    /// A timer with a custom period; ticks report whole seconds, at least one.
    #[must_use]
    pub fn every(period: Duration) -> Self {
        Self { period, task: None }
    }

    /// Spawn the timer task and return its tick stream. Restarts a running timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> mpsc::Receiver<ElapsedTick> {
        self.stop();
        let (tx, rx) = mpsc::channel(16);
        let period = self.period;
        let tick = ElapsedTick {
            secs: period.as_secs().max(1),
        };

        self.task = Some(tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                if tx.send(tick).await.is_err() {
                    debug!("elapsed ticker receiver dropped");
                    break;
                }
            }
        }));
        rx
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}
