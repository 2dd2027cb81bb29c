use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::pipeline::orchestrator::{CaptureOrchestrator, CaptureTrigger, Inner};

/// Repeating trigger: one capture attempt per period, counted from when the
/// timer started rather than from when the previous call finished. Stopped on
/// drop.
pub(crate) struct AutoCaptureTimer {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl AutoCaptureTimer {
    pub(crate) fn start(inner: Weak<Inner>, period: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(Self::run(inner, period, cancel_token.clone()));
        info!("Auto capture every {}s", period.as_secs_f32());
        Self { cancel_token, task }
    }

    async fn run(inner: Weak<Inner>, period: Duration, cancel_token: CancellationToken) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    let orchestrator = CaptureOrchestrator::from_inner(inner);
                    debug!("Auto capture tick");
                    // The tick never waits on the call, so a long call skips later ticks.
                    tokio::spawn(async move {
                        orchestrator.capture_now(CaptureTrigger::Auto).await;
                    });
                }
            }
        }
        debug!("Auto capture timer stopped");
    }

    pub(crate) fn stop(&self) {
        self.cancel_token.cancel();
        self.task.abort();
    }
}

impl Drop for AutoCaptureTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
