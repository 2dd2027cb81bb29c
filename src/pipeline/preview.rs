use std::sync::{Arc, Weak};
use std::time::Duration;

use image::RgbImage;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::pipeline::orchestrator::{CaptureOrchestrator, Inner};

/// Latest live frame for display. `sequence` grows by one per new frame so a
/// view can tell whether it needs a fresh texture.
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub sequence: u64,
    pub image: Arc<RgbImage>,
}

/// Keeps the preview channel fed while the camera is active. Stopped on drop.
pub(crate) struct PreviewPump {
    cancel_token: CancellationToken,
    task: JoinHandle<()>,
}

impl PreviewPump {
    pub(crate) fn start(inner: Weak<Inner>, period: Duration) -> Self {
        let cancel_token = CancellationToken::new();
        let task = tokio::spawn(Self::run(inner, period, cancel_token.clone()));
        debug!("Preview every {}ms", period.as_millis());
        Self { cancel_token, task }
    }

    async fn run(inner: Weak<Inner>, period: Duration, cancel_token: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => break,
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    CaptureOrchestrator::from_inner(inner).refresh_preview().await;
                }
            }
        }
        debug!("Preview stopped");
    }

    pub(crate) fn stop(&self) {
        self.cancel_token.cancel();
        self.task.abort();
    }
}

impl Drop for PreviewPump {
    fn drop(&mut self) {
        self.stop();
    }
}
