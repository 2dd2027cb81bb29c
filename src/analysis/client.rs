use std::sync::Arc;
use std::time::{Duration, Instant};

use tower::timeout::{TimeoutLayer, error::Elapsed};
use tower::{BoxError, ServiceBuilder, ServiceExt};
use tracing::{error, info};

use crate::analysis::endpoint::InferenceEndpoint;
use crate::analysis::service::AnalysisService;
use crate::analysis::types::PostureAnalysis;
use crate::common::Snapshot;
use crate::error::AnalysisFailure;

/// Single-shot analysis: one remote call per invocation, no caching, no retries.
#[derive(Clone)]
pub struct AnalysisClient {
    endpoint: Arc<dyn InferenceEndpoint>,
    timeout: Option<Duration>,
}

impl AnalysisClient {
    pub fn new(endpoint: Arc<dyn InferenceEndpoint>) -> Self {
        Self {
            endpoint,
            timeout: None,
        }
    }

    /// Bounds each call; a call that outlives the bound fails.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn analyze(&self, snapshot: Snapshot) -> Result<PostureAnalysis, AnalysisFailure> {
        let snapshot_id = snapshot.id();
        let started = Instant::now();
        let service = ServiceBuilder::new()
            .option_layer(self.timeout.map(TimeoutLayer::new))
            .service(AnalysisService::new(self.endpoint.clone()));

        match service.oneshot(snapshot).await {
            Ok(analysis) => {
                info!(
                    "Snapshot {} analysed in {}ms: {} ({})",
                    snapshot_id,
                    started.elapsed().as_millis(),
                    analysis.score,
                    analysis.status.as_str()
                );
                Ok(analysis)
            }
            Err(e) => {
                let failure = self.to_failure(e);
                error!("Snapshot {} analysis failed: {}", snapshot_id, failure);
                Err(failure)
            }
        }
    }

    fn to_failure(&self, err: BoxError) -> AnalysisFailure {
        if err.is::<Elapsed>() {
            let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
            return AnalysisFailure::new(format!("Analysis timed out after {}s", secs));
        }
        match err.downcast::<AnalysisFailure>() {
            Ok(failure) => *failure,
            Err(other) => AnalysisFailure::new(other.to_string()),
        }
    }
}
