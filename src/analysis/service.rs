use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use tower::{BoxError, Service};
use tracing::debug;

use crate::analysis::endpoint::{InferenceEndpoint, InferenceRequest};
use crate::analysis::prompt::{INSTRUCTION, response_schema};
use crate::analysis::types::PostureAnalysis;
use crate::common::Snapshot;
use crate::common::snapshot::JPEG_MIME_TYPE;
use crate::error::AnalysisFailure;

/// Tower service turning one snapshot into one [`PostureAnalysis`].
/// Errors are boxed so the service stacks under `TimeoutLayer`.
#[derive(Clone)]
pub struct AnalysisService {
    endpoint: Arc<dyn InferenceEndpoint>,
}

impl AnalysisService {
    pub fn new(endpoint: Arc<dyn InferenceEndpoint>) -> Self {
        Self { endpoint }
    }
}

impl Service<Snapshot> for AnalysisService {
    type Response = PostureAnalysis;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, snapshot: Snapshot) -> Self::Future {
        let endpoint = self.endpoint.clone();
        Box::pin(async move {
            let request = InferenceRequest {
                image_base64: snapshot.payload().to_string(),
                mime_type: JPEG_MIME_TYPE.to_string(),
                instruction: INSTRUCTION.to_string(),
                response_schema: response_schema(),
            };
            debug!("Sending snapshot {} to {}", snapshot.id(), endpoint.name());
            let text = endpoint
                .generate(request)
                .await?
                .ok_or_else(AnalysisFailure::no_response)?;
            Ok::<_, BoxError>(PostureAnalysis::from_json(&text)?)
        })
    }
}
