use async_trait::async_trait;

use crate::error::AnalysisFailure;

/// One multimodal content-generation request.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Raw base64 image bytes, no data URI prefix.
    pub image_base64: String,
    pub mime_type: String,
    pub instruction: String,
    pub response_schema: serde_json::Value,
}

/// A hosted vision-language model. Returns the generated text, or `None` when
/// the model produced no text at all.
#[async_trait]
pub trait InferenceEndpoint: Send + Sync {
    async fn generate(&self, request: InferenceRequest) -> Result<Option<String>, AnalysisFailure>;

    fn name(&self) -> &str;
}
