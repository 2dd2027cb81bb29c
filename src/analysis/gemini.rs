use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::analysis::endpoint::{InferenceEndpoint, InferenceRequest};
use crate::error::AnalysisFailure;

/// Google Gemini `generateContent` over HTTPS.
#[derive(Clone)]
pub struct GeminiEndpoint {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiEndpoint {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    pub fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

pub(crate) fn request_body(request: &InferenceRequest) -> Value {
    json!({
        "contents": [{
            "parts": [
                {
                    "inlineData": {
                        "mimeType": request.mime_type,
                        "data": request.image_base64,
                    }
                },
                { "text": request.instruction }
            ]
        }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": request.response_schema,
        }
    })
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Concatenated text parts of the first candidate, `None` when there are none.
pub(crate) fn response_text(body: &str) -> Result<Option<String>, AnalysisFailure> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| AnalysisFailure::new(format!("Unexpected inference response: {}", e)))?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();
    Ok((!text.trim().is_empty()).then_some(text))
}

fn status_failure(code: u16, body: &str) -> AnalysisFailure {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string());
    AnalysisFailure::new(format!("Inference endpoint returned {}: {}", code, detail))
}

#[async_trait]
impl InferenceEndpoint for GeminiEndpoint {
    async fn generate(&self, request: InferenceRequest) -> Result<Option<String>, AnalysisFailure> {
        let url = self.url();
        let body = request_body(&request).to_string();
        let agent = self.agent.clone();
        let api_key = self.api_key.clone();
        debug!("POST {} ({} bytes)", url, body.len());

        let response = tokio::task::spawn_blocking(move || {
            match agent
                .post(&url)
                .set("x-goog-api-key", &api_key)
                .set("Content-Type", "application/json")
                .send_string(&body)
            {
                Ok(response) => response
                    .into_string()
                    .map_err(|e| AnalysisFailure::new(format!("Failed to read inference response: {}", e))),
                Err(ureq::Error::Status(code, response)) => {
                    let body = response.into_string().unwrap_or_default();
                    Err(status_failure(code, &body))
                }
                Err(ureq::Error::Transport(transport)) => Err(AnalysisFailure::new(format!(
                    "Failed to reach inference endpoint: {}",
                    transport
                ))),
            }
        })
        .await
        .map_err(|e| AnalysisFailure::new(format!("Inference task failed: {}", e)))??;

        response_text(&response)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::prompt::{INSTRUCTION, response_schema};

    fn request() -> InferenceRequest {
        InferenceRequest {
            image_base64: "QUJD".to_string(),
            mime_type: "image/jpeg".to_string(),
            instruction: INSTRUCTION.to_string(),
            response_schema: response_schema(),
        }
    }

    #[test]
    fn url_joins_base_and_model() {
        let endpoint = GeminiEndpoint::new(
            "https://example.test/",
            "gemini-3-pro-preview",
            "key",
            None,
        );
        assert_eq!(
            endpoint.url(),
            "https://example.test/v1beta/models/gemini-3-pro-preview:generateContent"
        );
    }

    #[test]
    fn body_carries_image_instruction_and_schema() {
        let body = request_body(&request());
        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        assert_eq!(parts[1]["text"], INSTRUCTION);
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"], response_schema());
    }

    #[test]
    fn extracts_first_candidate_text() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        assert_eq!(response_text(body).unwrap().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn no_candidates_means_no_text() {
        assert_eq!(response_text(r#"{"candidates":[]}"#).unwrap(), None);
        assert_eq!(response_text(r#"{"promptFeedback":{}}"#).unwrap(), None);
        assert_eq!(
            response_text(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#).unwrap(),
            None
        );
    }

    #[test]
    fn status_errors_surface_the_api_message() {
        let failure = status_failure(403, r#"{"error":{"code":403,"message":"API key not valid"}}"#);
        assert_eq!(
            failure.message(),
            "Inference endpoint returned 403: API key not valid"
        );
        assert_eq!(
            status_failure(502, "Bad Gateway\n").message(),
            "Inference endpoint returned 502: Bad Gateway"
        );
    }
}
