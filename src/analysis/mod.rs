pub mod client;
pub mod endpoint;
pub mod gemini;
pub mod prompt;
pub mod service;
pub mod types;

pub use client::AnalysisClient;
pub use endpoint::{InferenceEndpoint, InferenceRequest};
pub use gemini::GeminiEndpoint;
pub use service::AnalysisService;
pub use types::{PostureAnalysis, PostureStatus, ScoreBand};
