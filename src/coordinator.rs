use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::{
    analysis::{AnalysisClient, GeminiEndpoint, InferenceEndpoint},
    config::{CameraSource, Settings},
    error::AppError,
    intake::{CaptureConstraints, CaptureDevice, FrameSource, PatternDevice, StillImageDevice},
    notify::{CompletionCue, SilentCue, SpeakerSink, ToneCue},
    pipeline::{CaptureOrchestrator, CaptureState, DevicePhase, ResultStore},
};

/// Owns the capture pipeline for one application session.
pub struct Coordinator {
    orchestrator: CaptureOrchestrator,
    auto_start: bool,
}

impl Coordinator {
    fn new(orchestrator: CaptureOrchestrator, auto_start: bool) -> Self {
        Self {
            orchestrator,
            auto_start,
        }
    }

    /// Opens the camera and, when configured, switches auto capture on.
    pub async fn start(&self) -> DevicePhase {
        let phase = self.orchestrator.open_device().await;
        if phase == DevicePhase::Active && self.auto_start {
            self.orchestrator.set_auto_capture(true);
        }
        phase
    }

    pub fn orchestrator(&self) -> CaptureOrchestrator {
        self.orchestrator.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.orchestrator.subscribe()
    }

    pub async fn shutdown(&self) {
        info!("Shutting down capture pipeline");
        self.orchestrator.shutdown().await;
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        // The camera itself is released when the last orchestrator handle drops.
        self.orchestrator.set_auto_capture(false);
    }
}

pub struct CoordinatorBuilder {
    settings: Settings,
    device: Option<Box<dyn CaptureDevice>>,
    endpoint: Option<Arc<dyn InferenceEndpoint>>,
    cue: Option<Arc<dyn CompletionCue>>,
}

impl CoordinatorBuilder {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            device: None,
            endpoint: None,
            cue: None,
        }
    }

    // Replaces the camera chosen by `camera.source`.
    pub fn device(mut self, device: Box<dyn CaptureDevice>) -> Self {
        self.device = Some(device);
        self
    }

    // Replaces the Gemini endpoint.
    pub fn endpoint(mut self, endpoint: Arc<dyn InferenceEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    // Replaces the cue chosen by `ui.sound`.
    pub fn cue(mut self, cue: Arc<dyn CompletionCue>) -> Self {
        self.cue = Some(cue);
        self
    }

    pub fn build(self) -> Result<Coordinator, AppError> {
        let settings = self.settings;
        settings.validate()?;

        let device = match self.device {
            Some(device) => device,
            None => Self::device_from(&settings)?,
        };
        let endpoint = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Self::endpoint_from(&settings)?,
        };
        let cue = self.cue.unwrap_or_else(|| {
            if settings.ui.sound {
                Arc::new(ToneCue::new(SpeakerSink::new()))
            } else {
                Arc::new(SilentCue)
            }
        });

        let constraints = CaptureConstraints {
            ideal_width: settings.camera.ideal_width,
            ideal_height: settings.camera.ideal_height,
        };
        let frame_source = FrameSource::new(device, constraints, settings.camera.jpeg_quality);
        let client = AnalysisClient::new(endpoint).with_timeout(settings.analysis.timeout());
        let orchestrator = CaptureOrchestrator::new(
            frame_source,
            client,
            ResultStore::new(),
            cue,
            settings.capture.auto_interval(),
        );
        Ok(Coordinator::new(orchestrator, settings.capture.auto_start))
    }

    fn device_from(settings: &Settings) -> Result<Box<dyn CaptureDevice>, AppError> {
        match settings.camera.source {
            #[cfg(all(target_os = "linux", feature = "webcam"))]
            CameraSource::Webcam => Ok(Box::new(crate::intake::WebcamDevice::new(
                settings.camera.device_index,
            ))),
            #[cfg(not(all(target_os = "linux", feature = "webcam")))]
            CameraSource::Webcam => Err(AppError::Config(
                "camera.source = \"webcam\" needs Linux and the `webcam` feature".to_string(),
            )),
            CameraSource::Pattern => Ok(Box::new(PatternDevice::new())),
            CameraSource::File => {
                let path = settings.camera.path.clone().ok_or_else(|| {
                    AppError::Config("camera.path is not set".to_string())
                })?;
                Ok(Box::new(StillImageDevice::new(path)))
            }
        }
    }

    fn endpoint_from(settings: &Settings) -> Result<Arc<dyn InferenceEndpoint>, AppError> {
        let api_key = settings.analysis.api_key.clone().ok_or_else(|| {
            AppError::Config(
                "No API key: set analysis.api_key, GEMINI_API_KEY or API_KEY".to_string(),
            )
        })?;
        Ok(Arc::new(GeminiEndpoint::new(
            settings.analysis.base_url.clone(),
            settings.analysis.model.clone(),
            api_key,
            settings.analysis.timeout(),
        )))
    }
}
