use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

const DEFAULT_CONFIG_FILE: &str = "posture-coach";
const CONFIG_PATH_VAR: &str = "POSTURE_COACH_CONFIG";
const API_KEY_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub camera: CameraSettings,
    pub analysis: AnalysisSettings,
    pub capture: CaptureSettings,
    pub ui: UiSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSource {
    /// A Video4Linux camera, `/dev/video<device_index>`.
    Webcam,
    /// Synthetic test card, useful without a camera attached.
    Pattern,
    /// A still image on disk, kept fresh by an external frame grabber.
    File,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraSettings {
    pub source: CameraSource,
    pub device_index: usize,
    pub path: Option<PathBuf>,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl AnalysisSettings {
    /// `None` when the timeout is disabled (`timeout_secs = 0`).
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureSettings {
    pub auto_interval_secs: u64,
    pub auto_start: bool,
}

impl CaptureSettings {
    pub fn auto_interval(&self) -> Duration {
        Duration::from_secs(self.auto_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UiSettings {
    pub headless: bool,
    pub sound: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            camera: CameraSettings {
                source: CameraSource::Webcam,
                device_index: 0,
                path: None,
                ideal_width: 1280,
                ideal_height: 720,
                jpeg_quality: 80,
            },
            analysis: AnalysisSettings {
                base_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-3-pro-preview".to_string(),
                api_key: None,
                timeout_secs: 60,
            },
            capture: CaptureSettings {
                auto_interval_secs: 10,
                auto_start: false,
            },
            ui: UiSettings {
                headless: false,
                sound: true,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}

impl Settings {
    /// Loads defaults, then the optional config file, then `POSTURE__*` environment overrides.
    pub fn load() -> Result<Self, AppError> {
        let path = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let defaults = Settings::default();

        let config = Config::builder()
            .set_default("camera.source", "webcam")?
            .set_default("camera.device_index", defaults.camera.device_index as i64)?
            .set_default("camera.ideal_width", defaults.camera.ideal_width as i64)?
            .set_default("camera.ideal_height", defaults.camera.ideal_height as i64)?
            .set_default("camera.jpeg_quality", defaults.camera.jpeg_quality as i64)?
            .set_default("analysis.base_url", defaults.analysis.base_url)?
            .set_default("analysis.model", defaults.analysis.model)?
            .set_default("analysis.timeout_secs", defaults.analysis.timeout_secs as i64)?
            .set_default(
                "capture.auto_interval_secs",
                defaults.capture.auto_interval_secs as i64,
            )?
            .set_default("capture.auto_start", defaults.capture.auto_start)?
            .set_default("ui.headless", defaults.ui.headless)?
            .set_default("ui.sound", defaults.ui.sound)?
            .set_default("logging.level", defaults.logging.level)?
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("POSTURE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut settings: Settings = config.try_deserialize()?;
        if settings.analysis.api_key.is_none() {
            settings.analysis.api_key = API_KEY_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty());
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.capture.auto_interval_secs == 0 {
            return Err(AppError::Config(
                "Auto capture interval must be greater than 0".to_string(),
            ));
        }

        if self.camera.jpeg_quality == 0 || self.camera.jpeg_quality > 100 {
            return Err(AppError::Config(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.camera.ideal_width == 0 || self.camera.ideal_height == 0 {
            return Err(AppError::Config(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.camera.source == CameraSource::File && self.camera.path.is_none() {
            return Err(AppError::Config(
                "camera.path is required when camera.source = \"file\"".to_string(),
            ));
        }

        Ok(())
    }

    pub fn log_level(&self) -> tracing::Level {
        self.logging.level.parse().unwrap_or(tracing::Level::INFO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.capture.auto_interval(), Duration::from_secs(10));
        assert_eq!(settings.analysis.timeout(), Some(Duration::from_secs(60)));
    }

    #[test]
    fn zero_timeout_disables_it() {
        let mut settings = Settings::default();
        settings.analysis.timeout_secs = 0;
        assert_eq!(settings.analysis.timeout(), None);
    }

    #[test]
    fn rejects_zero_interval() {
        let mut settings = Settings::default();
        settings.capture.auto_interval_secs = 0;
        assert!(matches!(settings.validate(), Err(AppError::Config(_))));
    }

    #[test]
    fn webcam_is_the_default_camera() {
        let settings = Settings::default();
        assert_eq!(settings.camera.source, CameraSource::Webcam);
        assert_eq!(settings.camera.device_index, 0);
    }

    #[test]
    fn file_source_needs_a_path() {
        let mut settings = Settings::default();
        settings.camera.source = CameraSource::File;
        assert!(settings.validate().is_err());

        settings.camera.path = Some(PathBuf::from("/tmp/frame.jpg"));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn unknown_log_level_falls_back_to_info() {
        let mut settings = Settings::default();
        settings.logging.level = "chatty".to_string();
        assert_eq!(settings.log_level(), tracing::Level::INFO);

        settings.logging.level = "debug".to_string();
        assert_eq!(settings.log_level(), tracing::Level::DEBUG);
    }
}
