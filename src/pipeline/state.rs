use chrono::{DateTime, Utc};

use crate::analysis::PostureAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DevicePhase {
    #[default]
    Idle,
    Requesting,
    Active,
    /// Stays here until the user asks to retry.
    PermissionDenied,
}

impl DevicePhase {
    pub fn label(&self) -> &'static str {
        match self {
            DevicePhase::Idle => "Idle",
            DevicePhase::Requesting => "Requesting camera access",
            DevicePhase::Active => "Camera active",
            DevicePhase::PermissionDenied => "Camera access denied",
        }
    }
}

/// Everything the presentation layer observes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CaptureState {
    pub device_phase: DevicePhase,
    pub auto_capture_enabled: bool,
    pub in_flight: bool,
    pub last_result: Option<PostureAnalysis>,
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

impl CaptureState {
    /// Whether a manual "capture now" is currently accepted.
    pub fn can_capture(&self) -> bool {
        self.device_phase == DevicePhase::Active && !self.in_flight
    }
}
