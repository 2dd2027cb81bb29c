use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::analysis::PostureAnalysis;
use crate::pipeline::state::{CaptureState, DevicePhase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InFlight,
    DeviceNotActive,
    AutoCaptureDisabled,
    NoImage,
}

/// Holds the latest [`CaptureState`]. Readers subscribe; only the capture
/// orchestrator writes.
#[derive(Clone)]
pub struct ResultStore {
    state_tx: Arc<watch::Sender<CaptureState>>,
}

impl ResultStore {
    pub fn new() -> Self {
        let (state_tx, _) = watch::channel(CaptureState::default());
        Self {
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CaptureState> {
        self.state_tx.subscribe()
    }

    pub fn snapshot(&self) -> CaptureState {
        self.state_tx.borrow().clone()
    }

    pub(crate) fn set_phase(&self, phase: DevicePhase) {
        self.state_tx.send_if_modified(|state| {
            let changed = state.device_phase != phase;
            state.device_phase = phase;
            changed
        });
    }

    /// Moves `Idle` or `PermissionDenied` to `Requesting`. Returns false when a
    /// request is already pending or the device is active.
    pub(crate) fn begin_device_request(&self) -> bool {
        self.state_tx.send_if_modified(|state| match state.device_phase {
            DevicePhase::Idle | DevicePhase::PermissionDenied => {
                state.device_phase = DevicePhase::Requesting;
                true
            }
            DevicePhase::Requesting | DevicePhase::Active => false,
        })
    }

    pub(crate) fn set_auto_capture(&self, enabled: bool) {
        self.state_tx.send_if_modified(|state| {
            let changed = state.auto_capture_enabled != enabled;
            state.auto_capture_enabled = enabled;
            changed
        });
    }

    /// Atomically claims the single in-flight slot and clears the last error.
    pub(crate) fn try_begin_analysis(&self) -> Result<(), SkipReason> {
        let mut outcome = Ok(());
        self.state_tx.send_if_modified(|state| {
            if state.in_flight {
                outcome = Err(SkipReason::InFlight);
                return false;
            }
            if state.device_phase != DevicePhase::Active {
                outcome = Err(SkipReason::DeviceNotActive);
                return false;
            }
            state.in_flight = true;
            state.last_error = None;
            true
        });
        outcome
    }

    pub(crate) fn complete_success(&self, analysis: PostureAnalysis, at: DateTime<Utc>) {
        self.state_tx.send_modify(|state| {
            state.last_result = Some(analysis);
            state.last_run = Some(at);
            state.last_error = None;
            state.in_flight = false;
        });
    }

    /// Records the failure; the previous result stays visible.
    pub(crate) fn complete_failure(&self, message: impl Into<String>) {
        let message = message.into();
        self.state_tx.send_modify(|state| {
            state.last_error = Some(message);
            state.in_flight = false;
        });
    }

    /// Frees the in-flight slot of a call that never completed.
    pub(crate) fn abandon_analysis(&self) {
        self.state_tx.send_if_modified(|state| {
            let was_in_flight = state.in_flight;
            state.in_flight = false;
            was_in_flight
        });
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}
