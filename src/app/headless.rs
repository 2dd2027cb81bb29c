use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info, warn};

use crate::coordinator::Coordinator;
use crate::error::AppError;
use crate::pipeline::{CaptureState, DevicePhase};

/// Log lines describing what changed between two observed states.
pub fn describe_change(previous: &CaptureState, current: &CaptureState) -> Vec<String> {
    let mut lines = Vec::new();
    if previous.device_phase != current.device_phase {
        lines.push(format!("Camera: {}", current.device_phase.label()));
    }
    if previous.auto_capture_enabled != current.auto_capture_enabled {
        lines.push(format!(
            "Continuous analysis {}",
            if current.auto_capture_enabled { "on" } else { "off" }
        ));
    }
    if !previous.in_flight && current.in_flight {
        lines.push("Analyzing posture...".to_string());
    }
    if current.last_error.is_some() && current.last_error != previous.last_error {
        if let Some(message) = &current.last_error {
            lines.push(format!("Analysis failed: {}", message));
        }
    }
    if current.last_run != previous.last_run {
        if let Some(analysis) = &current.last_result {
            lines.push(format!(
                "Score {} ({}): {}",
                analysis.score,
                analysis.status.as_str(),
                analysis.summary
            ));
            for issue in &analysis.issues {
                lines.push(format!("  issue: {}", issue));
            }
            for recommendation in &analysis.recommendations {
                lines.push(format!("  try: {}", recommendation));
            }
        }
    }
    lines
}

/// Runs without a window, logging every state change until Ctrl-C.
pub async fn run(coordinator: &Coordinator) -> Result<(), AppError> {
    let mut previous = CaptureState::default();
    let mut updates = WatchStream::new(coordinator.subscribe());

    let phase = coordinator.start().await;
    if phase == DevicePhase::Active && !coordinator.subscribe().borrow().auto_capture_enabled {
        warn!("Continuous analysis is off; set capture.auto_start = true to analyse in headless mode");
    }

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                    coordinator.shutdown().await;
                    return Err(AppError::Io(e));
                }
                info!("Ctrl-C received");
                break;
            }
            next = updates.next() => {
                let Some(state) = next else { break };
                for line in describe_change(&previous, &state) {
                    info!("{}", line);
                }
                previous = state;
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
