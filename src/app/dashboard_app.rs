use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::app::views::{View, camera_view::CameraView, result_view::ResultView};
use crate::error::AppError;
use crate::pipeline::{CaptureOrchestrator, CaptureState, CaptureTrigger, DevicePhase, PreviewFrame};

const TITLE: &str = "Posture Coach";
const PREVIEW_PERIOD: Duration = Duration::from_millis(100);

/// Which controls the top bar offers for a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub show_check_now: bool,
    pub check_now_enabled: bool,
    pub show_retry: bool,
}

impl Controls {
    pub fn for_state(state: &CaptureState) -> Self {
        Self {
            show_check_now: !state.auto_capture_enabled,
            check_now_enabled: state.can_capture(),
            show_retry: state.device_phase == DevicePhase::PermissionDenied,
        }
    }
}

pub struct DashboardApp {
    state_rx: watch::Receiver<CaptureState>,
    preview_rx: watch::Receiver<Option<PreviewFrame>>,
    camera_view: CameraView,
    orchestrator: CaptureOrchestrator,
    runtime: Handle,
    auto_capture: bool,
}

impl DashboardApp {
    pub fn new(orchestrator: CaptureOrchestrator, runtime: Handle) -> Self {
        let state_rx = orchestrator.subscribe();
        let auto_capture = state_rx.borrow().auto_capture_enabled;
        Self {
            state_rx,
            preview_rx: orchestrator.subscribe_preview(),
            camera_view: CameraView::new(),
            orchestrator,
            runtime,
            auto_capture,
        }
    }

    /// Blocks the calling thread until the window is closed.
    pub fn start_gui(orchestrator: CaptureOrchestrator, runtime: Handle) -> Result<(), AppError> {
        let options = eframe::NativeOptions {
            viewport: egui::ViewportBuilder::default()
                .with_inner_size(egui::vec2(1080.0, 640.0))
                .with_title(TITLE),
            ..Default::default()
        };

        eframe::run_native(
            TITLE,
            options,
            Box::new(move |cc| {
                // repaint as soon as the store or the feed changes, not only on input
                let ctx = cc.egui_ctx.clone();
                let mut changes = orchestrator.subscribe();
                runtime.spawn(async move {
                    while changes.changed().await.is_ok() {
                        ctx.request_repaint();
                    }
                });
                let ctx = cc.egui_ctx.clone();
                let mut frames = orchestrator.subscribe_preview();
                runtime.spawn(async move {
                    while frames.changed().await.is_ok() {
                        ctx.request_repaint();
                    }
                });
                {
                    let _guard = runtime.enter();
                    orchestrator.start_preview(PREVIEW_PERIOD);
                }
                Ok(Box::new(DashboardApp::new(orchestrator, runtime)))
            }),
        )
        .map_err(|e| AppError::Ui(e.to_string()))
    }

    fn toggle_auto_capture(&self, enabled: bool) {
        info!("Continuous analysis {}", if enabled { "on" } else { "off" });
        let _guard = self.runtime.enter();
        self.orchestrator.set_auto_capture(enabled);
    }

    fn check_now(&self) {
        let orchestrator = self.orchestrator.clone();
        self.runtime.spawn(async move {
            let outcome = orchestrator.capture_now(CaptureTrigger::Manual).await;
            debug!("Manual capture finished: {:?}", outcome);
        });
    }

    fn retry_permission(&self) {
        let orchestrator = self.orchestrator.clone();
        self.runtime.spawn(async move {
            orchestrator.retry_device().await;
        });
    }

    fn draw_controls(&mut self, ui: &mut egui::Ui, state: &CaptureState) {
        let controls = Controls::for_state(state);
        ui.horizontal(|ui| {
            if ui
                .checkbox(&mut self.auto_capture, "Continuous Analysis")
                .changed()
            {
                self.toggle_auto_capture(self.auto_capture);
            }

            if controls.show_check_now
                && ui
                    .add_enabled(controls.check_now_enabled, egui::Button::new("Check Now"))
                    .clicked()
            {
                self.check_now();
            }

            if controls.show_retry && ui.button("Retry Permission").clicked() {
                self.retry_permission();
            }

            ui.separator();
            ui.label(state.device_phase.label());
            if state.in_flight {
                ui.spinner();
            }
        });
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let state = self.state_rx.borrow_and_update().clone();
        self.auto_capture = state.auto_capture_enabled;

        egui::TopBottomPanel::top("controls").show(ctx, |ui| {
            ui.heading(TITLE);
            ui.separator();
            self.draw_controls(ui, &state);
        });

        let frame = self.preview_rx.borrow_and_update().clone();
        self.camera_view.refresh(
            ctx,
            frame.as_ref(),
            &state,
            self.orchestrator.auto_interval(),
        );
        egui::SidePanel::left("camera")
            .resizable(true)
            .default_width(420.0)
            .show(ctx, |ui| {
                self.camera_view.draw(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            if state.device_phase == DevicePhase::PermissionDenied {
                ui.label("Camera access was denied. Grant access and press Retry Permission.");
                ui.separator();
            }
            let mut result_view = ResultView::new(state.clone());
            result_view.draw(ui);
        });

        // keeps the "last checked" clock and spinner moving
        ctx.request_repaint_after(Duration::from_millis(500));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_now_is_hidden_in_auto_mode() {
        let state = CaptureState {
            device_phase: DevicePhase::Active,
            auto_capture_enabled: true,
            ..Default::default()
        };
        let controls = Controls::for_state(&state);
        assert!(!controls.show_check_now);
        assert!(controls.check_now_enabled);
    }

    #[test]
    fn check_now_needs_an_idle_active_camera() {
        let mut state = CaptureState::default();
        assert!(!Controls::for_state(&state).check_now_enabled);

        state.device_phase = DevicePhase::Active;
        assert!(Controls::for_state(&state).check_now_enabled);

        state.in_flight = true;
        assert!(!Controls::for_state(&state).check_now_enabled);
    }

    #[test]
    fn retry_only_after_denial() {
        let mut state = CaptureState::default();
        assert!(!Controls::for_state(&state).show_retry);
        state.device_phase = DevicePhase::PermissionDenied;
        let controls = Controls::for_state(&state);
        assert!(controls.show_retry);
        assert!(!controls.check_now_enabled);
    }
}
