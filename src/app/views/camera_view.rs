use std::time::Duration;

use egui::{Align2, Color32, FontId, TextureHandle, TextureOptions};

use crate::app::views::View;
use crate::pipeline::{CaptureState, DevicePhase, PreviewFrame};

pub fn mode_caption(auto_capture_enabled: bool, interval: Duration) -> String {
    if auto_capture_enabled {
        format!("Auto-analyzing every {}s", interval.as_secs())
    } else {
        "Manual Capture".to_string()
    }
}

pub fn placeholder(phase: DevicePhase) -> &'static str {
    match phase {
        DevicePhase::Idle => "Camera off",
        DevicePhase::Requesting => "Starting camera...",
        DevicePhase::Active => "Waiting for the first frame...",
        DevicePhase::PermissionDenied => "Camera Access Denied",
    }
}

/// Live camera feed with the analysing overlay and mode caption. Kept across
/// repaints so the texture is only re-uploaded when a new frame arrives.
pub struct CameraView {
    texture: Option<TextureHandle>,
    shown_sequence: u64,
    phase: DevicePhase,
    analyzing: bool,
    caption: String,
}

impl CameraView {
    pub fn new() -> Self {
        Self {
            texture: None,
            shown_sequence: 0,
            phase: DevicePhase::Idle,
            analyzing: false,
            caption: String::new(),
        }
    }

    pub fn refresh(
        &mut self,
        ctx: &egui::Context,
        frame: Option<&PreviewFrame>,
        state: &CaptureState,
        auto_interval: Duration,
    ) {
        self.phase = state.device_phase;
        self.analyzing = state.in_flight;
        self.caption = mode_caption(state.auto_capture_enabled, auto_interval);

        match frame {
            Some(frame) if frame.sequence != self.shown_sequence => {
                let image = egui::ColorImage::from_rgb(
                    [frame.image.width() as usize, frame.image.height() as usize],
                    frame.image.as_raw().as_slice(),
                );
                match &mut self.texture {
                    Some(texture) => texture.set(image, TextureOptions::default()),
                    None => {
                        self.texture =
                            Some(ctx.load_texture("camera_preview", image, TextureOptions::default()))
                    }
                }
                self.shown_sequence = frame.sequence;
            }
            Some(_) => {}
            None => {
                self.texture = None;
                self.shown_sequence = 0;
            }
        }
    }
}

impl Default for CameraView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for CameraView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            match &self.texture {
                Some(texture) => {
                    let response = ui.add(
                        egui::Image::new(texture)
                            .max_width(ui.available_width())
                            .maintain_aspect_ratio(true),
                    );
                    if self.analyzing {
                        let rect = response.rect;
                        let painter = ui.painter();
                        painter.rect_filled(rect, 0.0, Color32::from_black_alpha(140));
                        painter.text(
                            rect.center(),
                            Align2::CENTER_CENTER,
                            "Analyzing Posture...",
                            FontId::proportional(20.0),
                            Color32::WHITE,
                        );
                    }
                }
                None => {
                    ui.label(placeholder(self.phase));
                    if self.analyzing {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Analyzing Posture...");
                        });
                    }
                }
            }
            ui.label(&self.caption);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caption_names_the_interval_in_auto_mode() {
        assert_eq!(
            mode_caption(true, Duration::from_secs(10)),
            "Auto-analyzing every 10s"
        );
        assert_eq!(mode_caption(false, Duration::from_secs(10)), "Manual Capture");
    }

    #[test]
    fn placeholder_follows_the_camera_phase() {
        assert_eq!(placeholder(DevicePhase::PermissionDenied), "Camera Access Denied");
        assert_eq!(placeholder(DevicePhase::Requesting), "Starting camera...");
    }
}
