use chrono::{DateTime, Local, Utc};
use egui::{Color32, RichText};

use crate::analysis::{PostureAnalysis, PostureStatus, ScoreBand};
use crate::app::views::View;
use crate::pipeline::CaptureState;

pub const NO_ISSUES: &str = "No specific issues detected.";
pub const NO_RECOMMENDATIONS: &str = "Keep up the great work!";

/// What the main area shows for a given state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResultPanel<'a> {
    Failed(&'a str),
    Analyzing,
    Ready,
    Analysis(&'a PostureAnalysis),
}

impl<'a> ResultPanel<'a> {
    pub fn for_state(state: &'a CaptureState) -> Self {
        if let Some(message) = state.last_error.as_deref() {
            return ResultPanel::Failed(message);
        }
        match &state.last_result {
            Some(analysis) => ResultPanel::Analysis(analysis),
            None if state.in_flight => ResultPanel::Analyzing,
            None => ResultPanel::Ready,
        }
    }
}

pub fn issue_lines(analysis: &PostureAnalysis) -> Vec<&str> {
    lines_or(&analysis.issues, NO_ISSUES)
}

pub fn recommendation_lines(analysis: &PostureAnalysis) -> Vec<&str> {
    lines_or(&analysis.recommendations, NO_RECOMMENDATIONS)
}

fn lines_or<'a>(items: &'a [String], fallback: &'a str) -> Vec<&'a str> {
    if items.is_empty() {
        vec![fallback]
    } else {
        items.iter().map(String::as_str).collect()
    }
}

pub fn format_last_run(last_run: Option<DateTime<Utc>>) -> String {
    match last_run {
        Some(at) => format!("Last checked at {}", at.with_timezone(&Local).format("%H:%M:%S")),
        None => "Not checked yet".to_string(),
    }
}

fn band_color(band: ScoreBand) -> Color32 {
    let [r, g, b] = band.rgb();
    Color32::from_rgb(r, g, b)
}

fn status_color(status: PostureStatus) -> Color32 {
    match status {
        PostureStatus::Excellent | PostureStatus::Good => band_color(ScoreBand::Good),
        PostureStatus::Fair => band_color(ScoreBand::Fair),
        PostureStatus::Poor => band_color(ScoreBand::Poor),
        PostureStatus::Unknown => Color32::GRAY,
    }
}

/// Renders the latest analysis, or the placeholder for the current state.
pub struct ResultView {
    state: CaptureState,
}

impl ResultView {
    pub fn new(state: CaptureState) -> Self {
        Self { state }
    }

    fn draw_failure(ui: &mut egui::Ui, message: &str) {
        ui.group(|ui| {
            ui.colored_label(band_color(ScoreBand::Poor), RichText::new("Analysis Failed").strong());
            ui.label(message);
        });
    }

    fn draw_analysis(ui: &mut egui::Ui, analysis: &PostureAnalysis, in_flight: bool) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.label(
                    RichText::new(analysis.score.to_string())
                        .size(48.0)
                        .strong()
                        .color(band_color(analysis.band())),
                );
                ui.vertical(|ui| {
                    ui.colored_label(
                        status_color(analysis.status),
                        RichText::new(analysis.status.as_str()).strong(),
                    );
                    ui.add(
                        egui::ProgressBar::new(f32::from(analysis.score) / 100.0)
                            .fill(band_color(analysis.band())),
                    );
                });
                if in_flight {
                    ui.spinner();
                }
            });
            ui.label(&analysis.summary);
        });

        ui.columns(2, |columns| {
            columns[0].heading("Issues");
            for line in issue_lines(analysis) {
                columns[0].label(format!("• {}", line));
            }
            columns[1].heading("Recommendations");
            for line in recommendation_lines(analysis) {
                columns[1].label(format!("• {}", line));
            }
        });
    }
}

impl View for ResultView {
    fn draw(&mut self, ui: &mut egui::Ui) {
        match ResultPanel::for_state(&self.state) {
            ResultPanel::Failed(message) => Self::draw_failure(ui, message),
            ResultPanel::Analyzing => {
                ui.horizontal(|ui| {
                    ui.spinner();
                    ui.heading("Analyzing Posture...");
                });
            }
            ResultPanel::Ready => {
                ui.heading("Ready to Analyze");
            }
            ResultPanel::Analysis(analysis) => {
                Self::draw_analysis(ui, analysis, self.state.in_flight)
            }
        }
        ui.separator();
        ui.label(format_last_run(self.state.last_run));
    }
}
