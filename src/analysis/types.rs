use serde::{Deserialize, Serialize};

use crate::error::AnalysisFailure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostureStatus {
    Excellent,
    Good,
    Fair,
    Poor,
    Unknown,
}

impl PostureStatus {
    pub const ALL: [PostureStatus; 5] = [
        PostureStatus::Excellent,
        PostureStatus::Good,
        PostureStatus::Fair,
        PostureStatus::Poor,
        PostureStatus::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostureStatus::Excellent => "Excellent",
            PostureStatus::Good => "Good",
            PostureStatus::Fair => "Fair",
            PostureStatus::Poor => "Poor",
            PostureStatus::Unknown => "Unknown",
        }
    }
}

/// One complete evaluation. Only built through [`PostureAnalysis::from_json`]
/// or [`PostureAnalysis::new`], both of which validate the score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostureAnalysis {
    pub score: u8,
    pub status: PostureStatus,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub summary: String,
}

impl PostureAnalysis {
    pub fn new(
        score: i64,
        status: PostureStatus,
        issues: Vec<String>,
        recommendations: Vec<String>,
        summary: impl Into<String>,
    ) -> Result<Self, AnalysisFailure> {
        if !(0..=100).contains(&score) {
            return Err(AnalysisFailure::new(format!(
                "Posture score {} is outside 0-100",
                score
            )));
        }
        // "no person visible" always reports a zero score
        let score = if status == PostureStatus::Unknown { 0 } else { score as u8 };
        Ok(Self {
            score,
            status,
            issues,
            recommendations,
            summary: summary.into(),
        })
    }

    /// Parses the endpoint's JSON text. All five fields are required.
    pub fn from_json(text: &str) -> Result<Self, AnalysisFailure> {
        let raw: RawAnalysis = serde_json::from_str(text)?;
        Self::new(
            raw.score,
            raw.status,
            raw.issues,
            raw.recommendations,
            raw.summary,
        )
    }

    pub fn person_detected(&self) -> bool {
        self.status != PostureStatus::Unknown
    }

    pub fn band(&self) -> ScoreBand {
        ScoreBand::from_score(self.score)
    }
}

/// Wire shape; the score is read wide so out-of-range values are reported
/// instead of failing as a type error.
#[derive(Deserialize)]
struct RawAnalysis {
    score: i64,
    status: PostureStatus,
    issues: Vec<String>,
    recommendations: Vec<String>,
    summary: String,
}

/// Colour band of the score gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    Fair,
    Poor,
    None,
}

impl ScoreBand {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => ScoreBand::Good,
            60..=79 => ScoreBand::Fair,
            1..=59 => ScoreBand::Poor,
            0 => ScoreBand::None,
        }
    }

    pub fn rgb(&self) -> [u8; 3] {
        match self {
            ScoreBand::Good => [0x10, 0xb9, 0x81],
            ScoreBand::Fair => [0xf5, 0x9e, 0x0b],
            ScoreBand::Poor => [0xef, 0x44, 0x44],
            ScoreBand::None => [0xe5, 0xe7, 0xeb],
        }
    }
}
