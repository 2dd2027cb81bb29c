use serde_json::{Value, json};

use crate::analysis::types::PostureStatus;

pub const INSTRUCTION: &str = "Analyze this image of a person sitting at a desk or computer. \
Evaluate their ergonomics and posture. \
Look for: Head position, neck angle, shoulder position, back straightness, and distance from screen. \
If no person is clearly visible, set status to 'Unknown' and score to 0. \
Provide actionable, specific feedback in JSON format.";

pub const REQUIRED_FIELDS: [&str; 5] = ["score", "status", "issues", "recommendations", "summary"];

/// Structured-output declaration matching [`PostureAnalysis`](crate::analysis::PostureAnalysis).
pub fn response_schema() -> Value {
    let statuses: Vec<&str> = PostureStatus::ALL.iter().map(|s| s.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "score": {
                "type": "INTEGER",
                "description": "A numerical score from 0 to 100 representing posture quality. 100 is perfect ergonomic posture."
            },
            "status": {
                "type": "STRING",
                "enum": statuses,
                "description": "Categorical status of the posture."
            },
            "issues": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of specific detected issues (e.g., 'Head forward', 'Shoulders slumped', 'Screen too low')."
            },
            "recommendations": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Actionable advice to correct the detected issues (e.g., 'Raise your monitor', 'Pull shoulders back')."
            },
            "summary": {
                "type": "STRING",
                "description": "A brief, encouraging summary of the analysis."
            }
        },
        "required": REQUIRED_FIELDS,
        "propertyOrdering": REQUIRED_FIELDS
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_every_field() {
        let schema = response_schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(required, REQUIRED_FIELDS);
        for field in REQUIRED_FIELDS {
            assert!(schema["properties"].get(field).is_some(), "{} missing", field);
        }
    }

    #[test]
    fn status_enum_is_closed() {
        let schema = response_schema();
        let statuses = schema["properties"]["status"]["enum"].as_array().unwrap();
        assert_eq!(statuses.len(), 5);
        assert!(statuses.contains(&json!("Unknown")));
    }

    #[test]
    fn instruction_covers_the_checked_points() {
        for point in [
            "Head position",
            "neck angle",
            "shoulder position",
            "back straightness",
            "distance from screen",
            "'Unknown'",
        ] {
            assert!(INSTRUCTION.contains(point), "{}", point);
        }
    }
}
