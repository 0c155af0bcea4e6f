use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored detection run. Never mutated after insert except for the PDF fields.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DetectionRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    /// `baseline` or `improved`.
    pub detection_type: String,
    pub text: String,
    pub image: Option<String>,
    pub config: Value,
    pub baseline: Option<Value>,
    pub result: Value,
    pub verdict: Option<String>,
    pub pdf_path: Option<String>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DetectionRecord {
    pub fn new(
        user_id: Option<Uuid>,
        detection_type: &str,
        text: String,
        image: Option<String>,
        config: Value,
        result: Value,
    ) -> Self {
        let verdict = verdict_of(&result);
        Self {
            id: Uuid::new_v4(),
            user_id,
            detection_type: detection_type.to_string(),
            text,
            image,
            config,
            baseline: None,
            result,
            verdict,
            pdf_path: None,
            pdf_url: None,
            created_at: Utc::now(),
        }
    }
}

/// Verdict label carried by a detection result, lower-cased. Improved results
/// keep it under `final_prediction`, baseline results under `ensemble`.
pub fn verdict_of(result: &Value) -> Option<String> {
    ["/prediction", "/final_prediction/prediction", "/ensemble/prediction"]
        .iter()
        .find_map(|ptr| result.pointer(ptr).and_then(Value::as_str))
        .map(|s| s.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_verdict_taken_from_prediction() {
        let record = DetectionRecord::new(
            None,
            "improved",
            "text".into(),
            None,
            json!({}),
            json!({"prediction": "FAKE", "confidence": 0.9}),
        );
        assert_eq!(record.verdict.as_deref(), Some("fake"));
        assert!(verdict_of(&json!({"confidence": 0.2})).is_none());
        assert_eq!(
            verdict_of(&json!({"final_prediction": {"prediction": "misleading"}})).as_deref(),
            Some("misleading")
        );
        assert_eq!(
            verdict_of(&json!({"ensemble": {"prediction": "real"}})).as_deref(),
            Some("real")
        );
    }
}
