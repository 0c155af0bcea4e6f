use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A stored generation run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    /// `single`, `batch` or `from_real`.
    pub generation_type: String,
    pub topic: String,
    pub strategy: String,
    pub model_type: String,
    pub image: Option<String>,
    pub params: Value,
    pub result: Value,
    pub generated_text: String,
    pub style: Option<String>,
    pub domain: Option<String>,
    pub pdf_path: Option<String>,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl GenerationRecord {
    /// Empty record of the given type; callers fill in the result fields.
    pub fn new(
        user_id: Option<Uuid>,
        generation_type: &str,
        topic: String,
        strategy: String,
        model_type: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            generation_type: generation_type.to_string(),
            topic,
            strategy,
            model_type,
            image: None,
            params: Value::Object(Default::default()),
            result: Value::Object(Default::default()),
            generated_text: String::new(),
            style: None,
            domain: None,
            pdf_path: None,
            pdf_url: None,
            created_at: Utc::now(),
        }
    }
}
