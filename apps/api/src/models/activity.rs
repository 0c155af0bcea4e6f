use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLogEntry {
    pub id: Uuid,
    pub action: String,
    pub user_info: Value,
    pub request_meta: Value,
    pub result_meta: Value,
    pub client: Value,
    pub created_at: DateTime<Utc>,
}
