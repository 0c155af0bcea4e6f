//! Best-effort audit trail of user actions.

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::warn;
use uuid::Uuid;

use crate::models::activity::ActivityLogEntry;
use crate::models::user::User;
use crate::store::Store;

/// Caller address and user agent, taken from request headers.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: Option<String>,
    pub user_agent: String,
}

impl ClientInfo {
    pub fn to_json(&self) -> Value {
        json!({ "ip": self.ip, "ua": self.user_agent })
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ClientInfo {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let ip = header("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|s| s.trim().to_string()))
            .or_else(|| header("x-real-ip"));
        Ok(ClientInfo {
            ip,
            user_agent: header("user-agent").unwrap_or_default(),
        })
    }
}

/// Identity snapshot for an optional caller.
pub fn user_info(user: Option<&User>) -> Value {
    user.map(User::activity_info).unwrap_or_else(|| json!({}))
}

/// Writes one activity entry. Failures are logged and swallowed.
pub async fn record(
    store: &dyn Store,
    action: &str,
    user_info: Value,
    request_meta: Value,
    result_meta: Value,
    client: &ClientInfo,
) {
    let entry = ActivityLogEntry {
        id: Uuid::new_v4(),
        action: action.to_string(),
        user_info,
        request_meta,
        result_meta,
        client: client.to_json(),
        created_at: Utc::now(),
    };
    if let Err(e) = store.insert_activity(&entry).await {
        warn!("Failed to write activity log entry '{action}': {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use axum::http::Request;

    #[tokio::test]
    async fn test_client_info_prefers_forwarded_for() {
        let (mut parts, _) = Request::builder()
            .header("x-forwarded-for", "10.0.0.1, 10.0.0.2")
            .header("user-agent", "veritas-cli")
            .body(())
            .unwrap()
            .into_parts();
        let info = ClientInfo::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(info.ip.as_deref(), Some("10.0.0.1"));
        assert_eq!(info.user_agent, "veritas-cli");
    }

    #[tokio::test]
    async fn test_record_writes_entry() {
        let store = MemoryStore::new();
        record(
            &store,
            "login",
            json!({"username": "alice"}),
            json!({}),
            json!({"ok": true}),
            &ClientInfo::default(),
        )
        .await;
        assert_eq!(store.activity_count().await, 1);
    }
}
