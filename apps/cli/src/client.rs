//! Thin JSON client for the Veritas REST API.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

/// Only the related-news lookup carries a deadline.
const RELATED_NEWS_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not signed in. Run `veritas login` first")]
    NotSignedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Which history collection a command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Detection,
    Generation,
}

impl RecordKind {
    fn segment(self) -> &'static str {
        match self {
            RecordKind::Detection => "detection",
            RecordKind::Generation => "generation",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HistoryParams {
    pub page: usize,
    pub page_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("veritas-cli/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Same server, different bearer token.
    pub fn with_token(&self, token: &str) -> Self {
        Self {
            token: Some(token.to_string()),
            ..self.clone()
        }
    }

    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.url(path));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn authed(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        if !self.is_signed_in() {
            return Err(ClientError::NotSignedIn);
        }
        Ok(self.request(method, path))
    }

    async fn send<T: DeserializeOwned>(builder: RequestBuilder) -> Result<T, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(status, &bytes),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send_bytes(builder: RequestBuilder) -> Result<Vec<u8>, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                message: error_message(status, &bytes),
            });
        }
        Ok(bytes.to_vec())
    }

    // ── Auth ────────────────────────────────────────────────────────────────

    pub async fn login(&self, username_or_email: &str, password: &str) -> Result<Value, ClientError> {
        let body = json!({ "username_or_email": username_or_email, "password": password });
        Self::send(self.request(Method::POST, "/api/auth/login").json(&body)).await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Value, ClientError> {
        let body = json!({ "username": username, "email": email, "password": password });
        Self::send(self.request(Method::POST, "/api/auth/register").json(&body)).await
    }

    pub async fn me(&self) -> Result<Value, ClientError> {
        Self::send(self.authed(Method::GET, "/api/auth/me")?).await
    }

    pub async fn update_profile(&self, fields: &Value) -> Result<Value, ClientError> {
        Self::send(self.authed(Method::PUT, "/api/auth/update_profile")?.json(fields)).await
    }

    // ── Detection & generation ──────────────────────────────────────────────

    pub async fn detect(
        &self,
        text: &str,
        image: Option<&str>,
        improved: bool,
    ) -> Result<Value, ClientError> {
        let path = if improved {
            "/api/detect/improved"
        } else {
            "/api/detect/baseline"
        };
        let body = json!({ "text": text, "image_url_or_b64": image });
        Self::send(self.request(Method::POST, path).json(&body)).await
    }

    pub async fn generate<B: Serialize>(&self, request: &B) -> Result<Value, ClientError> {
        Self::send(self.authed(Method::POST, "/api/generate/single")?.json(request)).await
    }

    pub async fn strategies(&self) -> Result<Value, ClientError> {
        Self::send(self.request(Method::GET, "/api/info/strategies")).await
    }

    // ── History ─────────────────────────────────────────────────────────────

    pub async fn history(
        &self,
        kind: RecordKind,
        params: &HistoryParams,
    ) -> Result<Value, ClientError> {
        let path = format!("/api/{}/history", kind.segment());
        Self::send(self.authed(Method::GET, &path)?.query(params)).await
    }

    pub async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<Value, ClientError> {
        let path = format!("/api/{}/history/{id}", kind.segment());
        Self::send(self.authed(Method::DELETE, &path)?).await
    }

    /// Downloads a record's report, asking the server to render it first
    /// when none exists yet.
    pub async fn download_pdf(&self, kind: RecordKind, id: &str) -> Result<Vec<u8>, ClientError> {
        let path = format!("/api/{}/history/{id}/pdf", kind.segment());
        match Self::send_bytes(self.authed(Method::GET, &path)?).await {
            Err(ClientError::Status { status: 404, .. }) => {
                let generate = format!("/api/{}/history/{id}/generate_pdf", kind.segment());
                let _: Value = Self::send(self.authed(Method::POST, &generate)?).await?;
                Self::send_bytes(self.authed(Method::GET, &path)?).await
            }
            other => other,
        }
    }

    pub async fn stats(&self) -> Result<Value, ClientError> {
        Self::send(self.authed(Method::GET, "/api/stats")?).await
    }

    // ── News ────────────────────────────────────────────────────────────────

    pub async fn search_news(&self, query: &str, page_size: usize) -> Result<Value, ClientError> {
        let builder = self
            .request(Method::GET, "/api/news/search")
            .query(&[("q", query), ("page_size", &page_size.to_string())]);
        Self::send(builder).await
    }

    pub async fn related_news(
        &self,
        text: &str,
        detection_result: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let body = json!({ "text": text, "detection_result": detection_result });
        let builder = self
            .request(Method::POST, "/api/news/find_related")
            .timeout(RELATED_NEWS_TIMEOUT)
            .json(&body);
        Self::send(builder).await
    }
}

/// Pulls a human-readable message out of an error body. Understands
/// `{"error":{"message"}}` and `{"detail": ...}` shapes, falling back to the
/// raw text and then the status reason.
pub fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        if let Some(msg) = value.pointer("/error/message").and_then(Value::as_str) {
            return msg.to_string();
        }
        match value.get("detail") {
            Some(Value::String(detail)) => return detail.clone(),
            Some(Value::Array(items)) => {
                let msgs: Vec<&str> = items
                    .iter()
                    .filter_map(|item| item.get("msg").and_then(Value::as_str))
                    .collect();
                if !msgs.is_empty() {
                    return msgs.join("; ");
                }
            }
            _ => {}
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() && text.len() <= 200 {
        return text.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("Request failed")
        .to_string()
}
