//! Hugging Face Inference API calls backing the roberta, zero-shot and CLIP detectors.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

/// Second CLIP label the caption competes against.
const CLIP_DISTRACTOR: &str = "an unrelated image";

#[derive(Debug, Error)]
pub enum HfError {
    #[error("HF_API_TOKEN is not configured")]
    Unavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inference API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("unexpected inference response: {0}")]
    Shape(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ZeroShotOutput {
    pub labels: Vec<String>,
    pub scores: Vec<f64>,
}

#[derive(Clone)]
pub struct HfClient {
    http: reqwest::Client,
    token: Option<String>,
    base_url: String,
}

impl HfClient {
    pub fn new(http: reqwest::Client, token: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.token.is_some()
    }

    async fn infer(&self, model: &str, body: Value) -> Result<Value, HfError> {
        let token = self.token.as_deref().ok_or(HfError::Unavailable)?;
        let response = self
            .http
            .post(format!("{}/{model}", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(HfError::Api {
                status: status.as_u16(),
                message,
            });
        }
        let value: Value = response.json().await?;
        debug!("HF inference {model} ok");
        Ok(value)
    }

    /// Label scores for every class of a text classifier.
    pub async fn text_classification(&self, model: &str, text: &str) -> Result<Vec<LabelScore>, HfError> {
        let value = self
            .infer(model, json!({ "inputs": text, "options": { "wait_for_model": true } }))
            .await?;
        parse_label_scores(value)
    }

    pub async fn zero_shot(
        &self,
        model: &str,
        text: &str,
        labels: &[&str],
    ) -> Result<ZeroShotOutput, HfError> {
        let value = self
            .infer(
                model,
                json!({
                    "inputs": text,
                    "parameters": { "candidate_labels": labels },
                    "options": { "wait_for_model": true }
                }),
            )
            .await?;
        serde_json::from_value(value).map_err(|e| HfError::Shape(e.to_string()))
    }

    /// Probability that `caption` describes `image`, from zero-shot image
    /// classification against a distractor label.
    pub async fn image_text_similarity(
        &self,
        model: &str,
        image: &[u8],
        caption: &str,
    ) -> Result<f64, HfError> {
        let value = self
            .infer(
                model,
                json!({
                    "inputs": STANDARD.encode(image),
                    "parameters": { "candidate_labels": [caption, CLIP_DISTRACTOR] },
                    "options": { "wait_for_model": true }
                }),
            )
            .await?;
        let scores = parse_label_scores(value)?;
        scores
            .iter()
            .find(|s| s.label == caption)
            .map(|s| s.score)
            .ok_or_else(|| HfError::Shape("caption label missing from response".to_string()))
    }
}

/// Accepts both `[{label, score}]` and the nested `[[{label, score}]]` form.
fn parse_label_scores(value: Value) -> Result<Vec<LabelScore>, HfError> {
    let flat = match value {
        Value::Array(items) if items.first().is_some_and(Value::is_array) => {
            items.into_iter().next().unwrap_or(Value::Array(Vec::new()))
        }
        other => other,
    };
    serde_json::from_value(flat).map_err(|e| HfError::Shape(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_label_scores() {
        let nested = json!([[{"label": "LABEL_0", "score": 0.2}, {"label": "LABEL_1", "score": 0.8}]]);
        let scores = parse_label_scores(nested).unwrap();
        assert_eq!(scores.len(), 2);
        assert_eq!(scores[1].label, "LABEL_1");

        let flat = json!([{"label": "a", "score": 1.0}]);
        assert_eq!(parse_label_scores(flat).unwrap()[0].score, 1.0);
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert!(matches!(
            parse_label_scores(json!({"error": "loading"})),
            Err(HfError::Shape(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token() {
        let client = HfClient::new(reqwest::Client::new(), None, "http://127.0.0.1:9");
        let err = client.text_classification("m", "t").await.unwrap_err();
        assert!(matches!(err, HfError::Unavailable));
    }
}
