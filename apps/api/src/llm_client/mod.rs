/// LLM client: the single entry point for OpenAI chat-completion calls.
///
/// Detection, generation and vision all go through this module so retry and
/// error mapping live in one place.
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

pub const AVAILABLE_MODELS: &[&str] = &["gpt-3.5-turbo", "gpt-4", "gpt-4o", "gpt-4-turbo-preview"];
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("OpenAI API key is not configured")]
    Unavailable,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, Serialize)]
pub struct Sampling {
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

impl Sampling {
    pub fn new(max_tokens: u32, temperature: f32) -> Self {
        Self {
            max_tokens,
            temperature,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }
}

/// One chat message. `content` is either a string or a list of content parts.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: Value,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: Value::String(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: Value::String(text.into()),
        }
    }

    /// User message carrying a text prompt plus an image (URL or data URI).
    pub fn user_with_image(text: &str, image_url: &str, detail: &str) -> Self {
        Self {
            role: "user",
            content: serde_json::json!([
                { "type": "text", "text": text },
                { "type": "image_url", "image_url": { "url": image_url, "detail": detail } }
            ]),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(flatten)]
    sampling: &'a Sampling,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Usage,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl LlmResponse {
    /// Text of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

/// OpenAI chat-completions client with retry logic and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    default_model: String,
}

impl LlmClient {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        default_model: &str,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            default_model: default_model.to_string(),
        })
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Maps unknown model names onto the configured default.
    pub fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(m) if AVAILABLE_MODELS.contains(&m) => m,
            _ => &self.default_model,
        }
    }

    /// Makes a raw chat-completions call, returning the full response object.
    /// Retries on 429 (rate limit) and 5xx errors with exponential backoff.
    pub async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        sampling: &Sampling,
    ) -> Result<LlmResponse, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::Unavailable)?;
        let url = format!("{}/chat/completions", self.base_url);
        let request_body = ChatRequest {
            model,
            messages,
            sampling,
        };

        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .bearer_auth(api_key)
                .json(&request_body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = serde_json::from_str::<OpenAiError>(&body)
                    .map(|e| e.error.message)
                    .unwrap_or(body);
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message,
                });
            }

            let llm_response: LlmResponse = response.json().await?;

            debug!(
                "LLM call succeeded: model={}, prompt_tokens={}, completion_tokens={}",
                model, llm_response.usage.prompt_tokens, llm_response.usage.completion_tokens
            );

            return Ok(llm_response);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    /// System + user prompt call returning the trimmed text of the first choice.
    pub async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
        sampling: &Sampling,
    ) -> Result<(String, Usage), LlmError> {
        let messages = [ChatMessage::system(system), ChatMessage::user(prompt)];
        let response = self.chat(model, &messages, sampling).await?;
        let text = response.text().ok_or(LlmError::EmptyContent)?.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }
        Ok((text.to_string(), response.usage.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_model_falls_back_to_default() {
        let client = LlmClient::new(None, "https://api.openai.com/v1/", "gpt-4o").unwrap();
        assert_eq!(client.resolve_model(Some("gpt-4")), "gpt-4");
        assert_eq!(client.resolve_model(Some("llama")), "gpt-4o");
        assert_eq!(client.resolve_model(None), "gpt-4o");
    }

    #[tokio::test]
    async fn test_missing_key_is_unavailable() {
        let client = LlmClient::new(None, "http://127.0.0.1:9", "gpt-4o").unwrap();
        assert!(!client.is_available());
        let err = client
            .complete("gpt-4o", "sys", "hi", &Sampling::new(10, 0.0))
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Unavailable));
    }

    #[test]
    fn test_request_serializes_sampling_flat() {
        let mut sampling = Sampling::new(700, 0.6);
        sampling.top_p = Some(0.85);
        let messages = [ChatMessage::user("hi")];
        let body = serde_json::to_value(ChatRequest {
            model: "gpt-4o",
            messages: &messages,
            sampling: &sampling,
        })
        .unwrap();
        assert_eq!(body["max_tokens"], 700);
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("frequency_penalty").is_none());
    }

    #[test]
    fn test_response_text_from_first_choice() {
        let raw = r#"{"model":"gpt-4o","choices":[{"message":{"content":"hello"}}],"usage":{"prompt_tokens":3,"completion_tokens":1,"total_tokens":4}}"#;
        let resp: LlmResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.text(), Some("hello"));
        assert_eq!(resp.usage.total_tokens, 4);
    }
}
