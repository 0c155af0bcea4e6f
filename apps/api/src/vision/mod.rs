//! Image description through the GPT vision endpoint.

pub mod handlers;
pub mod image;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::{ChatMessage, LlmClient, Sampling};
use image::ImageSource;

const ACTION_KEYWORDS: &[&str] = &[
    "walking", "standing", "sitting", "running", "looking", "talking", "smiling", "eating",
    "drinking",
];

static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").unwrap());
static LIST_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*(?:[-*•]\s+|\d+\s*[.)]\s+)").unwrap());
static SECTION_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*[^：:\n]{1,20}[：:]\s*").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    #[default]
    Detailed,
    Concise,
}

#[derive(Debug, Clone)]
pub struct DescribeOptions {
    /// `low`, `high` or `auto`.
    pub detail_level: String,
    pub additional_prompt: Option<String>,
    pub output_mode: OutputMode,
    /// `None` or a non-positive value disables truncation in concise mode.
    pub max_chars: Option<i64>,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            detail_level: "high".to_string(),
            additional_prompt: None,
            output_mode: OutputMode::Detailed,
            max_chars: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredInfo {
    pub people: Vec<String>,
    pub location: Option<String>,
    pub action: Option<String>,
    pub scene: Option<String>,
    pub objects: Vec<String>,
    pub time_atmosphere: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionMetadata {
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub detail_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDescription {
    pub success: bool,
    pub description: Option<String>,
    pub structured_info: Option<StructuredInfo>,
    pub metadata: Option<DescriptionMetadata>,
    pub error: Option<String>,
}

impl ImageDescription {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            description: None,
            structured_info: None,
            metadata: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Clone)]
pub struct VisionService {
    llm: LlmClient,
    http: reqwest::Client,
}

impl VisionService {
    pub fn new(llm: LlmClient, http: reqwest::Client) -> Self {
        Self { llm, http }
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_available()
    }

    pub fn service_info(&self) -> serde_json::Value {
        serde_json::json!({
            "initialized": true,
            "client_available": self.llm.is_available(),
            "model": self.llm.default_model(),
            "api_key_set": self.llm.is_available(),
        })
    }

    /// Failures are reported inside the returned value, never as `Err`.
    pub async fn describe_image(&self, image: &str, options: &DescribeOptions) -> ImageDescription {
        if !self.llm.is_available() {
            return ImageDescription::failed(
                "Vision service not initialized. Please check OPENAI_API_KEY.",
            );
        }

        let data_uri = match ImageSource::parse(image).to_data_uri(&self.http).await {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Error preparing image data: {e}");
                return ImageDescription::failed(
                    "Failed to prepare image data. Please check image URL or base64 format.",
                );
            }
        };

        let prompt = build_prompt(options);
        let model = self.llm.default_model().to_string();
        let messages = [ChatMessage::user_with_image(&prompt, &data_uri, &options.detail_level)];

        let response = match self
            .llm
            .chat(&model, &messages, &Sampling::new(1000, 0.3))
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Vision call failed: {e}");
                return ImageDescription::failed(e.to_string());
            }
        };

        let mut description = response.text().unwrap_or_default().trim().to_string();
        if options.output_mode == OutputMode::Concise {
            let limit = options.max_chars.filter(|n| *n > 0).map(|n| n as usize);
            description = to_concise_paragraph(&description, limit);
        }
        info!(
            "Image analysis completed, tokens used: {}",
            response.usage.total_tokens
        );

        ImageDescription {
            success: true,
            structured_info: Some(parse_description(&description)),
            description: Some(description),
            metadata: Some(DescriptionMetadata {
                model,
                prompt_tokens: response.usage.prompt_tokens,
                completion_tokens: response.usage.completion_tokens,
                total_tokens: response.usage.total_tokens,
                detail_level: options.detail_level.clone(),
            }),
            error: None,
        }
    }
}

fn build_prompt(options: &DescribeOptions) -> String {
    let limit = options.max_chars.filter(|n| *n > 0).unwrap_or(120);
    let mut prompt = format!(
        "Based on the image content, output a concise English news lead paragraph. Requirements:\n\
         - Output only one continuous paragraph, no numbering, subtitles, or bullet points;\n\
         - Do not guess specific person identities; if visible place names/text (e.g., 'Sydney') are present, naturally incorporate them;\n\
         - Focus on observable facts: location/activity/appearance/atmosphere;\n\
         - Maximum {limit} characters, natural and objective tone.\n\
         If certain information cannot be determined from the image, omit it rather than fabricate."
    );
    if let Some(extra) = options.additional_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
        prompt.push_str(&format!("\n\nAdditional requirements: {extra}"));
    }
    prompt
}

/// Flattens markdown or list output into one paragraph, optionally capped in characters.
pub fn to_concise_paragraph(text: &str, max_chars: Option<usize>) -> String {
    let cleaned = BOLD.replace_all(text, "$1");
    let cleaned = INLINE_CODE.replace_all(&cleaned, "$1");
    let cleaned = LIST_MARKER.replace_all(&cleaned, "");
    let cleaned = SECTION_TITLE.replace_all(&cleaned, "");
    let cleaned = WHITESPACE.replace_all(&cleaned, " ");
    let cleaned = cleaned.trim();
    match max_chars {
        Some(limit) if cleaned.chars().count() > limit => {
            crate::detection::text::truncate_chars(cleaned, limit)
                .trim_end()
                .to_string()
        }
        _ => cleaned.to_string(),
    }
}

/// Keyword scan for scene, indoor/outdoor and main action.
pub fn parse_description(description: &str) -> StructuredInfo {
    let lower = description.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    let mut info = StructuredInfo::default();
    if has(&["people", "person", "man", "woman"]) {
        info.scene = Some("contains_people".to_string());
    }
    if has(&["indoor", "room", "building", "inside"]) {
        info.location = Some("indoor".to_string());
    } else if has(&["outdoor", "street", "outside"]) {
        info.location = Some("outdoor".to_string());
    }
    info.action = ACTION_KEYWORDS
        .iter()
        .find(|k| lower.contains(*k))
        .map(|k| k.to_string());
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concise_paragraph_strips_markdown() {
        let raw = "**Scene:** A busy street\n1. People walking\n- `Cars` parked";
        let out = to_concise_paragraph(raw, None);
        assert_eq!(out, "A busy street People walking Cars parked");
    }

    #[test]
    fn test_concise_paragraph_truncates() {
        let out = to_concise_paragraph("one two three four", Some(7));
        assert_eq!(out, "one two");
    }

    #[test]
    fn test_parse_description_keywords() {
        let info = parse_description("A woman standing outside on a street at dusk");
        assert_eq!(info.scene.as_deref(), Some("contains_people"));
        assert_eq!(info.location.as_deref(), Some("outdoor"));
        assert_eq!(info.action.as_deref(), Some("standing"));
    }

    #[tokio::test]
    async fn test_describe_without_key_fails_softly() {
        let llm = LlmClient::new(None, "http://127.0.0.1:9", "gpt-4o").unwrap();
        let service = VisionService::new(llm, reqwest::Client::new());
        let res = service
            .describe_image("AAAA", &DescribeOptions::default())
            .await;
        assert!(!res.success);
        assert!(res.error.unwrap().contains("OPENAI_API_KEY"));
    }
}
