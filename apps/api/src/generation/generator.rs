//! Fake-news generation: topic-driven articles and rewrites of real articles.
//!
//! Every call produces a `GenerationResult`. LLM failures are reported in
//! the result (`success: false`) instead of failing the request, so batch
//! runs keep going past a bad topic.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::generation::prompts::{
    domain_enforcement, from_real_system, label_instruction, style_enforcement,
    style_system_addendum, FROM_REAL_PROMPT_TEMPLATE, GENERATION_REQUIREMENTS_TEMPLATE,
    GENERATION_SYSTEM,
};
use crate::generation::strategies::{
    domain_instruction, domain_key, domains_json, strategies_json, strategy, style_instruction,
    style_key, styles_json, DEFAULT_STRATEGY,
};
use crate::llm_client::{LlmClient, Sampling, Usage, AVAILABLE_MODELS};

const TOPIC_MAX_TOKENS: u32 = 700;
const FROM_REAL_MAX_TOKENS: u32 = 800;

static MARKDOWN_EMPHASIS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*+").unwrap());
static MARKDOWN_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"#+").unwrap());
static DISCLAIMER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(generated|research purposes|for research)").unwrap());
static HYPE_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(SHOCKING|BREAKING|DEVASTATING|URGENT|EXCLUSIVE):\s*").unwrap()
});
static EXTRA_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationMetadata {
    pub generation_time: DateTime<Utc>,
    pub word_count: usize,
    pub usage: Usage,
}

/// Outcome of one generation. On failure only `success`, `error` and the
/// request echo fields are set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<GenerationMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GenerationResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Parameters for a topic-driven article.
#[derive(Debug, Clone, Default)]
pub struct TopicRequest<'a> {
    pub topic: &'a str,
    pub strategy: Option<&'a str>,
    pub model: Option<&'a str>,
    pub style: Option<&'a str>,
    pub domain: Option<&'a str>,
}

/// Body of POST /api/generate/from_real, also built internally when a
/// single generation finds a real source.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FromRealRequest {
    #[serde(default)]
    pub source_text: String,
    #[serde(default)]
    pub source_url: String,
    /// `supported`, `refuted` or `notenoughinfo`.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Output cleanup
// ────────────────────────────────────────────────────────────────────────────

/// Strips markdown, disclaimer lines and hype prefixes, and collapses
/// blank-line runs to a single empty line.
pub fn format_article(text: &str) -> String {
    let text = MARKDOWN_EMPHASIS.replace_all(text, "");
    let text = MARKDOWN_HEADING.replace_all(&text, "");

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if lines.last().is_some_and(|l| !l.is_empty()) {
                lines.push(String::new());
            }
            continue;
        }
        if DISCLAIMER.is_match(line) {
            continue;
        }
        lines.push(HYPE_PREFIX.replace(line, "").into_owned());
    }

    EXTRA_BLANKS
        .replace_all(&lines.join("\n"), "\n\n")
        .trim()
        .to_string()
}

fn fill(template: &str, pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .fold(template.to_string(), |acc, (key, value)| {
            acc.replace(&format!("{{{key}}}"), value)
        })
}

fn topic_sampling(max_tokens: u32) -> Sampling {
    Sampling {
        top_p: Some(0.85),
        frequency_penalty: Some(0.6),
        presence_penalty: Some(0.3),
        ..Sampling::new(max_tokens, 0.6)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Generator
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct Generator {
    llm: LlmClient,
}

impl Generator {
    pub fn new(llm: LlmClient) -> Self {
        if !llm.is_available() {
            warn!("OPENAI_API_KEY not set; generation will return errors");
        }
        Self { llm }
    }

    /// Writes an article about `req.topic` with the given strategy.
    pub async fn generate(&self, req: &TopicRequest<'_>) -> GenerationResult {
        let topic = req.topic.trim();
        if topic.is_empty() {
            return GenerationResult::failed("Topic is required");
        }
        let strategy = strategy(req.strategy.unwrap_or(DEFAULT_STRATEGY));
        let model = self.llm.resolve_model(req.model).to_string();
        let style = style_key(req.style);
        let domain = domain_key(req.domain);

        let failure = |error: String| GenerationResult {
            topic: Some(topic.to_string()),
            strategy: Some(strategy.name.to_string()),
            model: Some(model.clone()),
            ..GenerationResult::failed(error)
        };
        if !self.llm.is_available() {
            return failure("OpenAI client not initialized. Please provide API key.".to_string());
        }

        let system = format!("{GENERATION_SYSTEM}{}", style_system_addendum(&style));
        let requirements = fill(
            GENERATION_REQUIREMENTS_TEMPLATE,
            &[
                ("style", style_instruction(&style)),
                ("domain", domain_instruction(domain.as_deref())),
            ],
        );
        let prompt = format!(
            "{}\n\n{requirements}",
            fill(strategy.template, &[("topic", topic)])
        );

        info!("Generating '{}' article about: {topic}", strategy.name);
        let outcome = self
            .llm
            .complete(&model, &system, &prompt, &topic_sampling(TOPIC_MAX_TOKENS))
            .await;
        match outcome {
            Ok((text, usage)) => {
                let article = format_article(&text);
                GenerationResult {
                    success: true,
                    metadata: Some(GenerationMetadata {
                        generation_time: Utc::now(),
                        word_count: article.split_whitespace().count(),
                        usage,
                    }),
                    article: Some(article),
                    topic: Some(topic.to_string()),
                    strategy: Some(strategy.name.to_string()),
                    model: Some(model),
                    style: Some(style),
                    domain,
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("Generation failed for topic '{topic}': {e}");
                failure(e.to_string())
            }
        }
    }

    /// Rewrites a real article so it reads as credible but false relative
    /// to the source.
    pub async fn generate_from_real(&self, request: &FromRealRequest) -> GenerationResult {
        let source_text = request.source_text.trim();
        let source_url = request.source_url.trim();
        if source_text.is_empty() {
            return GenerationResult::failed("source_text is required");
        }
        if source_url.is_empty() {
            return GenerationResult::failed("source_url is required");
        }
        if !self.llm.is_available() {
            return GenerationResult::failed("OpenAI client not initialized. Please provide API key.");
        }

        let strategy = strategy(request.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY));
        let model = self.llm.resolve_model(request.model_type.as_deref()).to_string();
        let style = style_key(request.style.as_deref());
        let domain = domain_key(request.domain.as_deref());
        let topic = request
            .topic
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("topic derived from source article");

        let prompt = fill(
            FROM_REAL_PROMPT_TEMPLATE,
            &[
                ("source_text", source_text),
                ("style_enforcement", style_enforcement(&style)),
                ("domain_enforcement", domain.as_deref().map_or("", domain_enforcement)),
                ("label_instruction", request.label.as_deref().map_or("", label_instruction)),
                ("style", style_instruction(&style)),
                ("domain", domain_instruction(domain.as_deref())),
                ("topic", topic),
            ],
        );

        info!("Generating manipulated article from source: {source_url}");
        let sampling = topic_sampling(FROM_REAL_MAX_TOKENS);
        let outcome = self
            .llm
            .complete(&model, from_real_system(&style), &prompt, &sampling)
            .await;
        match outcome {
            Ok((text, usage)) => {
                let article = format_article(&text);
                GenerationResult {
                    success: true,
                    metadata: Some(GenerationMetadata {
                        generation_time: Utc::now(),
                        word_count: article.split_whitespace().count(),
                        usage,
                    }),
                    article: Some(article),
                    topic: request.topic.clone(),
                    strategy: Some(strategy.name.to_string()),
                    model: Some(model),
                    style: Some(style),
                    domain,
                    source_url: Some(source_url.to_string()),
                    label: request.label.clone(),
                    ..Default::default()
                }
            }
            Err(e) => {
                warn!("Generation from {source_url} failed: {e}");
                GenerationResult::failed(e.to_string())
            }
        }
    }

    /// One article per topic, all with the same strategy.
    pub async fn generate_batch(&self, topics: &[String], strategy: Option<&str>) -> Vec<GenerationResult> {
        let strategy = strategy.unwrap_or(DEFAULT_STRATEGY);
        let mut results = Vec::with_capacity(topics.len());
        for topic in topics {
            let req = TopicRequest {
                topic,
                strategy: Some(strategy),
                ..Default::default()
            };
            results.push(self.generate(&req).await);
        }
        results
    }

    pub fn models(&self) -> Vec<&'static str> {
        AVAILABLE_MODELS.to_vec()
    }

    pub fn service_info(&self) -> Value {
        json!({
            "available_strategies": strategies_json(),
            "available_models": self.models(),
            "available_styles": styles_json(),
            "available_domains": domains_json(),
            "requires_api_key": !self.llm.is_available(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline() -> Generator {
        Generator::new(LlmClient::new(None, "http://127.0.0.1:9/v1", "gpt-4o").unwrap())
    }

    #[test]
    fn test_format_article_cleans_output() {
        let raw = "## BREAKING: Council **delays** vote\n\n\n\nLONDON - The council met.\nThis article was generated for research purposes.\n\n\nURGENT: More to follow.";
        assert_eq!(
            format_article(raw),
            "Council delays vote\n\nLONDON - The council met.\n\nMore to follow."
        );
    }

    #[test]
    fn test_format_article_drops_leading_blank_lines() {
        assert_eq!(format_article("\n\n  Headline  \n"), "Headline");
    }

    #[test]
    fn test_fill_replaces_placeholders() {
        assert_eq!(fill("a {x} b {y} {x}", &[("x", "1"), ("y", "2")]), "a 1 b 2 1");
    }

    #[tokio::test]
    async fn test_generate_requires_topic() {
        let result = offline().generate(&TopicRequest::default()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Topic is required"));
    }

    #[tokio::test]
    async fn test_generate_without_key_echoes_request() {
        let req = TopicRequest {
            topic: "river levels",
            strategy: Some("no_such_strategy"),
            ..Default::default()
        };
        let result = offline().generate(&req).await;
        assert!(!result.success);
        assert_eq!(result.strategy.as_deref(), Some(DEFAULT_STRATEGY));
        assert_eq!(result.model.as_deref(), Some("gpt-4o"));
        assert_eq!(result.topic.as_deref(), Some("river levels"));
    }

    #[tokio::test]
    async fn test_from_real_validates_source() {
        let generator = offline();
        let missing_text = generator.generate_from_real(&FromRealRequest::default()).await;
        assert_eq!(missing_text.error.as_deref(), Some("source_text is required"));
        let missing_url = generator
            .generate_from_real(&FromRealRequest {
                source_text: "Some article".into(),
                ..Default::default()
            })
            .await;
        assert_eq!(missing_url.error.as_deref(), Some("source_url is required"));
    }

    #[tokio::test]
    async fn test_batch_returns_one_result_per_topic() {
        let topics = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let results = offline().generate_batch(&topics, Some("conspiracy")).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.strategy.as_deref() == Some("conspiracy")));
    }

    #[test]
    fn test_service_info_flags_missing_key() {
        let info = offline().service_info();
        assert_eq!(info["requires_api_key"], true);
        assert_eq!(info["available_strategies"].as_object().unwrap().len(), 7);
        assert!(info["available_models"].as_array().unwrap().contains(&json!("gpt-4o")));
    }

    #[test]
    fn test_result_serializes_null_domain() {
        let value = serde_json::to_value(GenerationResult::failed("x")).unwrap();
        assert!(value["domain"].is_null());
        assert!(value.get("article").is_none());
    }
}
