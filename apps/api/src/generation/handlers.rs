//! Axum route handlers for the Generation API.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::activity::{self, user_info, ClientInfo};
use crate::auth::extractor::AuthUser;
use crate::detection::baseline::DETECTORS;
use crate::detection::text::truncate_chars;
use crate::errors::AppError;
use crate::extract::{fetch_url_content, is_url};
use crate::generation::generator::{FromRealRequest, GenerationResult, TopicRequest};
use crate::generation::strategies::{strategies_json, DEFAULT_STRATEGY};
use crate::generation::tone::{extract_topic, infer_domain_style, parse_hints};
use crate::history::auto_generation_pdf;
use crate::models::generation::GenerationRecord;
use crate::models::user::User;
use crate::state::AppState;
use crate::vision::DescribeOptions;

const HEADLINE_PROMPT: &str =
    "Please rewrite the first sentence of the summary as a concise, news-style headline.";
const HEADLINE_MAX_CHARS: usize = 120;
const SOURCE_SEARCH_SIZE: usize = 3;
const UNAVAILABLE_CONTENT: &str = "Article content unavailable";

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GenerationRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub length_control: Option<String>,
    #[serde(default)]
    pub emotional_tone: Option<String>,
    #[serde(default)]
    pub credibility_level: Option<String>,
    #[serde(default)]
    pub image_url_or_b64: Option<String>,
}

fn default_samples() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchGenerationRequest {
    pub topics: Vec<String>,
    #[serde(default = "default_samples")]
    pub samples_per_topic: usize,
    #[serde(default)]
    pub strategies: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct GenerationResponse {
    pub success: bool,
    pub result: GenerationResult,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BatchGenerationResponse {
    pub success: bool,
    pub results: Vec<GenerationResult>,
    pub total: usize,
    pub timestamp: DateTime<Utc>,
}

/// Real article the generation is anchored to.
#[derive(Debug, Clone, PartialEq)]
struct RealSource {
    url: String,
    text: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline helpers
// ────────────────────────────────────────────────────────────────────────────

/// Headline-style topic from an image, used when no topic was typed.
async fn topic_from_image(state: &AppState, image: &str) -> Option<String> {
    let options = DescribeOptions {
        additional_prompt: Some(HEADLINE_PROMPT.to_string()),
        ..DescribeOptions::default()
    };
    let vision = state.vision.describe_image(image, &options).await;
    match (vision.success, vision.description) {
        (true, Some(description)) if !description.trim().is_empty() => {
            let first = description.lines().next().unwrap_or_default().trim();
            let headline = if first.is_empty() { description.trim() } else { first };
            info!("Image description generated for generation topic");
            Some(truncate_chars(headline, HEADLINE_MAX_CHARS).to_string())
        }
        _ => {
            warn!(
                "Vision description failed (generation): {}",
                vision.error.as_deref().unwrap_or("empty description")
            );
            None
        }
    }
}

/// A URL topic is fetched directly; anything else is searched for and the
/// top hit's full text is fetched when possible.
async fn find_source(state: &AppState, topic: &str) -> Option<RealSource> {
    if is_url(topic) {
        let text = match fetch_url_content(&state.http, topic).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to fetch content from URL: {e}");
                UNAVAILABLE_CONTENT.to_string()
            }
        };
        return Some(RealSource {
            url: topic.to_string(),
            text,
        });
    }

    let news = state.news.search(topic, "en", SOURCE_SEARCH_SIZE).await;
    let article = news.articles.into_iter().next()?;
    let url = article.url.filter(|u| !u.is_empty())?;
    let summary = format!(
        "{}\n\n{}",
        article.title.unwrap_or_default(),
        article.description.unwrap_or_default()
    )
    .trim()
    .to_string();
    let text = match fetch_url_content(&state.http, &url).await {
        Ok(full) => full,
        Err(_) => summary,
    };
    (!text.is_empty()).then_some(RealSource { url, text })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

/// Stores the record and attaches a PDF when auto-generation is on.
async fn persist(state: &AppState, mut record: GenerationRecord) {
    if let Err(e) = state.store.insert_generation(&record).await {
        warn!("Failed to store {} generation record: {e}", record.generation_type);
        return;
    }
    if state.config.pdf_auto_generate {
        auto_generation_pdf(state.store.as_ref(), state.pdfs.as_ref(), &mut record).await;
    }
}

fn record_for(
    user: &User,
    generation_type: &str,
    topic: &str,
    strategy: &str,
    result: &GenerationResult,
    fallback_model: &str,
) -> GenerationRecord {
    let mut record = GenerationRecord::new(
        Some(user.id),
        generation_type,
        topic.to_string(),
        strategy.to_string(),
        result.model.clone().unwrap_or_else(|| fallback_model.to_string()),
    );
    record.generated_text = result.article.clone().unwrap_or_default();
    record.style = result.style.clone();
    record.domain = result.domain.clone();
    record
}

async fn run_single(
    state: &AppState,
    user: &User,
    client: &ClientInfo,
    request: GenerationRequest,
) -> Result<GenerationResponse, AppError> {
    info!("Generation request for topic: {}", truncate_chars(&request.topic, 100));
    let image = request
        .image_url_or_b64
        .as_deref()
        .filter(|i| !i.trim().is_empty());

    let image_topic = match image {
        Some(image) if request.topic.trim().is_empty() => topic_from_image(state, image).await,
        _ => None,
    };
    let prompt = image_topic.clone().unwrap_or_else(|| request.topic.clone());
    if prompt.trim().is_empty() {
        return Err(AppError::Validation(
            "Either topic or image_url_or_b64 must be provided".to_string(),
        ));
    }

    let (hinted_style, hinted_domain) = parse_hints(&prompt);
    let topic = extract_topic(&prompt);
    let source = find_source(state, &topic).await;

    let inference_text = match &source {
        Some(source) => format!("{topic} {}", source.text),
        None => topic.clone(),
    };
    let (inferred_domain, inferred_style) = infer_domain_style(&inference_text);
    let style = request
        .style
        .clone()
        .or_else(|| hinted_style.map(str::to_string))
        .or_else(|| inferred_style.map(str::to_string));
    let domain = request
        .domain
        .clone()
        .or_else(|| hinted_domain.map(str::to_string))
        .or_else(|| inferred_domain.map(str::to_string));

    let mut params = request.clone();
    if let Some(image_topic) = &image_topic {
        params.topic = image_topic.clone();
    }
    params.style = style.clone();
    params.domain = domain.clone();

    let result = match &source {
        Some(source) => {
            info!(
                "Generating from real news: {} (style={style:?}, domain={domain:?})",
                source.url
            );
            state
                .generator
                .generate_from_real(&FromRealRequest {
                    source_text: source.text.clone(),
                    source_url: source.url.clone(),
                    strategy: Some(DEFAULT_STRATEGY.to_string()),
                    model_type: request.model_type.clone(),
                    style: style.clone(),
                    domain: domain.clone(),
                    ..Default::default()
                })
                .await
        }
        None => {
            state
                .generator
                .generate(&TopicRequest {
                    topic: &topic,
                    strategy: request.strategy.as_deref(),
                    model: request.model_type.as_deref(),
                    style: style.as_deref(),
                    domain: domain.as_deref(),
                })
                .await
        }
    };

    let stored_topic = params.topic.clone();
    // Real-source articles are always written with the default strategy.
    let strategy = result
        .strategy
        .clone()
        .unwrap_or_else(|| DEFAULT_STRATEGY.to_string());
    let mut record = record_for(
        user,
        "single",
        &stored_topic,
        &strategy,
        &result,
        state.llm.default_model(),
    );
    let result_json = to_json(&result)?;
    record.style = style;
    record.domain = domain;
    record.image = request.image_url_or_b64.clone();
    record.params = to_json(&params)?;
    record.result = result_json.clone();
    persist(state, record).await;

    activity::record(
        state.store.as_ref(),
        "generate_single",
        user_info(Some(user)),
        json!({
            "topic": stored_topic,
            "strategy": strategy,
            "image_provided": image.is_some(),
            "image_url_or_b64": request.image_url_or_b64,
        }),
        json!({
            "ok": true,
            "article": result.article,
            "result": result_json,
        }),
        client,
    )
    .await;

    Ok(GenerationResponse {
        success: true,
        result,
        timestamp: Utc::now(),
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/generate/single
///
/// Anchors the article to a real source when one can be found (URL topic or
/// top news hit); otherwise writes from the topic alone.
pub async fn handle_generate_single(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    run_single(&state, &user, &client, request).await.map(Json)
}

/// POST /generate_text (legacy)
pub async fn handle_legacy_generate_text(
    state: State<AppState>,
    user: AuthUser,
    client: ClientInfo,
    request: Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    handle_generate_single(state, user, client, request).await
}

/// POST /api/generate/batch
///
/// One article per topic using the first listed strategy.
pub async fn handle_generate_batch(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Json(request): Json<BatchGenerationRequest>,
) -> Result<Json<BatchGenerationResponse>, AppError> {
    if request.topics.iter().all(|t| t.trim().is_empty()) {
        return Err(AppError::Validation("topics cannot be empty".to_string()));
    }
    info!("Batch generation request for {} topics", request.topics.len());
    let first_strategy = request
        .strategies
        .as_ref()
        .and_then(|s| s.first())
        .map(String::as_str);
    let results = state
        .generator
        .generate_batch(&request.topics, first_strategy)
        .await;

    let params = json!({
        "strategy": first_strategy,
        "samples_per_topic": request.samples_per_topic,
    });
    for result in &results {
        let mut record = record_for(
            &user,
            "batch",
            result.topic.as_deref().unwrap_or_default(),
            result.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY),
            result,
            state.llm.default_model(),
        );
        record.params = params.clone();
        record.result = to_json(result)?;
        persist(&state, record).await;
    }

    activity::record(
        state.store.as_ref(),
        "generate_batch",
        user_info(Some(&user)),
        json!({
            "topics": request.topics.len(),
            "samples_per_topic": request.samples_per_topic,
        }),
        json!({ "ok": true, "total": results.len() }),
        &client,
    )
    .await;

    Ok(Json(BatchGenerationResponse {
        success: true,
        total: results.len(),
        results,
        timestamp: Utc::now(),
    }))
}

/// POST /api/generate/from_real
pub async fn handle_generate_from_real(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Json(request): Json<FromRealRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    if request.source_text.trim().is_empty() || request.source_url.trim().is_empty() {
        return Err(AppError::Validation(
            "source_text and source_url are required".to_string(),
        ));
    }
    let result = state.generator.generate_from_real(&request).await;

    let topic = request
        .topic
        .clone()
        .unwrap_or_else(|| request.source_url.clone());
    let mut record = record_for(
        &user,
        "from_real",
        &topic,
        request.strategy.as_deref().unwrap_or(DEFAULT_STRATEGY),
        &result,
        state.llm.default_model(),
    );
    record.params = to_json(&request)?;
    record.result = to_json(&result)?;
    persist(&state, record).await;

    activity::record(
        state.store.as_ref(),
        "generate_from_real",
        user_info(Some(&user)),
        json!({ "source_url": request.source_url, "label": request.label }),
        json!({ "ok": result.success }),
        &client,
    )
    .await;

    Ok(Json(GenerationResponse {
        success: true,
        result,
        timestamp: Utc::now(),
    }))
}

/// GET /api/info/strategies
pub async fn handle_strategies() -> Json<Value> {
    Json(json!({
        "success": true,
        "strategies": strategies_json(),
        "timestamp": Utc::now(),
    }))
}

/// GET /api/info/models
pub async fn handle_models(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "models": state.generator.models(),
        "timestamp": Utc::now(),
    }))
}

/// GET /api/info/service
pub async fn handle_service_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "info": {
            "detection_models": DETECTORS,
            "generation_info": state.generator.service_info(),
            "improved_detection_features": [
                "rhetorical_analysis",
                "cross_modal_consistency",
                "detector_fusion",
            ],
        },
        "timestamp": Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    async fn signed_up(state: &AppState) -> User {
        let user = User::new(Some("writer".into()), Some("writer@example.com".into()));
        state.store.create_user(user).await.unwrap()
    }

    #[test]
    fn test_batch_request_defaults() {
        let request: BatchGenerationRequest =
            serde_json::from_value(json!({"topics": ["a", "b"]})).unwrap();
        assert_eq!(request.samples_per_topic, 5);
        assert!(request.strategies.is_none());
    }

    #[tokio::test]
    async fn test_single_without_topic_or_image_is_rejected() {
        let state = AppState::for_tests(Config::for_tests());
        let user = signed_up(&state).await;
        let err = run_single(&state, &user, &ClientInfo::default(), GenerationRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_single_stores_resolved_style_and_domain() {
        let state = AppState::for_tests(Config::for_tests());
        let user = signed_up(&state).await;
        let request = GenerationRequest {
            topic: "Write a sports news article in a fun tone about: cup final".into(),
            ..Default::default()
        };
        let response = run_single(&state, &user, &ClientInfo::default(), request)
            .await
            .unwrap();
        assert!(response.success);
        assert!(!response.result.success);

        let records = state.store.list_generations(user.id, None).await.unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.generation_type, "single");
        assert_eq!(record.strategy, DEFAULT_STRATEGY);
        assert_eq!(record.params["style"], "fun");
        assert_eq!(record.params["domain"], "sports");
        assert_eq!(record.style.as_deref(), Some("fun"));
        assert_eq!(record.topic, "Write a sports news article in a fun tone about: cup final");
    }

    #[tokio::test]
    async fn test_single_records_strategy_actually_applied() {
        let state = AppState::for_tests(Config::for_tests());
        let user = signed_up(&state).await;
        for (requested, applied) in [("conspiracy", "conspiracy"), ("no_such_strategy", DEFAULT_STRATEGY)] {
            let request = GenerationRequest {
                topic: format!("city council budget {requested}"),
                strategy: Some(requested.into()),
                ..Default::default()
            };
            run_single(&state, &user, &ClientInfo::default(), request)
                .await
                .unwrap();
            let records = state.store.list_generations(user.id, None).await.unwrap();
            let record = records
                .iter()
                .find(|r| r.topic.ends_with(requested))
                .unwrap();
            assert_eq!(record.strategy, applied);
        }
    }

    #[tokio::test]
    async fn test_info_handlers() {
        let Json(body) = handle_strategies().await;
        assert_eq!(body["strategies"].as_object().unwrap().len(), 7);

        let state = AppState::for_tests(Config::for_tests());
        let Json(body) = handle_service_info(State(state)).await;
        assert_eq!(body["info"]["detection_models"][0], "roberta");
        assert_eq!(body["info"]["generation_info"]["requires_api_key"], true);
    }
}
