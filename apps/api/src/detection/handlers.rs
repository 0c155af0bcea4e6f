//! Axum route handlers for the Detection API.

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use super::improved::DetectionConfig;
use super::text::truncate_chars;
use crate::activity::{self, user_info, ClientInfo};
use crate::auth::extractor::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::extract::{fetch_url_content, is_url, ExtractError};
use crate::history::auto_detection_pdf;
use crate::models::detection::DetectionRecord;
use crate::models::user::User;
use crate::state::AppState;
use crate::vision::DescribeOptions;

const FETCHED_PREVIEW_CHARS: usize = 5000;
const VISION_TEXT_CHARS: usize = 1000;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRequest {
    pub text: String,
    #[serde(default)]
    pub image_url_or_b64: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct HybridDetectionRequest {
    pub text: String,
    #[serde(default)]
    pub image_url_or_b64: Option<String>,
    #[serde(default = "default_true")]
    pub use_improved_detection: bool,
    #[serde(default)]
    pub detection_config: Option<DetectionConfig>,
}

#[derive(Debug, Deserialize)]
pub struct UrlFetchRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub success: bool,
    pub result: Value,
    /// `None` when the record could not be stored.
    pub record_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_url: Option<String>,
}

/// Text actually analysed, plus the URL it was fetched from if any.
#[derive(Debug, Clone, PartialEq)]
struct DetectionInput {
    text: String,
    original_url: Option<String>,
}

impl DetectionResponse {
    fn new(result: Value, record_id: Option<Uuid>, input: &DetectionInput) -> Self {
        let fetched_content = input
            .original_url
            .as_ref()
            .map(|_| truncate_chars(&input.text, FETCHED_PREVIEW_CHARS).to_string());
        Self {
            success: true,
            result,
            record_id,
            timestamp: Utc::now(),
            fetched_content,
            original_url: input.original_url.clone(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline helpers
// ────────────────────────────────────────────────────────────────────────────

/// Swaps a URL for its article text and an empty text for an image
/// description. Both steps fall back to the original input on failure.
async fn prepare_input(state: &AppState, raw: &str, image: Option<&str>) -> DetectionInput {
    let mut text = raw.trim().to_string();
    let mut original_url = None;

    if is_url(&text) {
        info!("Detected URL input, fetching content from: {}", truncate_chars(&text, 80));
        match fetch_url_content(&state.http, &text).await {
            Ok(content) => original_url = Some(std::mem::replace(&mut text, content)),
            Err(e) => warn!("Could not extract content from URL ({e}); using the URL as text"),
        }
    }

    if text.is_empty() {
        if let Some(image) = image {
            let vision = state
                .vision
                .describe_image(image, &DescribeOptions::default())
                .await;
            match (vision.success, vision.description) {
                (true, Some(description)) if !description.trim().is_empty() => {
                    text = truncate_chars(&description, VISION_TEXT_CHARS).to_string();
                    info!("Image description generated for detection input");
                }
                _ => warn!(
                    "Vision description failed: {}",
                    vision.error.as_deref().unwrap_or("empty description")
                ),
            }
        }
    }

    DetectionInput { text, original_url }
}

fn validate(text: &str, image: Option<&str>) -> Result<(), AppError> {
    if text.trim().is_empty() && image.map_or(true, |i| i.trim().is_empty()) {
        return Err(AppError::Validation(
            "Either text or image_url_or_b64 must be provided".to_string(),
        ));
    }
    Ok(())
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.into()))
}

/// Stores the record and attaches a PDF when auto-generation is on.
/// Storage failures are logged; detection results are still returned.
async fn persist(state: &AppState, mut record: DetectionRecord) -> Option<Uuid> {
    if let Err(e) = state.store.insert_detection(&record).await {
        warn!("Failed to store {} detection record: {e}", record.detection_type);
        return None;
    }
    if state.config.pdf_auto_generate {
        auto_detection_pdf(state.store.as_ref(), state.pdfs.as_ref(), &mut record).await;
    }
    Some(record.id)
}

fn request_meta(text: &str, image: Option<&str>) -> Value {
    json!({
        "text_preview": truncate_chars(text, 300),
        "image_provided": image.is_some(),
        "image_url_or_b64": image,
    })
}

async fn run_baseline(
    state: &AppState,
    user: Option<&User>,
    client: &ClientInfo,
    request: DetectionRequest,
) -> Result<DetectionResponse, AppError> {
    info!("Baseline detection request for text: {}...", truncate_chars(&request.text, 100));
    let image = request.image_url_or_b64.as_deref();
    validate(&request.text, image)?;

    let input = prepare_input(state, &request.text, image).await;
    let baseline = state.baseline.detect(&input.text, image, None).await;
    let result = to_json(&baseline)?;

    let record = DetectionRecord::new(
        user.map(|u| u.id),
        "baseline",
        input.text.clone(),
        request.image_url_or_b64.clone(),
        json!({}),
        result.clone(),
    );
    let record_id = persist(state, record).await;

    activity::record(
        state.store.as_ref(),
        "detect_baseline",
        user_info(user),
        request_meta(&input.text, image),
        json!({ "ok": true, "result": &result }),
        client,
    )
    .await;

    Ok(DetectionResponse::new(result, record_id, &input))
}

async fn run_improved(
    state: &AppState,
    user: Option<&User>,
    client: &ClientInfo,
    request: HybridDetectionRequest,
) -> Result<DetectionResponse, AppError> {
    if !request.use_improved_detection {
        let request = DetectionRequest {
            text: request.text,
            image_url_or_b64: request.image_url_or_b64,
        };
        return run_baseline(state, user, client, request).await;
    }

    info!("Improved detection request for text: {}...", truncate_chars(&request.text, 100));
    let image = request.image_url_or_b64.as_deref();
    validate(&request.text, image)?;
    let config = request.detection_config.clone().unwrap_or_default();

    let input = prepare_input(state, &request.text, image).await;
    let baseline = state
        .baseline
        .detect(&input.text, image, config.use_models.as_deref())
        .await;
    let baseline_json = to_json(&baseline)?;
    let improved = state.improved.detect(baseline, &input.text, &config).await;
    let result = to_json(&improved)?;

    let mut record = DetectionRecord::new(
        user.map(|u| u.id),
        "improved",
        input.text.clone(),
        request.image_url_or_b64.clone(),
        to_json(&config)?,
        result.clone(),
    );
    record.baseline = Some(baseline_json);
    let record_id = persist(state, record).await;

    let mut meta = request_meta(&input.text, image);
    meta["use_improved"] = json!(true);
    activity::record(
        state.store.as_ref(),
        "detect_improved",
        user_info(user),
        meta,
        json!({ "ok": true, "result": &result }),
        client,
    )
    .await;

    Ok(DetectionResponse::new(result, record_id, &input))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/detect/baseline
pub async fn handle_detect_baseline(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    client: ClientInfo,
    Json(request): Json<DetectionRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    run_baseline(&state, user.as_ref(), &client, request)
        .await
        .map(Json)
}

/// POST /api/detect/improved
///
/// Baseline detectors followed by verification, rhetorical, consistency and
/// fusion analysis. `use_improved_detection: false` falls back to baseline only.
pub async fn handle_detect_improved(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    client: ClientInfo,
    Json(request): Json<HybridDetectionRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    run_improved(&state, user.as_ref(), &client, request)
        .await
        .map(Json)
}

/// POST /api/url/fetch
pub async fn handle_url_fetch(
    State(state): State<AppState>,
    Json(request): Json<UrlFetchRequest>,
) -> Result<Json<Value>, AppError> {
    let url = request.url.trim();
    if !is_url(url) {
        return Err(AppError::Validation("Invalid URL provided".to_string()));
    }
    let content = match fetch_url_content(&state.http, url).await {
        Ok(content) => content,
        Err(ExtractError::InvalidUrl) => {
            return Err(AppError::Validation("Invalid URL provided".to_string()))
        }
        Err(e) => {
            warn!("URL fetch failed for {url}: {e}");
            return Err(AppError::UnprocessableEntity(
                "Failed to fetch content from URL".to_string(),
            ));
        }
    };
    Ok(Json(json!({
        "success": true,
        "fetched_content": content,
        "original_url": url,
    })))
}

/// POST /detect_text (legacy, requires sign-in)
pub async fn handle_legacy_detect_text(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    client: ClientInfo,
    Json(request): Json<DetectionRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    run_baseline(&state, Some(&user), &client, request)
        .await
        .map(Json)
}

/// POST /detect_multimodal (legacy)
pub async fn handle_legacy_detect_multimodal(
    state: State<AppState>,
    user: MaybeAuthUser,
    client: ClientInfo,
    request: Json<DetectionRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    handle_detect_baseline(state, user, client, request).await
}

/// POST /detect_hybrid (legacy)
pub async fn handle_legacy_detect_hybrid(
    state: State<AppState>,
    user: MaybeAuthUser,
    client: ClientInfo,
    request: Json<HybridDetectionRequest>,
) -> Result<Json<DetectionResponse>, AppError> {
    handle_detect_improved(state, user, client, request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_hybrid_request_defaults() {
        let request: HybridDetectionRequest =
            serde_json::from_value(json!({"text": "Some claim"})).unwrap();
        assert!(request.use_improved_detection);
        assert!(request.detection_config.is_none());
        assert!(request.image_url_or_b64.is_none());

        let request: HybridDetectionRequest = serde_json::from_value(json!({
            "text": "Some claim",
            "use_improved_detection": false,
            "detection_config": {"use_rhetorical": false, "threshold": 0.7}
        }))
        .unwrap();
        let config = request.detection_config.unwrap();
        assert!(!config.use_rhetorical);
        assert!(config.use_wikipedia);
        assert_eq!(config.threshold, 0.7);
    }

    #[test]
    fn test_response_carries_fetched_preview_only_for_urls() {
        let plain = DetectionInput {
            text: "plain text".into(),
            original_url: None,
        };
        let body = serde_json::to_value(DetectionResponse::new(json!({}), None, &plain)).unwrap();
        assert!(body.get("fetched_content").is_none());
        assert!(body.get("original_url").is_none());
        assert!(body["record_id"].is_null());

        let fetched = DetectionInput {
            text: "x".repeat(6000),
            original_url: Some("https://example.com/story".into()),
        };
        let response = DetectionResponse::new(json!({}), Some(Uuid::new_v4()), &fetched);
        assert_eq!(response.fetched_content.unwrap().len(), FETCHED_PREVIEW_CHARS);
        assert_eq!(response.original_url.as_deref(), Some("https://example.com/story"));
    }

    #[test]
    fn test_validate_requires_text_or_image() {
        assert!(validate("  ", None).is_err());
        assert!(validate("", Some(" ")).is_err());
        assert!(validate("", Some("https://img.example.com/a.png")).is_ok());
        assert!(validate("text", None).is_ok());
    }

    #[tokio::test]
    async fn test_baseline_run_is_stored_and_logged() {
        let state = AppState::for_tests(Config::for_tests());
        let request = DetectionRequest {
            text: "The city council approved a new budget on Monday.".into(),
            image_url_or_b64: None,
        };
        let response = run_baseline(&state, None, &ClientInfo::default(), request)
            .await
            .unwrap();
        let id = response.record_id.unwrap();
        let stored = state.store.get_detection(id).await.unwrap().unwrap();
        assert_eq!(stored.detection_type, "baseline");
        assert!(stored.user_id.is_none());
        assert!(response.result.get("ensemble").is_some());
    }

    #[tokio::test]
    async fn test_improved_run_keeps_baseline_and_config() {
        let state = AppState::for_tests(Config::for_tests());
        let user = User::new(Some("alice".into()), Some("alice@example.com".into()));
        let request: HybridDetectionRequest = serde_json::from_value(json!({
            "text": "Scientists say the new bridge will open next year after repairs.",
            "detection_config": {"threshold": 0.6}
        }))
        .unwrap();
        let response = run_improved(&state, Some(&user), &ClientInfo::default(), request)
            .await
            .unwrap();
        let stored = state
            .store
            .get_detection(response.record_id.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.detection_type, "improved");
        assert_eq!(stored.user_id, Some(user.id));
        assert!(stored.baseline.is_some());
        assert_eq!(stored.config["threshold"], 0.6);
        assert!(stored.verdict.is_some());
        assert!(response.result.get("final_prediction").is_some());
    }
}
