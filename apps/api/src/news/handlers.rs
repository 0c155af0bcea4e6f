use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use super::related::RelatedQuery;
use crate::activity::{self, user_info, ClientInfo};
use crate::auth::extractor::MaybeAuthUser;
use crate::detection::text::truncate_chars;
use crate::errors::AppError;
use crate::state::AppState;

fn default_page_size() -> usize {
    4
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
pub struct NewsSearchParams {
    pub q: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_language")]
    pub language: String,
}

/// GET /api/news/search
pub async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<NewsSearchParams>,
) -> Result<Json<Value>, AppError> {
    if params.q.trim().is_empty() {
        return Err(AppError::Validation("q is required".to_string()));
    }
    let page_size = params.page_size.clamp(1, 100);
    let result = state
        .news
        .search(params.q.trim(), &params.language, page_size)
        .await;
    Ok(Json(json!({
        "success": result.success,
        "result": result,
        "timestamp": Utc::now(),
    })))
}

/// POST /api/news/find_related
///
/// `detection_result` may carry a prior improved-detection payload; its
/// verified entities steer the search.
pub async fn handle_find_related(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    client: ClientInfo,
    Json(query): Json<RelatedQuery>,
) -> Result<Json<Value>, AppError> {
    if query.text.trim().is_empty() {
        return Err(AppError::Validation("text is required".to_string()));
    }
    let result = state.news.find_related(&query).await;

    activity::record(
        state.store.as_ref(),
        "find_related_news",
        user_info(user.as_ref()),
        json!({
            "text_preview": truncate_chars(&query.text, 200),
            "max_results": query.max_results.unwrap_or(4),
        }),
        json!({
            "success": result.success,
            "articles_found": result.articles.len(),
            "search_query": result.search_query,
        }),
        &client,
    )
    .await;

    Ok(Json(json!({
        "success": result.success,
        "result": result,
        "timestamp": Utc::now(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_defaults() {
        let params: NewsSearchParams =
            serde_json::from_value(json!({"q": "flood warning"})).unwrap();
        assert_eq!(params.page_size, 4);
        assert_eq!(params.language, "en");
    }

    #[test]
    fn test_related_query_defaults() {
        let query: RelatedQuery = serde_json::from_value(json!({"text": "Storm hits coast"})).unwrap();
        assert!(query.detection_result.is_none());
        assert!(query.max_results.is_none());
    }
}
