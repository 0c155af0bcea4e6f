use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::state::AppState;

/// GET /
/// Service banner.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "service": "veritas-api",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/api/info/service",
    }))
}

/// GET /health
/// Reports which collaborators are configured.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
        "services": {
            "detection": state.baseline.models_loaded(),
            "improved_detection": state.improved.verifier_available(),
            "generation": state.llm.is_available(),
            "vision": state.vision.service_info(),
            "news": state.news.service_info(),
            "database": state.store.backend(),
            "pdf_storage": state.pdfs.backend(),
            "firebase_auth": state.firebase.is_configured(),
        }
    }))
}

/// GET /db/health
pub async fn db_health_handler(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let backend = state.store.backend();
    state.store.health().await.map_err(|e| {
        AppError::ServiceUnavailable(format!("Database ({backend}) unreachable: {e}"))
    })?;
    Ok(Json(json!({ "connected": true, "backend": backend })))
}
