use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tracing::info;

use super::stats::{compute, Stats};
use super::{
    attach_detection_pdf, attach_generation_pdf, ensure_access, filter_detections,
    filter_generations, paginate, parse_record_id, HistoryQuery, Page,
};
use crate::auth::extractor::AuthUser;
use crate::errors::AppError;
use crate::models::detection::DetectionRecord;
use crate::models::generation::GenerationRecord;
use crate::pdf::ReportKind;
use crate::state::AppState;

fn pdf_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// GET /api/detection/history
pub async fn handle_detection_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<DetectionRecord>>, AppError> {
    let records = state
        .store
        .list_detections(user.id, query.detection_type.as_deref())
        .await?;
    let records = filter_detections(records, &query);
    Ok(Json(paginate(records, query.page, query.page_size)))
}

/// DELETE /api/detection/history/:id
pub async fn handle_delete_detection(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_record_id(&raw_id)?;
    match state.store.get_detection(id).await? {
        Some(record) if record.user_id == Some(user.id) => {}
        _ => {
            return Err(AppError::NotFound(
                "Record not found or does not belong to the current user".to_string(),
            ))
        }
    }
    if !state.store.delete_detection(id).await? {
        return Err(AppError::NotFound("Record not found".to_string()));
    }
    info!("Deleted detection record {id} for user {}", user.id);
    Ok(Json(json!({
        "success": true,
        "message": "Record deleted successfully",
        "deleted_id": id,
    })))
}

async fn owned_detection(state: &AppState, raw_id: &str, user: uuid::Uuid) -> Result<DetectionRecord, AppError> {
    let id = parse_record_id(raw_id)?;
    let record = state
        .store
        .get_detection(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;
    ensure_access(record.user_id, user)?;
    Ok(record)
}

async fn owned_generation(state: &AppState, raw_id: &str, user: uuid::Uuid) -> Result<GenerationRecord, AppError> {
    let id = parse_record_id(raw_id)?;
    let record = state
        .store
        .get_generation(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Record not found".to_string()))?;
    ensure_access(record.user_id, user)?;
    Ok(record)
}

/// GET /api/detection/history/:id/pdf
pub async fn handle_detection_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let record = owned_detection(&state, &raw_id, user.id).await?;
    let path = record
        .pdf_path
        .ok_or_else(|| AppError::NotFound("PDF not generated for this record".to_string()))?;
    let bytes = state.pdfs.load(&path).await?;
    Ok(pdf_response(bytes, &ReportKind::Detection.download_name(record.id)))
}

/// POST /api/detection/history/:id/generate_pdf
pub async fn handle_generate_detection_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut record = owned_detection(&state, &raw_id, user.id).await?;
    let url = attach_detection_pdf(state.store.as_ref(), state.pdfs.as_ref(), &mut record).await?;
    Ok(Json(json!({
        "success": true,
        "message": "PDF generated successfully",
        "pdf_url": url,
    })))
}

/// GET /api/generation/history
pub async fn handle_generation_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Page<GenerationRecord>>, AppError> {
    let records = state
        .store
        .list_generations(user.id, query.strategy.as_deref())
        .await?;
    let records = filter_generations(records, &query);
    Ok(Json(paginate(records, query.page, query.page_size)))
}

/// DELETE /api/generation/history/:id
pub async fn handle_delete_generation(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let id = parse_record_id(&raw_id)?;
    match state.store.get_generation(id).await? {
        Some(record) if record.user_id == Some(user.id) => {}
        _ => {
            return Err(AppError::NotFound(
                "Record not found or does not belong to the current user".to_string(),
            ))
        }
    }
    if !state.store.delete_generation(id).await? {
        return Err(AppError::NotFound("Record not found".to_string()));
    }
    info!("Deleted generation record {id} for user {}", user.id);
    Ok(Json(json!({
        "success": true,
        "message": "Record deleted successfully",
        "deleted_id": id,
    })))
}

/// GET /api/generation/history/:id/pdf
pub async fn handle_generation_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Response, AppError> {
    let record = owned_generation(&state, &raw_id, user.id).await?;
    let path = record
        .pdf_path
        .ok_or_else(|| AppError::NotFound("PDF not generated for this record".to_string()))?;
    let bytes = state.pdfs.load(&path).await?;
    Ok(pdf_response(bytes, &ReportKind::Generation.download_name(record.id)))
}

/// POST /api/generation/history/:id/generate_pdf
pub async fn handle_generate_generation_pdf(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let mut record = owned_generation(&state, &raw_id, user.id).await?;
    let url = attach_generation_pdf(state.store.as_ref(), state.pdfs.as_ref(), &mut record).await?;
    Ok(Json(json!({
        "success": true,
        "message": "PDF generated successfully",
        "pdf_url": url,
    })))
}

/// GET /api/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Value>, AppError> {
    let detections = state.store.list_detections(user.id, None).await?;
    let generations = state.store.list_generations(user.id, None).await?;
    let Stats {
        detections,
        generations,
    } = compute(&detections, &generations);
    Ok(Json(json!({
        "success": true,
        "detections": detections,
        "generations": generations,
    })))
}
