use axum::{
    extract::{Multipart, State},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use serde_json::json;

use super::image::sniff_mime;
use super::{DescribeOptions, ImageDescription, OutputMode};
use crate::activity::{self, user_info, ClientInfo};
use crate::auth::extractor::MaybeAuthUser;
use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

/// Upload size cap for multipart images.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct VisionDescribeRequest {
    pub image_url_or_b64: String,
    #[serde(default)]
    pub detail_level: Option<String>,
    #[serde(default)]
    pub additional_prompt: Option<String>,
    #[serde(default)]
    pub output_mode: Option<OutputMode>,
    #[serde(default)]
    pub max_chars: Option<i64>,
}

impl VisionDescribeRequest {
    fn options(&self) -> DescribeOptions {
        DescribeOptions {
            detail_level: self
                .detail_level
                .clone()
                .unwrap_or_else(|| "high".to_string()),
            additional_prompt: self.additional_prompt.clone(),
            output_mode: self.output_mode.unwrap_or_default(),
            max_chars: self.max_chars,
        }
    }
}

async fn describe_and_log(
    state: &AppState,
    user: Option<&User>,
    client: &ClientInfo,
    image: &str,
    options: &DescribeOptions,
    logged_image: Option<&str>,
) -> ImageDescription {
    let result = state.vision.describe_image(image, options).await;
    activity::record(
        state.store.as_ref(),
        "vision_describe",
        user_info(user),
        json!({
            "image_provided": !image.is_empty(),
            "image_url_or_b64": logged_image,
            "detail_level": options.detail_level,
        }),
        json!({ "ok": result.success, "error": result.error }),
        client,
    )
    .await;
    result
}

/// POST /api/vision/describe
///
/// Failures from the vision model come back in the body with `success: false`.
pub async fn handle_describe(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    client: ClientInfo,
    Json(request): Json<VisionDescribeRequest>,
) -> Result<Json<ImageDescription>, AppError> {
    if request.image_url_or_b64.trim().is_empty() {
        return Err(AppError::Validation("image_url_or_b64 is required".to_string()));
    }
    let options = request.options();
    let image = request.image_url_or_b64.as_str();
    Ok(Json(
        describe_and_log(&state, user.as_ref(), &client, image, &options, Some(image)).await,
    ))
}

/// POST /api/vision/upload
///
/// Multipart variant: a `file` part plus optional `detail_level`,
/// `additional_prompt`, `output_mode` and `max_chars` text parts.
pub async fn handle_upload(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    client: ClientInfo,
    mut multipart: Multipart,
) -> Result<Json<ImageDescription>, AppError> {
    let mut image: Option<(String, Vec<u8>)> = None;
    let mut options = DescribeOptions::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" | "image" => {
                let declared = field
                    .content_type()
                    .filter(|m| m.starts_with("image/"))
                    .map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
                if bytes.len() > MAX_UPLOAD_BYTES {
                    return Err(AppError::Validation("Image exceeds the 10 MB limit".to_string()));
                }
                let mime = declared.unwrap_or_else(|| sniff_mime(&bytes).to_string());
                image = Some((mime, bytes.to_vec()));
            }
            "detail_level" | "additional_prompt" | "output_mode" | "max_chars" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Invalid field '{name}': {e}")))?;
                apply_option(&mut options, &name, value.trim())?;
            }
            _ => {}
        }
    }

    let (mime, bytes) =
        image.ok_or_else(|| AppError::Validation("Missing image file part".to_string()))?;
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded image is empty".to_string()));
    }
    let data_uri = format!("data:{mime};base64,{}", STANDARD.encode(&bytes));
    Ok(Json(
        describe_and_log(&state, user.as_ref(), &client, &data_uri, &options, None).await,
    ))
}

fn apply_option(options: &mut DescribeOptions, name: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() {
        return Ok(());
    }
    match name {
        "detail_level" => options.detail_level = value.to_string(),
        "additional_prompt" => options.additional_prompt = Some(value.to_string()),
        "output_mode" => {
            options.output_mode = match value.to_ascii_lowercase().as_str() {
                "concise" => OutputMode::Concise,
                "detailed" => OutputMode::Detailed,
                other => {
                    return Err(AppError::Validation(format!("Unknown output_mode '{other}'")))
                }
            }
        }
        "max_chars" => {
            options.max_chars = Some(
                value
                    .parse()
                    .map_err(|_| AppError::Validation("max_chars must be an integer".to_string()))?,
            )
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_options_defaults() {
        let request: VisionDescribeRequest =
            serde_json::from_value(json!({"image_url_or_b64": "AAAA"})).unwrap();
        let options = request.options();
        assert_eq!(options.detail_level, "high");
        assert_eq!(options.output_mode, OutputMode::Detailed);
        assert!(options.max_chars.is_none());

        let request: VisionDescribeRequest = serde_json::from_value(json!({
            "image_url_or_b64": "AAAA",
            "output_mode": "concise",
            "max_chars": 80
        }))
        .unwrap();
        assert_eq!(request.options().output_mode, OutputMode::Concise);
        assert_eq!(request.options().max_chars, Some(80));
    }

    #[test]
    fn test_apply_multipart_options() {
        let mut options = DescribeOptions::default();
        apply_option(&mut options, "output_mode", "Concise").unwrap();
        apply_option(&mut options, "max_chars", "150").unwrap();
        apply_option(&mut options, "detail_level", "low").unwrap();
        apply_option(&mut options, "additional_prompt", "").unwrap();
        assert_eq!(options.output_mode, OutputMode::Concise);
        assert_eq!(options.max_chars, Some(150));
        assert_eq!(options.detail_level, "low");
        assert!(options.additional_prompt.is_none());
        assert!(apply_option(&mut options, "max_chars", "many").is_err());
        assert!(apply_option(&mut options, "output_mode", "verbose").is_err());
    }
}
