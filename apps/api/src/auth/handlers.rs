use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::activity::{self, ClientInfo};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::user::{ProfileUpdate, User};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub avatar_url_or_b64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Identity comes only from the verified ID token. The optional fields
/// override what the token carries for new accounts.
#[derive(Debug, Deserialize)]
pub struct FirebaseSyncRequest {
    #[serde(default)]
    pub id_token: String,
    pub display_name: Option<String>,
    pub avatar_url_or_b64: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAvatarRequest {
    pub avatar_url_or_b64: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url_or_b64: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub success: bool,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upserted: Option<bool>,
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

fn is_plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

fn token_response(state: &AppState, user: &User) -> Result<TokenResponse, AppError> {
    let access_token =
        state
            .tokens
            .issue(user.id, user.username.as_deref(), user.email.as_deref())?;
    Ok(TokenResponse {
        success: true,
        user_id: user.id,
        username: None,
        email: None,
        upserted: None,
        access_token,
        token_type: "bearer",
        expires_in: state.config.jwt_expire_minutes * 60,
    })
}

fn duplicate_to_conflict(err: StoreError, message: &str) -> AppError {
    match err {
        StoreError::Duplicate(_) => AppError::Conflict(message.to_string()),
        other => AppError::Store(other),
    }
}

/// POST /api/auth/register
pub async fn handle_register(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let username = req.username.trim();
    if username.chars().count() < 3 {
        return Err(AppError::UnprocessableEntity(
            "Username must be at least 3 characters".to_string(),
        ));
    }
    let email = req.email.trim();
    if !is_plausible_email(email) {
        return Err(AppError::UnprocessableEntity(
            "A valid email address is required".to_string(),
        ));
    }
    if req.password.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "Password cannot be empty".to_string(),
        ));
    }

    let mut user = User::new(Some(username.to_string()), Some(email.to_string()));
    user.password_hash = Some(hash_password(&req.password)?);
    user.avatar = req.avatar_url_or_b64.filter(|a| !a.is_empty());
    user.auth_provider = Some("password".to_string());

    let user = state
        .store
        .create_user(user)
        .await
        .map_err(|e| duplicate_to_conflict(e, "User already exists"))?;

    activity::record(
        state.store.as_ref(),
        "register",
        user.activity_info(),
        json!({}),
        json!({ "user_id": user.id }),
        &client,
    )
    .await;

    Ok(Json(token_response(&state, &user)?))
}

/// POST /api/auth/login
pub async fn handle_login(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let mut user = state
        .store
        .find_user_by_login(req.username_or_email.trim())
        .await?
        .ok_or_else(invalid)?;
    if !user.is_active {
        return Err(AppError::Forbidden("User account is inactive".to_string()));
    }
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !verify_password(&req.password, hash) {
        return Err(invalid());
    }

    user.last_login_at = Some(Utc::now());
    if let Err(e) = state.store.update_user(&user).await {
        tracing::warn!("Failed to record last login for {}: {e}", user.id);
    }

    activity::record(
        state.store.as_ref(),
        "login",
        user.activity_info(),
        json!({}),
        json!({ "ok": true }),
        &client,
    )
    .await;

    let mut response = token_response(&state, &user)?;
    response.username = user.username.clone();
    response.email = user.email.clone();
    Ok(Json(response))
}

/// GET /api/auth/me
pub async fn handle_me(AuthUser(user): AuthUser) -> Json<Value> {
    Json(json!({ "success": true, "user": user.profile() }))
}

/// POST /api/auth/firebase_sync
///
/// Exchanges a Firebase ID token for a backend token, creating the account
/// keyed by the token's uid on first sight. An email already owned by a
/// different account is a conflict, never a link.
pub async fn handle_firebase_sync(
    State(state): State<AppState>,
    client: ClientInfo,
    Json(req): Json<FirebaseSyncRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    let id_token = req.id_token.trim();
    if id_token.is_empty() {
        return Err(AppError::UnprocessableEntity("id_token is required".to_string()));
    }
    let claims = state.firebase.verify(id_token).await?;
    let uid = claims.sub.as_str();
    let provider = claims.provider();
    let email = claims
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty() && claims.email_verified)
        .map(str::to_string);

    let existing = state.store.find_user_by_uid(uid).await?;
    let upserted = existing.is_none();
    let user = match existing {
        Some(mut user) => {
            if !user.is_active {
                return Err(AppError::Forbidden("User account is inactive".to_string()));
            }
            if email.is_some() {
                user.email = email;
            }
            user.auth_provider = Some(provider.clone());
            user.updated_at = Utc::now();
            user.last_login_at = Some(Utc::now());
            state
                .store
                .update_user(&user)
                .await
                .map_err(|e| duplicate_to_conflict(e, "Email already in use by another user"))?;
            user
        }
        None => {
            if let Some(email) = email.as_deref() {
                if state.store.find_user_by_email(email).await?.is_some() {
                    return Err(AppError::Conflict(
                        "An account with this email already exists; sign in with its password"
                            .to_string(),
                    ));
                }
            }
            let mut user = User::new(None, email);
            user.uid = Some(uid.to_string());
            user.display_name = req.display_name.clone().or(claims.name.clone());
            user.avatar = req
                .avatar_url_or_b64
                .clone()
                .filter(|a| !a.is_empty())
                .or(claims.picture.clone());
            user.auth_provider = Some(provider.clone());
            user.last_login_at = Some(Utc::now());
            state
                .store
                .create_user(user)
                .await
                .map_err(|e| duplicate_to_conflict(e, "User already exists"))?
        }
    };

    activity::record(
        state.store.as_ref(),
        "firebase_sync",
        user.activity_info(),
        json!({ "provider": provider }),
        json!({ "upserted": upserted }),
        &client,
    )
    .await;

    let mut response = token_response(&state, &user)?;
    response.upserted = Some(upserted);
    Ok(Json(response))
}

/// POST /api/auth/update_avatar
pub async fn handle_update_avatar(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    client: ClientInfo,
    Json(req): Json<UpdateAvatarRequest>,
) -> Result<Json<Value>, AppError> {
    if req.avatar_url_or_b64.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(
            "avatar_url_or_b64 is required".to_string(),
        ));
    }
    user.avatar = Some(req.avatar_url_or_b64);
    user.updated_at = Utc::now();
    state.store.update_user(&user).await?;

    activity::record(
        state.store.as_ref(),
        "update_avatar",
        user.activity_info(),
        json!({ "avatar_provided": true }),
        json!({ "ok": true }),
        &client,
    )
    .await;

    Ok(Json(json!({ "success": true })))
}

/// PUT /api/auth/update_profile
pub async fn handle_update_profile(
    State(state): State<AppState>,
    AuthUser(mut user): AuthUser,
    client: ClientInfo,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<Value>, AppError> {
    let update = ProfileUpdate {
        display_name: req.display_name.clone().or_else(|| req.username.clone()),
        email: req.email.as_deref().map(str::trim).map(str::to_string),
        avatar: req.avatar_url_or_b64.clone(),
    };
    if update.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "No fields provided for update".to_string(),
        ));
    }

    let mut updated_fields = update.field_names();
    if let Some(display_name) = &req.display_name {
        user.display_name = Some(display_name.clone());
        if user.username.is_none() {
            user.username = Some(display_name.clone());
            updated_fields.push("username");
        }
    } else if let Some(username) = &req.username {
        user.username = Some(username.clone());
        updated_fields.retain(|f| *f != "display_name");
        updated_fields.push("username");
        if user.display_name.is_none() {
            user.display_name = Some(username.clone());
            updated_fields.push("display_name");
        }
    }
    if let Some(email) = update.email {
        if !is_plausible_email(&email) {
            return Err(AppError::UnprocessableEntity(
                "A valid email address is required".to_string(),
            ));
        }
        user.email = Some(email);
    }
    if let Some(avatar) = update.avatar {
        user.avatar = Some(avatar);
    }
    user.updated_at = Utc::now();

    state.store.update_user(&user).await.map_err(|e| match e {
        StoreError::Duplicate(field) if field == "email" => {
            AppError::Conflict("Email already in use by another user".to_string())
        }
        StoreError::Duplicate(field) => {
            AppError::Conflict(format!("The {field} is already in use by another user"))
        }
        other => AppError::Store(other),
    })?;

    activity::record(
        state.store.as_ref(),
        "update_profile",
        user.activity_info(),
        json!({ "updated_fields": updated_fields }),
        json!({ "ok": true }),
        &client,
    )
    .await;

    Ok(Json(json!({
        "success": true,
        "message": "Profile updated successfully",
        "updated_fields": updated_fields,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_plausibility() {
        assert!(is_plausible_email("a@example.com"));
        assert!(!is_plausible_email("a@example"));
        assert!(!is_plausible_email("@example.com"));
        assert!(!is_plausible_email("example.com"));
        assert!(!is_plausible_email("a@.com."));
    }
}
