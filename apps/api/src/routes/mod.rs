pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};

use crate::auth::handlers as auth;
use crate::detection::handlers as detection;
use crate::generation::handlers as generation;
use crate::history::handlers as history;
use crate::news::handlers as news;
use crate::state::AppState;
use crate::vision::handlers::{self as vision, MAX_UPLOAD_BYTES};

/// Multipart overhead allowed on top of the image itself.
const UPLOAD_BODY_SLACK: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/db/health", get(health::db_health_handler))
        // Auth
        .route("/api/auth/register", post(auth::handle_register))
        .route("/api/auth/login", post(auth::handle_login))
        .route("/api/auth/me", get(auth::handle_me))
        .route("/api/auth/firebase_sync", post(auth::handle_firebase_sync))
        .route("/api/auth/update_avatar", post(auth::handle_update_avatar))
        .route("/api/auth/update_profile", put(auth::handle_update_profile))
        // Content
        .route("/api/url/fetch", post(detection::handle_url_fetch))
        .route("/api/vision/describe", post(vision::handle_describe))
        .route(
            "/api/vision/upload",
            post(vision::handle_upload)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + UPLOAD_BODY_SLACK)),
        )
        // Detection
        .route("/api/detect/baseline", post(detection::handle_detect_baseline))
        .route("/api/detect/improved", post(detection::handle_detect_improved))
        // Generation
        .route("/api/generate/single", post(generation::handle_generate_single))
        .route("/api/generate/batch", post(generation::handle_generate_batch))
        .route("/api/generate/from_real", post(generation::handle_generate_from_real))
        .route("/api/info/strategies", get(generation::handle_strategies))
        .route("/api/info/models", get(generation::handle_models))
        .route("/api/info/service", get(generation::handle_service_info))
        // News
        .route("/api/news/search", get(news::handle_search))
        .route("/api/news/find_related", post(news::handle_find_related))
        // History
        .route("/api/detection/history", get(history::handle_detection_history))
        .route(
            "/api/detection/history/:id",
            delete(history::handle_delete_detection),
        )
        .route(
            "/api/detection/history/:id/pdf",
            get(history::handle_detection_pdf),
        )
        .route(
            "/api/detection/history/:id/generate_pdf",
            post(history::handle_generate_detection_pdf),
        )
        .route("/api/generation/history", get(history::handle_generation_history))
        .route(
            "/api/generation/history/:id",
            delete(history::handle_delete_generation),
        )
        .route(
            "/api/generation/history/:id/pdf",
            get(history::handle_generation_pdf),
        )
        .route(
            "/api/generation/history/:id/generate_pdf",
            post(history::handle_generate_generation_pdf),
        )
        .route("/api/stats", get(history::handle_stats))
        // Legacy
        .route("/generate_text", post(generation::handle_legacy_generate_text))
        .route("/detect_text", post(detection::handle_legacy_detect_text))
        .route("/detect_multimodal", post(detection::handle_legacy_detect_multimodal))
        .route("/detect_hybrid", post(detection::handle_legacy_detect_hybrid))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> Router {
        build_router(AppState::for_tests(Config::for_tests()))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn register_as(app: Router, username: &str) -> String {
        let (status, body) = send(
            app,
            post_json(
                "/api/auth/register",
                json!({
                    "username": username,
                    "email": format!("{username}@example.com"),
                    "password": "s3cret-pass",
                }),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn register(app: Router) -> String {
        register_as(app, "alice").await
    }

    fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    fn put_json(uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
        let mut request = post_json(uri, body, token);
        *request.method_mut() = axum::http::Method::PUT;
        request
    }

    /// Router whose Firebase verifier trusts the local test signing key.
    fn firebase_app() -> (AppState, Router) {
        let mut state = AppState::for_tests(Config::for_tests());
        state.firebase = crate::auth::firebase::testing::verifier();
        (state.clone(), build_router(state))
    }

    #[tokio::test]
    async fn test_health_reports_memory_store() {
        let (status, body) = send(app(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["services"]["database"], "memory");
        assert_eq!(body["services"]["pdf_storage"], "local");
        assert_eq!(body["services"]["vision"]["client_available"], false);

        let (status, body) = send(app(), Request::get("/db/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["connected"], true);
    }

    #[tokio::test]
    async fn test_protected_routes_require_token() {
        let (status, _) = send(app(), Request::get("/api/stats").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            app(),
            post_json("/api/generate/single", json!({"topic": "x"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_detection_then_history_and_stats() {
        let app = app();
        let token = register(app.clone()).await;

        let (status, body) = send(
            app.clone(),
            post_json(
                "/api/detect/baseline",
                json!({"text": "Officials confirmed the bridge will reopen on Friday."}),
                Some(&token),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let record_id = body["record_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            app.clone(),
            Request::get("/api/detection/history")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);

        let (status, body) = send(
            app.clone(),
            Request::get("/api/stats")
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["detections"]["total"], 1);
        assert_eq!(body["detections"]["by_type"]["baseline"], 1);

        let (status, _) = send(
            app,
            Request::delete(format!("/api/detection/history/{record_id}"))
                .header("authorization", format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let app = app();
        register(app.clone()).await;

        let (status, _) = send(
            app.clone(),
            post_json(
                "/api/auth/register",
                json!({"username": "alice", "email": "other@example.com", "password": "x"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        for body in [
            json!({"username": "al", "email": "al@example.com", "password": "x"}),
            json!({"username": "carol", "email": "not-an-email", "password": "x"}),
            json!({"username": "carol", "email": "carol@example.com", "password": ""}),
        ] {
            let (status, _) = send(app.clone(), post_json("/api/auth/register", body, None)).await;
            assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[tokio::test]
    async fn test_login_wrong_password_and_inactive_account() {
        let state = AppState::for_tests(Config::for_tests());
        let app = build_router(state.clone());
        register(app.clone()).await;

        let (status, body) = send(
            app.clone(),
            post_json(
                "/api/auth/login",
                json!({"username_or_email": "alice", "password": "wrong"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid credentials");

        let (status, body) = send(
            app.clone(),
            post_json(
                "/api/auth/login",
                json!({"username_or_email": "alice@example.com", "password": "s3cret-pass"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");

        let mut user = state.store.find_user_by_login("alice").await.unwrap().unwrap();
        user.is_active = false;
        state.store.update_user(&user).await.unwrap();

        let (status, body) = send(
            app,
            post_json(
                "/api/auth/login",
                json!({"username_or_email": "alice", "password": "s3cret-pass"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "User account is inactive");
    }

    #[tokio::test]
    async fn test_profile_updates_require_bearer_token() {
        let app = app();
        register(app.clone()).await;

        let (status, _) = send(
            app.clone(),
            put_json(
                "/api/auth/update_profile",
                json!({"username_or_email": "alice", "email": "evil@example.com"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = send(
            app.clone(),
            post_json(
                "/api/auth/update_avatar",
                json!({"uid": "someone", "avatar_url_or_b64": "https://example.com/a.png"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(
            app,
            post_json(
                "/api/auth/login",
                json!({"username_or_email": "alice@example.com", "password": "s3cret-pass"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    #[tokio::test]
    async fn test_update_profile_validation_and_conflicts() {
        let app = app();
        register(app.clone()).await;
        let bob = register_as(app.clone(), "bob").await;

        let (status, body) = send(
            app.clone(),
            put_json("/api/auth/update_profile", json!({}), Some(&bob)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["message"], "No fields provided for update");

        let (status, _) = send(
            app.clone(),
            put_json("/api/auth/update_profile", json!({"email": "bob-at-example"}), Some(&bob)),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, body) = send(
            app.clone(),
            put_json("/api/auth/update_profile", json!({"email": "alice@example.com"}), Some(&bob)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["message"], "Email already in use by another user");

        let (status, body) = send(
            app.clone(),
            put_json("/api/auth/update_profile", json!({"display_name": "Bobby"}), Some(&bob)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["updated_fields"], json!(["display_name"]));

        let (_, body) = send(app, authed("GET", "/api/auth/me", &bob)).await;
        assert_eq!(body["user"]["display_name"], "Bobby");
    }

    #[tokio::test]
    async fn test_firebase_sync_requires_verified_token() {
        let (status, _) = send(app(), post_json("/api/auth/firebase_sync", json!({}), None)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        // No project configured.
        let (status, _) = send(
            app(),
            post_json("/api/auth/firebase_sync", json!({"id_token": "anything"}), None),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (_, app) = firebase_app();
        let (status, _) = send(
            app,
            post_json(
                "/api/auth/firebase_sync",
                json!({"id_token": "garbage", "uid": "attacker", "email": "alice@example.com"}),
                None,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_firebase_sync_never_links_existing_email() {
        use crate::auth::firebase::testing::{claims, sign};

        let (_, app) = firebase_app();
        register(app.clone()).await;

        let token = sign(&claims(
            "attacker-uid",
            json!({"email": "alice@example.com", "email_verified": true}),
        ));
        let (status, _) = send(
            app,
            post_json("/api/auth/firebase_sync", json!({"id_token": &token}), None),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_firebase_sync_creates_then_reuses_account() {
        use crate::auth::firebase::testing::{claims, sign};

        let (state, app) = firebase_app();
        let token = sign(&claims(
            "uid-carol",
            json!({"email": "carol@example.com", "email_verified": true, "name": "Carol"}),
        ));

        let (status, body) = send(
            app.clone(),
            post_json("/api/auth/firebase_sync", json!({"id_token": &token}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["upserted"], true);
        let user_id = body["user_id"].clone();
        let bearer = body["access_token"].as_str().unwrap().to_string();

        let (status, me) = send(app.clone(), authed("GET", "/api/auth/me", &bearer)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["user"]["email"], "carol@example.com");
        assert_eq!(me["user"]["display_name"], "Carol");

        let (status, body) = send(
            app.clone(),
            post_json("/api/auth/firebase_sync", json!({"id_token": &token}), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["upserted"], false);
        assert_eq!(body["user_id"], user_id);

        let mut user = state.store.find_user_by_uid("uid-carol").await.unwrap().unwrap();
        user.is_active = false;
        state.store.update_user(&user).await.unwrap();
        let (status, _) = send(
            app,
            post_json("/api/auth/firebase_sync", json!({"id_token": &token}), None),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_foreign_records_are_hidden() {
        let app = app();
        let alice = register(app.clone()).await;
        let bob = register_as(app.clone(), "bob").await;

        let (status, body) = send(
            app.clone(),
            post_json(
                "/api/detect/baseline",
                json!({"text": "Officials confirmed the bridge will reopen on Friday."}),
                Some(&alice),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let record_id = body["record_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            app.clone(),
            authed("GET", &format!("/api/detection/history/{record_id}/pdf"), &bob),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "You do not have access to this record");

        let (status, body) = send(
            app.clone(),
            authed("DELETE", &format!("/api/detection/history/{record_id}"), &bob),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(
            body["error"]["message"],
            "Record not found or does not belong to the current user"
        );

        let (_, body) = send(app.clone(), authed("GET", "/api/detection/history", &bob)).await;
        assert_eq!(body["total"], 0);
        let (_, body) = send(app, authed("GET", "/api/detection/history", &alice)).await;
        assert_eq!(body["total"], 1);
    }

    #[tokio::test]
    async fn test_empty_detection_input_is_bad_request() {
        let (status, _) = send(app(), post_json("/api/detect/improved", json!({"text": ""}), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_info_endpoints() {
        let (status, body) = send(
            app(),
            Request::get("/api/info/models").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["models"].as_array().unwrap().contains(&json!("gpt-4o")));
    }
}
