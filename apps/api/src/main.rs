mod activity;
mod auth;
mod cache;
mod config;
mod db;
mod detection;
mod errors;
mod extract;
mod generation;
mod hf_client;
mod history;
mod llm_client;
mod models;
mod news;
mod pdf;
mod routes;
mod state;
mod store;
mod verification;
mod vision;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{Cache, MemoryCache, RedisCache};
use crate::config::{Config, S3Config, DEFAULT_JWT_SECRET};
use crate::db::{create_pool, ensure_schema};
use crate::pdf::{LocalPdfStorage, PdfStorage, S3PdfStorage};
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemoryStore, PgStore, Store};

/// Entries kept by the in-process cache when Redis is not configured.
const MEMORY_CACHE_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("veritas_api={},tower_http=info", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Veritas API v{}", env!("CARGO_PKG_VERSION"));

    if config.jwt_secret_key == DEFAULT_JWT_SECRET {
        warn!("JWT_SECRET_KEY is not set; using the built-in development secret");
    }

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            ensure_schema(&pool).await?;
            info!("PostgreSQL store initialized");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; records are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let cache: Arc<dyn Cache> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str())?;
            info!("Redis cache initialized");
            Arc::new(RedisCache::new(client))
        }
        None => Arc::new(MemoryCache::new(MEMORY_CACHE_CAPACITY)),
    };

    let pdfs: Arc<dyn PdfStorage> = match &config.s3 {
        Some(s3) => {
            let client = build_s3_client(s3).await;
            info!("S3 PDF storage initialized (bucket: {})", s3.bucket);
            Arc::new(S3PdfStorage::new(client, s3.bucket.clone()))
        }
        None => {
            info!("PDF storage at {}", config.pdf_storage_base_path);
            Arc::new(LocalPdfStorage::new(config.pdf_storage_base_path.clone()))
        }
    };

    let state = AppState::build(config.clone(), store, cache, pdfs)?;
    if !state.llm.is_available() {
        warn!("OPENAI_API_KEY not set; generation and vision endpoints will report unavailable");
    }
    if !state.firebase.is_configured() {
        warn!("FIREBASE_PROJECT_ID not set; /api/auth/firebase_sync is disabled");
    }

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client for MinIO (local) or AWS (production).
async fn build_s3_client(s3: &S3Config) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &s3.access_key_id,
        &s3.secret_access_key,
        None,
        None,
        "veritas-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&s3.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
