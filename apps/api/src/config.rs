use anyhow::{Context, Result};

pub const DEFAULT_JWT_SECRET: &str = "your-secret-key-here";
const GOOGLE_SECURETOKEN_JWKS: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Application configuration loaded from environment variables.
///
/// Every external collaborator is optional: an unset key switches the
/// corresponding feature into its degraded mode instead of failing startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub s3: Option<S3Config>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub default_gpt_model: String,
    pub hf_api_token: Option<String>,
    pub hf_base_url: String,
    pub roberta_model: String,
    pub zero_shot_model: String,
    pub clip_model: String,
    pub tavily_api_key: Option<String>,
    pub tavily_base_url: String,
    pub wikipedia_api_url: String,
    pub news_api_key: Option<String>,
    pub news_api_base_url: String,
    pub serpapi_key: Option<String>,
    pub serpapi_base_url: String,
    pub jwt_secret_key: String,
    pub jwt_expire_minutes: i64,
    /// Firebase sync is refused until this is set.
    pub firebase_project_id: Option<String>,
    pub firebase_jwks_url: String,
    pub pdf_storage_base_path: String,
    pub pdf_auto_generate: bool,
    pub port: u16,
    pub rust_log: String,
}

/// S3 / MinIO settings. Only used when all four variables are present.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            redis_url: optional_env("REDIS_URL"),
            s3,
            openai_api_key: optional_env("OPENAI_API_KEY"),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            default_gpt_model: env_or("DEFAULT_GPT_MODEL", "gpt-4o"),
            hf_api_token: optional_env("HF_API_TOKEN"),
            hf_base_url: env_or("HF_BASE_URL", "https://api-inference.huggingface.co/models"),
            roberta_model: env_or("ROBERTA_MODEL", "hamzab/roberta-fake-news-classification"),
            zero_shot_model: env_or("ZERO_SHOT_MODEL", "facebook/bart-large-mnli"),
            clip_model: env_or("CLIP_MODEL", "openai/clip-vit-base-patch32"),
            tavily_api_key: optional_env("TAVILY_API_KEY"),
            tavily_base_url: env_or("TAVILY_BASE_URL", "https://api.tavily.com"),
            wikipedia_api_url: env_or("WIKIPEDIA_API_URL", "https://en.wikipedia.org/w/api.php"),
            news_api_key: optional_env("NEWS_API_KEY"),
            news_api_base_url: env_or("NEWS_API_BASE_URL", "https://newsapi.org/v2"),
            serpapi_key: optional_env("SERPAPI_KEY"),
            serpapi_base_url: env_or("SERPAPI_BASE_URL", "https://serpapi.com/search"),
            jwt_secret_key: env_or("JWT_SECRET_KEY", DEFAULT_JWT_SECRET),
            jwt_expire_minutes: env_or("JWT_ACCESS_TOKEN_EXPIRE_MINUTES", "60")
                .parse::<i64>()
                .context("JWT_ACCESS_TOKEN_EXPIRE_MINUTES must be an integer")?,
            firebase_project_id: optional_env("FIREBASE_PROJECT_ID"),
            firebase_jwks_url: env_or("FIREBASE_JWKS_URL", GOOGLE_SECURETOKEN_JWKS),
            pdf_storage_base_path: env_or("PDF_STORAGE_BASE_PATH", "storage"),
            pdf_auto_generate: parse_bool(&env_or("PDF_AUTO_GENERATE", "true")),
            port: env_or("PORT", "8000")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
        })
    }

    /// Configuration with every external service disabled. Used by tests.
    #[cfg(test)]
    pub fn for_tests() -> Self {
        Config {
            database_url: None,
            redis_url: None,
            s3: None,
            openai_api_key: None,
            openai_base_url: "http://127.0.0.1:9/v1".to_string(),
            default_gpt_model: "gpt-4o".to_string(),
            hf_api_token: None,
            hf_base_url: "http://127.0.0.1:9/models".to_string(),
            roberta_model: "roberta".to_string(),
            zero_shot_model: "zero-shot".to_string(),
            clip_model: "clip".to_string(),
            tavily_api_key: None,
            tavily_base_url: "http://127.0.0.1:9".to_string(),
            wikipedia_api_url: "http://127.0.0.1:9/w/api.php".to_string(),
            news_api_key: None,
            news_api_base_url: "http://127.0.0.1:9/v2".to_string(),
            serpapi_key: None,
            serpapi_base_url: "http://127.0.0.1:9/search".to_string(),
            jwt_secret_key: "test-secret".to_string(),
            jwt_expire_minutes: 60,
            firebase_project_id: None,
            firebase_jwks_url: "http://127.0.0.1:9/jwks".to_string(),
            pdf_storage_base_path: std::env::temp_dir()
                .join("veritas-test-storage")
                .to_string_lossy()
                .into_owned(),
            pdf_auto_generate: false,
            port: 8000,
            rust_log: "debug".to_string(),
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    optional_env(key).unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
