use std::sync::Arc;

use crate::auth::firebase::FirebaseVerifier;
use crate::auth::jwt::TokenIssuer;
use crate::cache::Cache;
use crate::config::Config;
use crate::detection::baseline::BaselineDetector;
use crate::detection::improved::ImprovedDetector;
use crate::generation::generator::Generator;
use crate::hf_client::HfClient;
use crate::llm_client::{LlmClient, LlmError};
use crate::news::newsapi::NewsApiClient;
use crate::news::serpapi::SerpApiClient;
use crate::news::NewsService;
use crate::pdf::PdfStorage;
use crate::store::Store;
use crate::verification::{TavilyVerifier, WikipediaClient};
use crate::vision::VisionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Postgres when `DATABASE_URL` is set, in-memory otherwise.
    pub store: Arc<dyn Store>,
    pub pdfs: Arc<dyn PdfStorage>,
    pub tokens: TokenIssuer,
    pub firebase: FirebaseVerifier,
    /// Shared HTTP client for URL fetching.
    pub http: reqwest::Client,
    pub llm: LlmClient,
    pub baseline: BaselineDetector,
    pub improved: ImprovedDetector,
    pub vision: VisionService,
    pub generator: Generator,
    pub news: NewsService,
}

impl AppState {
    /// Wires every service from configuration around the chosen backends.
    pub fn build(
        config: Config,
        store: Arc<dyn Store>,
        cache: Arc<dyn Cache>,
        pdfs: Arc<dyn PdfStorage>,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; VeritasBot/1.0)")
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        let llm = LlmClient::new(
            config.openai_api_key.clone(),
            &config.openai_base_url,
            &config.default_gpt_model,
        )?;

        let hf = HfClient::new(http.clone(), config.hf_api_token.clone(), &config.hf_base_url);
        let wikipedia = WikipediaClient::new(http.clone(), &config.wikipedia_api_url);
        let baseline = BaselineDetector::new(
            hf,
            llm.clone(),
            wikipedia,
            http.clone(),
            &config.roberta_model,
            &config.zero_shot_model,
            &config.clip_model,
        );
        let verifier = TavilyVerifier::new(
            http.clone(),
            config.tavily_api_key.clone(),
            &config.tavily_base_url,
            cache.clone(),
        );
        let news = NewsService::new(
            NewsApiClient::new(http.clone(), config.news_api_key.clone(), &config.news_api_base_url),
            SerpApiClient::new(http.clone(), config.serpapi_key.clone(), &config.serpapi_base_url),
            cache,
        );

        Ok(Self {
            tokens: TokenIssuer::new(&config.jwt_secret_key, config.jwt_expire_minutes),
            firebase: FirebaseVerifier::new(
                http.clone(),
                config.firebase_project_id.clone(),
                &config.firebase_jwks_url,
            ),
            store,
            pdfs,
            baseline,
            improved: ImprovedDetector::new(verifier),
            vision: VisionService::new(llm.clone(), http.clone()),
            generator: Generator::new(llm.clone()),
            news,
            llm,
            http,
            config,
        })
    }

    /// In-memory store, cache and a temp-dir PDF store.
    #[cfg(test)]
    pub fn for_tests(config: Config) -> Self {
        use crate::cache::MemoryCache;
        use crate::pdf::LocalPdfStorage;
        use crate::store::MemoryStore;

        let pdfs = Arc::new(LocalPdfStorage::new(config.pdf_storage_base_path.clone()));
        Self::build(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryCache::new(64)),
            pdfs,
        )
        .expect("test state")
    }
}
