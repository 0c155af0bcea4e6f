use std::time::Duration;

use serde::Deserialize;
use tracing::{error, warn};

use super::{filter_articles, Article, NewsSearch, MIN_ARTICLE_QUALITY};

const USER_AGENT: &str = "VeritasNewsService/1.0";
const TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsApiResponse {
    status: String,
    #[serde(default)]
    total_results: usize,
    #[serde(default)]
    articles: Vec<Article>,
    #[serde(default)]
    message: Option<String>,
}

/// `/everything` parameters.
#[derive(Debug, Clone)]
pub struct EverythingQuery<'a> {
    pub query: &'a str,
    pub language: &'a str,
    pub page_size: usize,
    /// `YYYY-MM-DD` lower bound on publication date.
    pub from_date: Option<&'a str>,
}

/// `/top-headlines` parameters.
#[derive(Debug, Clone)]
pub struct HeadlinesQuery<'a> {
    pub country: &'a str,
    pub category: Option<&'a str>,
    pub q: Option<&'a str>,
    pub page_size: usize,
}

#[derive(Clone)]
pub struct NewsApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl NewsApiClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>, base_url: &str) -> Self {
        if api_key.is_none() {
            warn!("NEWS_API_KEY not set; NewsAPI lookups are disabled");
        }
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<NewsApiResponse, String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| "News API key not configured".to_string())?;
        let response = self
            .http
            .get(format!("{}/{path}", self.base_url))
            .header("X-Api-Key", api_key)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .query(params)
            .timeout(TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                error!("News API request to /{path} failed: {e}");
                format!("Request failed: {e}")
            })?;
        let body: NewsApiResponse = response
            .json()
            .await
            .map_err(|e| format!("Unexpected response: {e}"))?;
        if body.status != "ok" {
            return Err(format!(
                "News API error: {}",
                body.message.as_deref().unwrap_or("Unknown error")
            ));
        }
        Ok(body)
    }

    pub async fn search(&self, query: &EverythingQuery<'_>) -> NewsSearch {
        let mut params = vec![
            ("q", query.query.to_string()),
            ("language", query.language.to_string()),
            ("sortBy", "publishedAt".to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if let Some(from) = query.from_date {
            params.push(("from", from.to_string()));
        }
        match self.get("everything", &params).await {
            Ok(body) => NewsSearch {
                success: true,
                total_results: body.total_results,
                articles: body.articles,
                source: Some("newsapi".to_string()),
                ..Default::default()
            },
            Err(e) => NewsSearch::failed(e),
        }
    }

    /// Top headlines, with low-quality articles filtered out.
    pub async fn top_headlines(&self, query: &HeadlinesQuery<'_>) -> NewsSearch {
        let mut params = vec![
            ("country", query.country.to_string()),
            ("pageSize", query.page_size.to_string()),
        ];
        if let Some(category) = query.category {
            params.push(("category", category.to_string()));
        }
        if let Some(q) = query.q {
            params.push(("q", q.to_string()));
        }
        match self.get("top-headlines", &params).await {
            Ok(body) => {
                let fetched = body.articles.len();
                let articles = filter_articles(body.articles, MIN_ARTICLE_QUALITY);
                NewsSearch {
                    success: true,
                    total_results: articles.len(),
                    filtered: Some(fetched - articles.len()),
                    articles,
                    source: Some("newsapi".to_string()),
                    error: None,
                }
            }
            Err(e) => NewsSearch::failed(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_reports_failure() {
        let client = NewsApiClient::new(reqwest::Client::new(), None, "http://127.0.0.1:9/v2");
        assert!(!client.is_available());
        let result = client
            .search(&EverythingQuery {
                query: "bridge",
                language: "en",
                page_size: 3,
                from_date: None,
            })
            .await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("News API key not configured"));
        assert!(result.articles.is_empty());
    }

    #[test]
    fn test_response_parsing() {
        let body: NewsApiResponse = serde_json::from_value(serde_json::json!({
            "status": "ok",
            "totalResults": 2,
            "articles": [{"title": "A"}, {"title": "B"}]
        }))
        .unwrap();
        assert_eq!(body.total_results, 2);
        assert_eq!(body.articles[1].title.as_deref(), Some("B"));
    }
}
