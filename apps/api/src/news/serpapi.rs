//! Google News search through SerpAPI, mapped into the NewsAPI article shape.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::{Article, ArticleSource, NewsSearch};

const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct SerpResponse {
    #[serde(default)]
    news_results: Vec<SerpNewsItem>,
}

#[derive(Debug, Deserialize)]
struct SerpNewsItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    snippet: Option<String>,
    #[serde(default)]
    link: Option<String>,
    /// Either `{"name": ...}` or a bare string.
    #[serde(default)]
    source: Value,
    #[serde(default)]
    date: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
}

impl From<SerpNewsItem> for Article {
    fn from(item: SerpNewsItem) -> Self {
        let name = match &item.source {
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            Value::String(s) => Some(s.clone()),
            _ => None,
        };
        Article {
            source: ArticleSource {
                id: None,
                name: Some(name.unwrap_or_else(|| "Unknown".to_string())),
            },
            author: None,
            title: item.title,
            description: item.snippet.clone(),
            url: item.link,
            url_to_image: item.thumbnail,
            published_at: item.date,
            content: item.snippet,
            relevance_score: None,
            tfidf_similarity: None,
        }
    }
}

/// Quotes 2-3 word phrases, keeps 4-5 words as-is, and ANDs only the first
/// three terms of longer queries so Google does not return nothing.
pub fn optimize_query(query: &str, use_and_logic: bool) -> String {
    let words: Vec<&str> = query.split_whitespace().collect();
    if !use_and_logic || words.len() <= 1 {
        return query.to_string();
    }
    match words.len() {
        2..=3 => format!("\"{query}\""),
        4..=5 => query.to_string(),
        _ => format!(
            "{} {}",
            words[..3].join(" AND "),
            words[3..words.len().min(6)].join(" ")
        ),
    }
}

#[derive(Clone)]
pub struct SerpApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl SerpApiClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>, base_url: &str) -> Self {
        Self {
            http,
            api_key,
            base_url: base_url.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// `time_period` is passed through as Google's `tbs` value, e.g. `qdr:w`.
    pub async fn search_google_news(
        &self,
        query: &str,
        num_results: usize,
        time_period: Option<&str>,
    ) -> NewsSearch {
        let Some(api_key) = self.api_key.as_deref() else {
            return NewsSearch::failed("SerpAPI key not configured");
        };

        let optimized = optimize_query(query, true);
        info!("SerpAPI search: original='{query}', optimized='{optimized}', num={num_results}");

        let mut params = vec![
            ("engine", "google".to_string()),
            ("q", optimized),
            ("tbm", "nws".to_string()),
            ("api_key", api_key.to_string()),
            ("num", num_results.to_string()),
        ];
        if let Some(tbs) = time_period {
            params.push(("tbs", tbs.to_string()));
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&params)
            .timeout(TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());
        let body = match response {
            Ok(r) => r.json::<SerpResponse>().await,
            Err(e) if e.is_timeout() => {
                warn!("SerpAPI request timeout");
                return NewsSearch::failed("Request timeout");
            }
            Err(e) => {
                warn!("SerpAPI request failed: {e}");
                return NewsSearch::failed(format!("Request failed: {e}"));
            }
        };
        let body = match body {
            Ok(b) => b,
            Err(e) => return NewsSearch::failed(format!("Unexpected response: {e}")),
        };

        let articles: Vec<Article> = body
            .news_results
            .into_iter()
            .take(num_results)
            .map(Article::from)
            .collect();
        if articles.is_empty() {
            warn!("No news results from SerpAPI for query: {query}");
        }
        NewsSearch {
            success: true,
            total_results: articles.len(),
            articles,
            source: Some("serpapi".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optimize_query_by_length() {
        assert_eq!(optimize_query("bridge", true), "bridge");
        assert_eq!(optimize_query("Eiffel Tower fire", true), "\"Eiffel Tower fire\"");
        assert_eq!(
            optimize_query("city council budget vote today", true),
            "city council budget vote today"
        );
        assert_eq!(
            optimize_query("one two three four five six seven", true),
            "one AND two AND three four five six"
        );
        assert_eq!(optimize_query("Eiffel Tower fire", false), "Eiffel Tower fire");
    }

    #[test]
    fn test_item_mapping_handles_both_source_shapes() {
        let item: SerpNewsItem = serde_json::from_value(json!({
            "title": "Storm hits coast",
            "snippet": "Heavy rain...",
            "link": "https://news.example.com/a",
            "source": {"name": "Example News"},
            "date": "2 hours ago"
        }))
        .unwrap();
        let article = Article::from(item);
        assert_eq!(article.source.name.as_deref(), Some("Example News"));
        assert_eq!(article.content, article.description);

        let item: SerpNewsItem =
            serde_json::from_value(json!({"title": "T", "source": "Wire"})).unwrap();
        assert_eq!(Article::from(item).source.name.as_deref(), Some("Wire"));

        let item: SerpNewsItem = serde_json::from_value(json!({"title": "T"})).unwrap();
        assert_eq!(Article::from(item).source.name.as_deref(), Some("Unknown"));
    }

    #[tokio::test]
    async fn test_missing_key() {
        let client = SerpApiClient::new(reqwest::Client::new(), None, "http://127.0.0.1:9/search");
        let result = client.search_google_news("storm", 4, None).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("SerpAPI key not configured"));
    }
}
