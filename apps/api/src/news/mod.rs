//! Real-news lookup: NewsAPI, Google News through SerpAPI, and the related
//! news finder used next to detection results.

pub mod handlers;
pub mod newsapi;
pub mod related;
pub mod serpapi;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use newsapi::{EverythingQuery, NewsApiClient};
use serpapi::SerpApiClient;

/// Articles scoring below this share of quality checks are dropped from headlines.
pub const MIN_ARTICLE_QUALITY: f64 = 0.6;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ArticleSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// NewsAPI article shape. SerpAPI results are mapped into it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default)]
    pub source: ArticleSource,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, rename = "relevance_score", skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    #[serde(default, rename = "tfidf_similarity", skip_serializing_if = "Option::is_none")]
    pub tfidf_similarity: Option<f64>,
}

impl Article {
    /// Title, description and content joined for matching.
    pub fn searchable_text(&self) -> String {
        [&self.title, &self.description, &self.content]
            .iter()
            .filter_map(|f| f.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewsSearch {
    pub success: bool,
    pub total_results: usize,
    pub articles: Vec<Article>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Articles removed by the quality filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered: Option<usize>,
}

impl NewsSearch {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

fn longer_than(field: &Option<String>, min: usize) -> bool {
    field.as_deref().is_some_and(|s| s.chars().count() > min)
}

/// Share of basic quality checks an article passes: title, description,
/// content, source name and an http URL.
pub fn article_quality(article: &Article) -> f64 {
    let checks = [
        longer_than(&article.title, 10),
        longer_than(&article.description, 20),
        longer_than(&article.content, 50),
        article.source.name.as_deref().is_some_and(|n| !n.is_empty()),
        article.url.as_deref().is_some_and(|u| u.starts_with("http")),
    ];
    checks.iter().filter(|c| **c).count() as f64 / checks.len() as f64
}

pub fn filter_articles(articles: Vec<Article>, min_quality: f64) -> Vec<Article> {
    articles
        .into_iter()
        .filter(|a| article_quality(a) >= min_quality)
        .collect()
}

#[derive(Clone)]
pub struct NewsService {
    newsapi: NewsApiClient,
    serpapi: SerpApiClient,
    cache: Arc<dyn Cache>,
}

impl NewsService {
    pub fn new(newsapi: NewsApiClient, serpapi: SerpApiClient, cache: Arc<dyn Cache>) -> Self {
        Self {
            newsapi,
            serpapi,
            cache,
        }
    }

    pub fn service_info(&self) -> serde_json::Value {
        serde_json::json!({
            "newsapi": self.newsapi.is_available(),
            "serpapi": self.serpapi.is_available(),
        })
    }

    /// Plain NewsAPI `/everything` search, newest first.
    pub async fn search(&self, query: &str, language: &str, page_size: usize) -> NewsSearch {
        self.newsapi
            .search(&EverythingQuery {
                query,
                language,
                page_size,
                from_date: None,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_article() -> Article {
        Article {
            source: ArticleSource {
                id: None,
                name: Some("Reuters".into()),
            },
            title: Some("Council approves transport budget".into()),
            description: Some("The city council approved a larger budget for buses.".into()),
            content: Some("The council voted 7-2 on Tuesday to expand bus routes across the city, officials said.".into()),
            url: Some("https://example.com/story".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_article_quality_scores() {
        assert_eq!(article_quality(&full_article()), 1.0);
        assert_eq!(article_quality(&Article::default()), 0.0);

        let mut thin = full_article();
        thin.content = Some("short".into());
        thin.description = None;
        assert!((article_quality(&thin) - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_filter_drops_low_quality() {
        let mut poor = full_article();
        poor.content = None;
        poor.description = None;
        poor.url = Some("ftp://example.com".into());
        let kept = filter_articles(vec![full_article(), poor], MIN_ARTICLE_QUALITY);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_article_wire_names() {
        let value = serde_json::to_value(full_article()).unwrap();
        assert!(value.get("urlToImage").is_some());
        assert!(value.get("publishedAt").is_some());
        assert!(value.get("relevance_score").is_none());
        let parsed: Article = serde_json::from_value(serde_json::json!({
            "title": "T",
            "publishedAt": "2024-05-01T10:00:00Z",
            "source": {"id": null, "name": "BBC News"}
        }))
        .unwrap();
        assert_eq!(parsed.published_at.as_deref(), Some("2024-05-01T10:00:00Z"));
        assert_eq!(parsed.source.name.as_deref(), Some("BBC News"));
    }
}
