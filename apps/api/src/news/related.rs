//! Related real-news lookup for a piece of text, optionally guided by the
//! entities Tavily verified during detection.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::newsapi::{EverythingQuery, HeadlinesQuery};
use super::{Article, NewsSearch, NewsService};
use crate::cache::cache_key;
use crate::detection::text::{entity_names, truncate_chars};

const CACHE_TTL: Duration = Duration::from_secs(300);
const FALLBACK_COUNTRIES: &[&str] = &["us", "gb", "au", "ca"];
const FALLBACK_CATEGORIES: &[&str] = &["science", "technology", "general"];

const ENTITY_NOISE: &[&str] = &[
    "with", "from", "to", "for", "by", "at", "in", "on", "of", "and", "or", "but", "the", "a",
    "an", "power", "has", "have",
];
const VERB_INDICATORS: &[&str] = &["power", "has", "have", "is", "are", "was", "were", "be"];

const KEYWORD_STOPWORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has", "had", "do",
    "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "this",
    "that", "these", "those", "it", "its", "they", "them", "their", "new", "said", "says",
    "over", "more", "also", "very", "just", "about", "into", "than", "some", "out", "only",
    "other", "such", "get", "make", "made", "like", "well", "back", "after", "two", "three",
    "way", "even", "year", "years", "much", "any", "most",
];

const BROAD_TERMS: &[&str] = &[
    "trump", "china", "australia", "news", "today", "report", "study", "research", "says", "new",
    "latest", "update",
];

static WORD3: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-zA-Z]{3,}\b").unwrap());
static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:19|20)\d{2}\b").unwrap());
static TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b[a-z0-9]{2,}\b").unwrap());

#[derive(Debug, Clone, Deserialize)]
pub struct RelatedQuery {
    pub text: String,
    #[serde(default)]
    pub detection_result: Option<Value>,
    #[serde(default)]
    pub max_results: Option<usize>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelatedNews {
    pub success: bool,
    pub articles: Vec<Article>,
    pub total_results: usize,
    #[serde(default)]
    pub search_query: String,
    #[serde(default)]
    pub entities_used: Vec<String>,
    #[serde(default)]
    pub keywords_used: Vec<String>,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Collapses whitespace, strips trailing punctuation and rejects numeric,
/// very short, very long or letter-free names.
fn clean_entity(raw: &str) -> Option<String> {
    let name = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let name = name.trim_end_matches(['.', ',', ';', ':', '-']).to_string();
    let len = name.chars().count();
    if name.chars().all(|c| c.is_ascii_digit())
        || len < 3
        || len > 50
        || !name.chars().any(char::is_alphabetic)
    {
        return None;
    }
    Some(name)
}

/// Entities carried by an improved-detection result, verified ones first.
pub fn entities_from_detection(result: &Value) -> Vec<String> {
    let Some(checks) = result
        .pointer("/tavily_verification/entity_results")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    let name_of = |c: &Value| c.get("entity").and_then(Value::as_str).and_then(clean_entity);
    let verified: Vec<String> = checks
        .iter()
        .filter(|c| c.get("exists").and_then(Value::as_bool).unwrap_or(false))
        .filter_map(name_of)
        .collect();
    if !verified.is_empty() {
        return verified;
    }
    checks.iter().filter_map(name_of).collect()
}

/// Capitalised spans from the first 1000 characters that look like clean names.
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    entity_names(truncate_chars(text, 1000), 50)
        .into_iter()
        .filter(|entity| {
            let words: Vec<String> = entity.split_whitespace().map(str::to_lowercase).collect();
            let (Some(first), Some(last)) = (words.first(), words.last()) else {
                return false;
            };
            let len = entity.chars().count();
            words.len() <= 3
                && !ENTITY_NOISE.contains(&first.as_str())
                && !ENTITY_NOISE.contains(&last.as_str())
                && !words.iter().any(|w| VERB_INDICATORS.contains(&w.as_str()))
                && entity.chars().next().is_some_and(char::is_uppercase)
                && (2..=40).contains(&len)
                && entity
                    .chars()
                    .filter(|c| *c != ' ' && *c != '-')
                    .all(char::is_alphabetic)
        })
        .filter(|entity| seen.insert(entity.to_lowercase()))
        .take(10)
        .collect()
}

/// Most frequent non-stopword words of three or more letters. Ties keep
/// first-appearance order.
pub fn extract_keywords(text: &str, max_keywords: usize) -> Vec<String> {
    let lower = text.to_lowercase();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for m in WORD3.find_iter(&lower) {
        let word = m.as_str();
        if KEYWORD_STOPWORDS.contains(&word) {
            continue;
        }
        match counts.iter_mut().find(|(w, _)| w == word) {
            Some((_, n)) => *n += 1,
            None => counts.push((word.to_string(), 1)),
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(max_keywords).map(|(w, _)| w).collect()
}

fn word_pattern(term: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(&term.to_lowercase()))).ok()
}

fn count_matches(term: &str, lower_text: &str) -> usize {
    word_pattern(term).map_or(0, |re| re.find_iter(lower_text).count())
}

pub fn entity_frequencies(text: &str, entities: &[String]) -> HashMap<String, usize> {
    let lower = text.to_lowercase();
    entities
        .iter()
        .map(|e| (e.clone(), count_matches(e, &lower)))
        .collect()
}

/// At least two words, and not a lone broad term.
pub fn is_specific_query(query: &str) -> bool {
    let words: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    match words.as_slice() {
        [only] if BROAD_TERMS.contains(&only.as_str()) => false,
        w => w.len() >= 2,
    }
}

/// Most frequent first, then multi-word, then longest.
fn sort_entities<'a>(
    mut list: Vec<&'a String>,
    frequencies: &HashMap<String, usize>,
) -> Vec<&'a String> {
    let key = |e: &String| {
        (
            frequencies.get(e).copied().unwrap_or(0),
            e.split_whitespace().count() > 1,
            e.len(),
        )
    };
    list.sort_by(|a, b| key(b).cmp(&key(a)));
    list
}

/// Up to two multi-word entities, up to three keywords not already covered
/// by an entity, then single-word entities while the query is short.
/// Entities mentioned at least twice go first.
pub fn build_search_query(
    text: &str,
    entities: &[String],
    keywords: &[String],
    frequencies: &HashMap<String, usize>,
) -> String {
    let freq = |e: &String| frequencies.get(e).copied().unwrap_or(0);
    let (high, low): (Vec<&String>, Vec<&String>) = entities.iter().partition(|e| freq(e) >= 2);
    let ordered: Vec<&String> = sort_entities(high, frequencies)
        .into_iter()
        .chain(sort_entities(low, frequencies))
        .collect();

    let multi: Vec<&String> = ordered
        .iter()
        .copied()
        .filter(|e| (2..=3).contains(&e.split_whitespace().count()))
        .collect();
    let single: Vec<&String> = ordered
        .iter()
        .copied()
        .filter(|e| e.split_whitespace().count() == 1)
        .collect();

    let mut parts: Vec<String> = multi.iter().take(2).map(|e| e.to_string()).collect();
    let entities_lower: Vec<String> = entities.iter().map(|e| e.to_lowercase()).collect();
    parts.extend(
        keywords
            .iter()
            .take(5)
            .filter(|k| !entities_lower.contains(k))
            .take(3)
            .cloned(),
    );
    if parts.len() < 4 {
        parts.extend(single.iter().take(2).map(|e| e.to_string()));
    }

    let mut seen = HashSet::new();
    let parts: Vec<String> = parts
        .into_iter()
        .filter(|p| seen.insert(p.to_lowercase()))
        .take(7)
        .collect();
    let mut query = parts.join(" ");

    if !is_specific_query(&query) {
        let context: Vec<&str> = text
            .split_whitespace()
            .take(15)
            .filter(|w| w.chars().count() > 4)
            .take(2)
            .collect();
        query = format!("{query} {}", context.join(" ")).trim().to_string();
    }
    info!("Related news search query: {query}");
    query
}

/// `YYYY-01-01` of the latest year mentioned, when it is 2000 or later and
/// not in the future.
pub fn from_date_for(text: &str) -> Option<String> {
    let latest = YEAR
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<i32>().ok())
        .max()?;
    (2000..=Utc::now().year())
        .contains(&latest)
        .then(|| format!("{latest}-01-01"))
}

fn tokens(text: &str) -> Vec<String> {
    TOKEN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|t| !KEYWORD_STOPWORDS.contains(&t.as_str()))
        .collect()
}

fn tfidf_vector<'a>(doc: &'a [String], df: &HashMap<&str, usize>, n: f64) -> HashMap<&'a str, f64> {
    let mut v: HashMap<&str, f64> = HashMap::new();
    for term in doc {
        *v.entry(term.as_str()).or_insert(0.0) += 1.0;
    }
    for (term, weight) in v.iter_mut() {
        let d = df.get(term).copied().unwrap_or(0) as f64;
        *weight *= ((1.0 + n) / (1.0 + d)).ln() + 1.0;
    }
    let norm = v.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.values_mut().for_each(|w| *w /= norm);
    }
    v
}

/// Cosine similarity of smoothed TF-IDF vectors between `source` and each
/// document, computed over this small corpus only.
pub fn tfidf_similarities(source: &str, documents: &[String]) -> Vec<f64> {
    let corpus: Vec<Vec<String>> = std::iter::once(source)
        .chain(documents.iter().map(String::as_str))
        .map(tokens)
        .collect();
    let n = corpus.len() as f64;
    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in &corpus {
        for term in doc.iter().map(String::as_str).collect::<HashSet<_>>() {
            *df.entry(term).or_insert(0) += 1;
        }
    }
    let vectors: Vec<HashMap<&str, f64>> =
        corpus.iter().map(|doc| tfidf_vector(doc, &df, n)).collect();
    let (head, rest) = vectors.split_at(1);
    rest.iter()
        .map(|doc| {
            head[0]
                .iter()
                .map(|(term, w)| w * doc.get(term).copied().unwrap_or(0.0))
                .sum::<f64>()
        })
        .collect()
}

/// Scores articles by word-bounded entity and keyword hits plus TF-IDF
/// similarity, highest first. Multi-word entity hits dominate; when
/// multi-word entities exist but none match, the score is cut to 30%.
pub fn rank_articles(
    mut articles: Vec<Article>,
    entities: &[String],
    keywords: &[String],
    source_text: &str,
) -> Vec<Article> {
    if articles.is_empty() {
        return articles;
    }
    let texts: Vec<String> = articles.iter().map(Article::searchable_text).collect();
    let similarities = if source_text.is_empty() {
        Vec::new()
    } else {
        tfidf_similarities(truncate_chars(source_text, 500), &texts)
    };

    let (multi, single): (Vec<&String>, Vec<&String>) = entities
        .iter()
        .partition(|e| e.split_whitespace().count() > 1);

    for (idx, (article, text)) in articles.iter_mut().zip(&texts).enumerate() {
        let lower = text.to_lowercase();
        let mut entity_score = 0.0;
        let mut multi_hits = 0;
        for entity in &multi {
            let n = count_matches(entity, &lower);
            if n > 0 {
                multi_hits += 1;
                entity_score += n as f64 * 15.0;
            }
        }
        for entity in &single {
            entity_score += count_matches(entity, &lower) as f64 * 3.0;
        }
        let keyword_score: f64 = keywords
            .iter()
            .map(|k| count_matches(k, &lower) as f64 * 2.0)
            .sum();

        let mut score = if multi_hits > 0 {
            entity_score + keyword_score + multi_hits as f64 * 10.0
        } else if !multi.is_empty() {
            (entity_score + keyword_score) * 0.3
        } else {
            entity_score + keyword_score
        };
        if let Some(sim) = similarities.get(idx) {
            score += sim * 20.0;
            article.tfidf_similarity = Some((sim * 1000.0).round() / 1000.0);
        }
        article.relevance_score = Some(score);
    }

    articles.sort_by(|a, b| {
        b.relevance_score
            .unwrap_or(0.0)
            .total_cmp(&a.relevance_score.unwrap_or(0.0))
    });
    articles
}

fn related_cache_key(text: &str, max_results: usize, language: &str) -> String {
    cache_key(
        "related_news",
        &format!("{}|{max_results}|{language}", truncate_chars(text, 100)),
    )
}

impl NewsService {
    /// Related coverage for `text`. Successful results are cached for five
    /// minutes, keyed on the first 100 characters of the text plus the
    /// requested size and language.
    pub async fn find_related(&self, query: &RelatedQuery) -> RelatedNews {
        let text = query.text.as_str();
        let max_results = query.max_results.unwrap_or(4).max(1);
        let language = query.language.as_deref().unwrap_or("en");

        let key = related_cache_key(text, max_results, language);
        if let Some(hit) = self.cache.get(&key).await {
            if let Ok(cached) = serde_json::from_value::<RelatedNews>(hit) {
                info!("Using cached related news result");
                return cached;
            }
        }

        let mut entities = query
            .detection_result
            .as_ref()
            .map(entities_from_detection)
            .unwrap_or_default();
        if entities.is_empty() {
            entities = extract_entities(text);
        }
        let mut seen = HashSet::new();
        entities.retain(|e| seen.insert(e.clone()));
        let keywords = extract_keywords(text, 5);
        let frequencies = entity_frequencies(text, &entities);
        let search_query = build_search_query(text, &entities, &keywords, &frequencies);
        let from_date = from_date_for(text);

        let mut result = if self.serpapi.is_available() {
            self.serpapi
                .search_google_news(&search_query, max_results * 2, None)
                .await
        } else {
            self.newsapi
                .search(&EverythingQuery {
                    query: &search_query,
                    language,
                    page_size: max_results,
                    from_date: from_date.as_deref(),
                })
                .await
        };

        if result.success && !result.articles.is_empty() {
            let mut ranked = rank_articles(result.articles, &entities, &keywords, text);
            ranked.truncate(max_results);
            result.articles = ranked;
        } else {
            result = self
                .headline_fallback(&search_query, &entities, &keywords, text, max_results)
                .await;
        }

        if !result.success {
            let error = result.error.unwrap_or_else(|| "No articles found".to_string());
            warn!("Related news search failed: {error}");
            return RelatedNews {
                error: Some(error),
                ..Default::default()
            };
        }

        let mut articles = result.articles;
        if articles.len() < max_results && !entities.is_empty() && !keywords.is_empty() {
            articles = self
                .supplement(articles, &entities, &keywords, text, max_results)
                .await;
        }
        articles.truncate(max_results);

        let related = RelatedNews {
            success: true,
            total_results: articles.len(),
            articles,
            search_query,
            entities_used: entities.into_iter().take(3).collect(),
            keywords_used: keywords,
            source: result.source.unwrap_or_else(|| "newsapi".to_string()),
            error: None,
        };
        if let Ok(value) = serde_json::to_value(&related) {
            self.cache.set(&key, &value, CACHE_TTL).await;
        }
        related
    }

    /// Country headlines matching the query, then category headlines when
    /// nothing matched at all.
    async fn headline_fallback(
        &self,
        search_query: &str,
        entities: &[String],
        keywords: &[String],
        text: &str,
        max_results: usize,
    ) -> NewsSearch {
        info!("Search returned nothing, trying top headlines");
        let mut collected: Vec<Article> = Vec::new();
        for country in FALLBACK_COUNTRIES {
            if collected.len() >= max_results * 2 {
                break;
            }
            let found = self
                .newsapi
                .top_headlines(&HeadlinesQuery {
                    country: *country,
                    category: None,
                    q: Some(search_query),
                    page_size: max_results,
                })
                .await;
            collected.extend(found.articles);
        }

        if collected.is_empty() && !entities.is_empty() {
            'categories: for category in FALLBACK_CATEGORIES {
                for country in ["us", "gb"] {
                    let found = self
                        .newsapi
                        .top_headlines(&HeadlinesQuery {
                            country,
                            category: Some(*category),
                            q: None,
                            page_size: max_results,
                        })
                        .await;
                    collected.extend(found.articles);
                    if collected.len() >= max_results * 2 {
                        break 'categories;
                    }
                }
                if collected.len() >= max_results {
                    break;
                }
            }
        }

        if collected.is_empty() {
            return NewsSearch::failed("No articles found");
        }
        let total = collected.len();
        let mut ranked = rank_articles(collected, entities, keywords, text);
        ranked.truncate(max_results);
        NewsSearch {
            success: true,
            total_results: total,
            articles: ranked,
            source: Some("newsapi".to_string()),
            ..Default::default()
        }
    }

    /// Tops up a short list with general US headlines, re-ranked together.
    async fn supplement(
        &self,
        articles: Vec<Article>,
        entities: &[String],
        keywords: &[String],
        text: &str,
        max_results: usize,
    ) -> Vec<Article> {
        let extra = self
            .newsapi
            .top_headlines(&HeadlinesQuery {
                country: "us",
                category: None,
                q: None,
                page_size: max_results * 2,
            })
            .await;
        if !extra.success || extra.articles.is_empty() {
            return articles;
        }
        let known: HashSet<String> = articles.iter().filter_map(|a| a.url.clone()).collect();
        let mut combined = articles;
        combined.extend(
            extra
                .articles
                .into_iter()
                .filter(|a| a.url.as_ref().map_or(true, |u| !known.contains(u))),
        );
        let mut ranked = rank_articles(combined, entities, keywords, text);
        ranked.truncate(max_results);
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, MemoryCache};
    use crate::news::newsapi::NewsApiClient;
    use crate::news::serpapi::SerpApiClient;
    use serde_json::json;
    use std::sync::Arc;

    fn article(title: &str, description: &str) -> Article {
        Article {
            title: Some(title.into()),
            description: Some(description.into()),
            url: Some(format!("https://example.com/{}", title.len())),
            ..Default::default()
        }
    }

    #[test]
    fn test_entities_from_detection_prefers_verified() {
        let result = json!({"tavily_verification": {"entity_results": [
            {"entity": "Eiffel Tower", "exists": true},
            {"entity": "2024", "exists": true},
            {"entity": "Paris\n  Council.", "exists": false},
            {"entity": "X", "exists": true}
        ]}});
        assert_eq!(entities_from_detection(&result), vec!["Eiffel Tower"]);

        let unverified = json!({"tavily_verification": {"entity_results": [
            {"entity": "Paris\n  Council.", "exists": false}
        ]}});
        assert_eq!(entities_from_detection(&unverified), vec!["Paris Council"]);
        assert!(entities_from_detection(&json!({})).is_empty());
    }

    #[test]
    fn test_keywords_by_frequency() {
        let text = "The bridge collapsed. Engineers inspected the bridge and the river. River levels rose near the bridge.";
        let keywords = extract_keywords(text, 3);
        assert_eq!(keywords, vec!["bridge", "river", "collapsed"]);
    }

    #[test]
    fn test_query_specificity() {
        assert!(!is_specific_query("china"));
        assert!(!is_specific_query("bridge"));
        assert!(is_specific_query("bridge collapse"));
    }

    #[test]
    fn test_build_query_prefers_frequent_multiword_entities() {
        let text = "Crews at the Golden Gate Bridge worked overnight. The Golden Gate Bridge reopened after inspection in San Francisco.";
        let entities = vec!["San Francisco".to_string(), "Golden Gate Bridge".to_string()];
        let keywords = vec!["golden".to_string(), "inspection".to_string(), "crews".to_string()];
        let freq = entity_frequencies(text, &entities);
        assert_eq!(freq["Golden Gate Bridge"], 2);
        let query = build_search_query(text, &entities, &keywords, &freq);
        assert!(query.starts_with("Golden Gate Bridge San Francisco"));
        assert!(query.contains("inspection"));
    }

    #[test]
    fn test_from_date_uses_latest_recent_year() {
        assert_eq!(from_date_for("Between 1998 and 2021 costs doubled").as_deref(), Some("2021-01-01"));
        assert!(from_date_for("In 1995 the plant opened").is_none());
        assert!(from_date_for("no years here").is_none());
    }

    #[test]
    fn test_rank_puts_entity_matches_first() {
        let articles = vec![
            article("Markets rally on earnings", "Stocks rose broadly"),
            article("Golden Gate Bridge reopens", "The Golden Gate Bridge reopened after repairs"),
        ];
        let entities = vec!["Golden Gate Bridge".to_string()];
        let keywords = vec!["repairs".to_string()];
        let ranked = rank_articles(articles, &entities, &keywords, "Golden Gate Bridge repairs finished");
        assert_eq!(ranked[0].title.as_deref(), Some("Golden Gate Bridge reopens"));
        assert!(ranked[0].relevance_score.unwrap() > ranked[1].relevance_score.unwrap());
        assert!(ranked[0].tfidf_similarity.unwrap() > 0.0);
    }

    #[test]
    fn test_tfidf_identical_document_scores_one() {
        let sims = tfidf_similarities(
            "storm floods coastal towns",
            &["storm floods coastal towns".to_string(), "football final tonight".to_string()],
        );
        assert!((sims[0] - 1.0).abs() < 1e-9);
        assert_eq!(sims[1], 0.0);
    }

    #[tokio::test]
    async fn test_cached_result_only_serves_matching_size_and_language() {
        let cache = Arc::new(MemoryCache::new(16));
        let http = reqwest::Client::new();
        let service = NewsService::new(
            NewsApiClient::new(http.clone(), None, "http://127.0.0.1:9/v2"),
            SerpApiClient::new(http, None, "http://127.0.0.1:9/search"),
            cache.clone(),
        );
        let text = "The Golden Gate Bridge reopened after repairs.";
        let cached = RelatedNews {
            success: true,
            search_query: "cached".into(),
            ..Default::default()
        };
        cache
            .set(
                &related_cache_key(text, 2, "en"),
                &serde_json::to_value(&cached).unwrap(),
                CACHE_TTL,
            )
            .await;

        let query = |max_results, language: Option<&str>| RelatedQuery {
            text: text.into(),
            detection_result: None,
            max_results: Some(max_results),
            language: language.map(str::to_string),
        };
        let hit = service.find_related(&query(2, None)).await;
        assert!(hit.success);
        assert_eq!(hit.search_query, "cached");

        let larger = service.find_related(&query(8, None)).await;
        assert!(!larger.success);
        let other_language = service.find_related(&query(2, Some("de"))).await;
        assert!(!other_language.success);
    }

    #[tokio::test]
    async fn test_find_related_without_keys_fails_softly() {
        let http = reqwest::Client::new();
        let service = NewsService::new(
            NewsApiClient::new(http.clone(), None, "http://127.0.0.1:9/v2"),
            SerpApiClient::new(http, None, "http://127.0.0.1:9/search"),
            Arc::new(MemoryCache::new(16)),
        );
        let result = service
            .find_related(&RelatedQuery {
                text: "The Golden Gate Bridge reopened after repairs.".into(),
                detection_result: None,
                max_results: Some(3),
                language: None,
            })
            .await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
