//! Tavily-backed entity and claim verification.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::cache::{cache_key, Cache};
use crate::detection::text::truncate_chars;

/// Domains Tavily is asked to prioritise.
const RELIABLE_DOMAINS: &[&str] = &["wikipedia.org", "reuters.com", "bbc.com", "apnews.com"];
const CACHE_TTL: Duration = Duration::from_secs(3600);
const TRUE_MARKERS: &[&str] = &["true", "confirmed", "verified", "accurate"];
const FALSE_MARKERS: &[&str] = &["false", "fake", "misleading", "unverified"];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub published_date: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub results: Vec<SearchHit>,
    #[serde(default)]
    pub query: String,
}

impl SearchResult {
    fn answer(&self) -> &str {
        self.answer.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityCheck {
    pub entity: String,
    pub exists: bool,
    pub confidence: f64,
    pub summary: Option<String>,
    pub sources: Vec<String>,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Evidence {
    pub source: String,
    pub title: String,
    pub snippet: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimCheck {
    pub claim: String,
    pub verified: bool,
    pub confidence: f64,
    pub evidence: Vec<Evidence>,
    /// `true`, `false` or `unknown`, read from the search answer.
    pub verdict: String,
    pub answer: String,
    pub sources_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComprehensiveVerification {
    pub verification_score: f64,
    pub entity_coverage: f64,
    pub claim_accuracy: f64,
    pub entities_checked: usize,
    pub entities_found: usize,
    pub claims_checked: usize,
    pub claims_verified: usize,
    #[serde(default)]
    pub entity_results: Vec<EntityCheck>,
    #[serde(default)]
    pub claim_results: Vec<ClaimCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ComprehensiveVerification {
    /// Neutral result returned when no API key is configured.
    pub fn unavailable() -> Self {
        Self {
            verification_score: 0.5,
            entity_coverage: 0.0,
            claim_accuracy: 0.0,
            entities_checked: 0,
            entities_found: 0,
            claims_checked: 0,
            claims_verified: 0,
            entity_results: Vec::new(),
            claim_results: Vec::new(),
            provider: None,
            details: Some("Tavily client not available".to_string()),
        }
    }
}

/// Verification snapshot carried through improved detection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TavilyVerification {
    pub overall_score: f64,
    pub tavily_coverage: f64,
    pub wikipedia_coverage: f64,
    pub entities_found: usize,
    pub entities_checked: usize,
    pub claims_verified: usize,
    pub claims_checked: usize,
    #[serde(default)]
    pub entity_results: Vec<EntityCheck>,
    #[serde(default)]
    pub claim_results: Vec<ClaimCheck>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TavilyVerification {
    pub fn from_comprehensive(v: ComprehensiveVerification) -> Self {
        Self {
            overall_score: v.verification_score,
            tavily_coverage: v.entity_coverage,
            wikipedia_coverage: v.entity_coverage,
            entities_found: v.entities_found,
            entities_checked: v.entities_checked,
            claims_verified: v.claims_verified,
            claims_checked: v.claims_checked,
            entity_results: v.entity_results,
            claim_results: v.claim_results,
            provider: "tavily".to_string(),
            error: None,
        }
    }

    /// Stand-in used when verification did not finish in time.
    pub fn fallback(quick_score: f64) -> Self {
        let coverage = if quick_score > 0.5 { 1.0 } else { 0.5 };
        Self {
            overall_score: quick_score,
            tavily_coverage: coverage,
            wikipedia_coverage: coverage,
            entities_found: 1,
            entities_checked: 1,
            claims_verified: usize::from(quick_score > 0.7),
            claims_checked: 1,
            entity_results: Vec::new(),
            claim_results: Vec::new(),
            provider: "tavily".to_string(),
            error: None,
        }
    }

    pub fn claims_ratio(&self) -> f64 {
        if self.claims_checked > 0 {
            self.claims_verified as f64 / self.claims_checked as f64
        } else {
            0.0
        }
    }

    pub fn entities_ratio(&self) -> f64 {
        if self.entities_checked > 0 {
            self.entities_found as f64 / self.entities_checked as f64
        } else {
            0.0
        }
    }
}

#[derive(Clone)]
pub struct TavilyVerifier {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    cache: Arc<dyn Cache>,
}

impl TavilyVerifier {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        base_url: &str,
        cache: Arc<dyn Cache>,
    ) -> Self {
        if api_key.is_none() {
            warn!("TAVILY_API_KEY not set; fact verification will be limited");
        }
        Self {
            http,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache,
        }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Advanced-depth search. Failures are logged and yield an empty result.
    pub async fn search(&self, query: &str, max_results: usize) -> SearchResult {
        let Some(api_key) = self.api_key.as_deref() else {
            return SearchResult {
                query: query.to_string(),
                ..Default::default()
            };
        };

        let key = cache_key("tavily", &format!("{query}_{max_results}"));
        if let Some(hit) = self.cache.get(&key).await {
            if let Ok(cached) = serde_json::from_value::<SearchResult>(hit) {
                return cached;
            }
        }

        let body = json!({
            "api_key": api_key,
            "query": query,
            "max_results": max_results,
            "search_depth": "advanced",
            "include_answer": true,
            "include_domains": RELIABLE_DOMAINS,
        });

        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let mut result = match response {
            Ok(r) => match r.json::<SearchResult>().await {
                Ok(parsed) => parsed,
                Err(e) => {
                    warn!("Tavily response for '{query}' could not be parsed: {e}");
                    return SearchResult {
                        query: query.to_string(),
                        ..Default::default()
                    };
                }
            },
            Err(e) => {
                warn!("Tavily search failed for '{query}': {e}");
                return SearchResult {
                    query: query.to_string(),
                    ..Default::default()
                };
            }
        };
        result.query = query.to_string();

        if let Ok(value) = serde_json::to_value(&result) {
            self.cache.set(&key, &value, CACHE_TTL).await;
        }
        result
    }

    pub async fn verify_entity(&self, entity: &str) -> EntityCheck {
        let search = self.search(entity, 3).await;
        if search.results.is_empty() {
            return EntityCheck {
                entity: entity.to_string(),
                exists: false,
                confidence: 0.0,
                summary: None,
                sources: Vec::new(),
                answer: String::new(),
            };
        }

        EntityCheck {
            entity: entity.to_string(),
            exists: true,
            confidence: f64::min(search.results.len() as f64 / 3.0, 1.0),
            summary: Some(truncate_chars(&search.results[0].content, 500).to_string()),
            sources: search.results.iter().take(3).map(|r| r.url.clone()).collect(),
            answer: search.answer().to_string(),
        }
    }

    pub async fn verify_claim(&self, claim: &str) -> ClaimCheck {
        let search = self.search(&format!("fact check: {claim}"), 5).await;
        judge_claim(claim, &search)
    }

    /// Checks up to five entities and three claims concurrently.
    pub async fn comprehensive_verification(
        &self,
        entities: &[String],
        claims: &[String],
    ) -> ComprehensiveVerification {
        if !self.is_available() {
            return ComprehensiveVerification::unavailable();
        }

        let entity_results = futures::future::join_all(
            entities.iter().take(5).map(|e| self.verify_entity(e)),
        )
        .await;
        let claim_results =
            futures::future::join_all(claims.iter().take(3).map(|c| self.verify_claim(c))).await;

        let result = summarise(entity_results, claim_results);
        info!(
            "Tavily verification: score={:.3}, entities {}/{}, claims {}/{}",
            result.verification_score,
            result.entities_found,
            result.entities_checked,
            result.claims_verified,
            result.claims_checked
        );
        result
    }
}

fn judge_claim(claim: &str, search: &SearchResult) -> ClaimCheck {
    let evidence: Vec<Evidence> = search
        .results
        .iter()
        .map(|r| Evidence {
            source: r.url.clone(),
            title: r.title.clone(),
            snippet: truncate_chars(&r.content, 200).to_string(),
            score: r.score,
        })
        .collect();

    let answer = search.answer();
    let answer_lower = answer.to_lowercase();
    let sourced_confidence = f64::min(search.results.len() as f64 / 5.0, 0.9);
    let (verdict, confidence) = if answer.is_empty() {
        ("unknown", 0.5)
    } else if TRUE_MARKERS.iter().any(|w| answer_lower.contains(w)) {
        ("true", sourced_confidence)
    } else if FALSE_MARKERS.iter().any(|w| answer_lower.contains(w)) {
        ("false", sourced_confidence)
    } else {
        ("unknown", 0.5)
    };

    ClaimCheck {
        claim: claim.to_string(),
        verified: !search.results.is_empty(),
        confidence,
        evidence,
        verdict: verdict.to_string(),
        answer: answer.to_string(),
        sources_count: search.results.len(),
    }
}

fn summarise(entity_results: Vec<EntityCheck>, claim_results: Vec<ClaimCheck>) -> ComprehensiveVerification {
    let entities_found = entity_results
        .iter()
        .filter(|r| r.exists && r.confidence > 0.5)
        .count();
    let claims_verified = claim_results
        .iter()
        .filter(|r| r.verified && r.verdict == "true")
        .count();
    let entities_checked = entity_results.len();
    let claims_checked = claim_results.len();

    let entity_coverage = if entities_checked > 0 {
        entities_found as f64 / entities_checked as f64
    } else {
        0.0
    };
    let claim_accuracy = if claims_checked > 0 {
        claims_verified as f64 / claims_checked as f64
    } else {
        0.5
    };

    ComprehensiveVerification {
        verification_score: entity_coverage * 0.4 + claim_accuracy * 0.6,
        entity_coverage,
        claim_accuracy,
        entities_checked,
        entities_found,
        claims_checked,
        claims_verified,
        entity_results,
        claim_results,
        provider: Some("tavily".to_string()),
        details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;

    fn hit(url: &str, content: &str) -> SearchHit {
        SearchHit {
            title: "t".into(),
            content: content.into(),
            url: url.into(),
            score: 0.9,
            published_date: None,
        }
    }

    #[test]
    fn test_claim_verdict_from_answer_keywords() {
        let search = SearchResult {
            answer: Some("This was confirmed by several outlets.".into()),
            results: vec![hit("a", "x"), hit("b", "y")],
            query: "q".into(),
        };
        let check = judge_claim("claim", &search);
        assert_eq!(check.verdict, "true");
        assert!((check.confidence - 0.4).abs() < 1e-9);
        assert!(check.verified);
        assert_eq!(check.sources_count, 2);
    }

    #[test]
    fn test_claim_without_answer_is_unknown() {
        let search = SearchResult::default();
        let check = judge_claim("claim", &search);
        assert_eq!(check.verdict, "unknown");
        assert_eq!(check.confidence, 0.5);
        assert!(!check.verified);
    }

    #[test]
    fn test_evidence_snippets_are_truncated() {
        let long = "z".repeat(400);
        let search = SearchResult {
            answer: None,
            results: vec![hit("u", &long)],
            query: String::new(),
        };
        let check = judge_claim("c", &search);
        assert_eq!(check.evidence[0].snippet.len(), 200);
    }

    #[test]
    fn test_summary_scores() {
        let entity = |exists, confidence| EntityCheck {
            entity: "e".into(),
            exists,
            confidence,
            summary: None,
            sources: vec![],
            answer: String::new(),
        };
        let claim = |verdict: &str| ClaimCheck {
            claim: "c".into(),
            verified: true,
            confidence: 0.6,
            evidence: vec![],
            verdict: verdict.into(),
            answer: String::new(),
            sources_count: 3,
        };
        let summary = summarise(
            vec![entity(true, 1.0), entity(true, 1.0 / 3.0)],
            vec![claim("true"), claim("unknown")],
        );
        assert_eq!(summary.entities_found, 1);
        assert_eq!(summary.claims_verified, 1);
        assert!((summary.verification_score - (0.5 * 0.4 + 0.5 * 0.6)).abs() < 1e-9);

        let empty = summarise(vec![], vec![]);
        assert!((empty.verification_score - 0.3).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_without_key_is_neutral() {
        let verifier = TavilyVerifier::new(
            reqwest::Client::new(),
            None,
            "http://127.0.0.1:9",
            Arc::new(MemoryCache::new(8)),
        );
        let result = verifier
            .comprehensive_verification(&["Paris".into()], &["A claim here.".into()])
            .await;
        assert_eq!(result.verification_score, 0.5);
        assert_eq!(result.entities_checked, 0);
        assert!(result.provider.is_none());
    }
}
