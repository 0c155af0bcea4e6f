//! Wikipedia search-count verification used by baseline detection.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::detection::text::{extract_entities, EntityKind};

static CLAIM_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(?:announced|revealed|discovered|stated|confirmed)\s+(?:that\s+)?(.+?)(?:\.|$)",
        r"(?i)(?:according to|officials say|experts claim)\s+(.+?)(?:\.|$)",
    ]
    .into_iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    query: Option<SearchQuery>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    search: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    title: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityVerification {
    pub entity: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub verified: bool,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wiki_titles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaimSupport {
    pub claim: String,
    pub supported: bool,
    pub confidence: f64,
    pub evidence_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactVerification {
    pub fake_probability: f64,
    pub verification_score: f64,
    pub entities_checked: usize,
    pub entities_verified: usize,
    pub claims_checked: usize,
    pub claims_supported: usize,
    pub verified_entities: Vec<EntityVerification>,
    pub unverified_entities: Vec<EntityVerification>,
    pub supported_claims: Vec<ClaimSupport>,
    pub method: String,
}

#[derive(Clone)]
pub struct WikipediaClient {
    http: reqwest::Client,
    api_url: String,
}

impl WikipediaClient {
    pub fn new(http: reqwest::Client, api_url: &str) -> Self {
        Self {
            http,
            api_url: api_url.to_string(),
        }
    }

    /// Titles of the top `limit` full-text search hits.
    pub async fn search_titles(&self, query: &str, limit: usize) -> Result<Vec<String>, reqwest::Error> {
        let limit = limit.to_string();
        let response: SearchResponse = self
            .http
            .get(&self.api_url)
            .query(&[
                ("action", "query"),
                ("format", "json"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response
            .query
            .map(|q| q.search.into_iter().map(|s| s.title).collect())
            .unwrap_or_default())
    }

    pub async fn verify_entity(&self, entity: &str, kind: EntityKind) -> EntityVerification {
        let mut result = EntityVerification {
            entity: entity.to_string(),
            kind: kind.label().to_string(),
            verified: false,
            confidence: 0.0,
            wiki_titles: Vec::new(),
            reason: None,
            error: None,
        };
        match self.search_titles(entity, 3).await {
            Ok(titles) if !titles.is_empty() => {
                result.verified = true;
                result.confidence = f64::min(0.9, 0.3 + titles.len() as f64 * 0.2);
                result.wiki_titles = titles.into_iter().take(3).collect();
            }
            Ok(_) => result.reason = Some("No Wikipedia entry found".to_string()),
            Err(e) => {
                warn!("Wikipedia lookup failed for '{entity}': {e}");
                result.error = Some(e.to_string());
            }
        }
        result
    }

    pub async fn verify_claim(&self, claim: &str) -> ClaimSupport {
        match self.search_titles(claim, 3).await {
            Ok(titles) => claim_support(claim, titles.len()),
            Err(e) => ClaimSupport {
                error: Some(e.to_string()),
                ..claim_support(claim, 0)
            },
        }
    }

    /// Checks up to 3 people, 3 organisations, 2 places and 3 claims.
    pub async fn verify_facts(&self, text: &str) -> FactVerification {
        let entities = extract_entities(text);
        let pick = |kind: EntityKind, n: usize| {
            entities
                .iter()
                .filter(move |e| e.kind == kind)
                .take(n)
                .map(move |e| (e.text.clone(), kind))
        };
        let targets: Vec<(String, EntityKind)> = pick(EntityKind::Person, 3)
            .chain(pick(EntityKind::Organization, 3))
            .chain(pick(EntityKind::Location, 2))
            .collect();

        let claims: Vec<String> = extract_claims(text)
            .into_iter()
            .take(3)
            .filter(|c| c.trim().chars().count() > 10)
            .collect();
        debug!(
            "Wikipedia verification: {} entities, {} claims",
            targets.len(),
            claims.len()
        );

        let (entity_results, claim_results) = futures::future::join(
            futures::future::join_all(targets.iter().map(|(e, k)| self.verify_entity(e, *k))),
            futures::future::join_all(claims.iter().map(|c| self.verify_claim(c))),
        )
        .await;

        score_facts(entity_results, claim_results)
    }
}

fn claim_support(claim: &str, hits: usize) -> ClaimSupport {
    let (supported, confidence) = match hits {
        0 => (false, 0.2),
        1 => (true, 0.5),
        _ => (true, 0.7),
    };
    ClaimSupport {
        claim: claim.to_string(),
        supported,
        confidence,
        evidence_count: hits,
        error: None,
    }
}

/// Reporting-verb and attribution clauses, at most three per pattern and five overall.
pub fn extract_claims(text: &str) -> Vec<String> {
    CLAIM_PATTERNS
        .iter()
        .flat_map(|re| {
            re.captures_iter(text)
                .take(3)
                .map(|c| c[1].to_string())
                .collect::<Vec<_>>()
        })
        .take(5)
        .collect()
}

fn score_facts(entities: Vec<EntityVerification>, claims: Vec<ClaimSupport>) -> FactVerification {
    let fake_probability = if entities.is_empty() && claims.is_empty() {
        0.5
    } else {
        let entity_score = if entities.is_empty() {
            0.5
        } else {
            entities.iter().filter(|e| e.verified).count() as f64 / entities.len() as f64
        };
        let claim_score = if claims.is_empty() {
            0.5
        } else {
            claims.iter().filter(|c| c.supported).count() as f64 / claims.len() as f64
        };
        1.0 - (0.4 * entity_score + 0.6 * claim_score)
    };

    let entities_checked = entities.len();
    let claims_checked = claims.len();
    let (verified, unverified): (Vec<_>, Vec<_>) = entities.into_iter().partition(|e| e.verified);
    let supported: Vec<ClaimSupport> = claims.into_iter().filter(|c| c.supported).collect();

    FactVerification {
        fake_probability,
        verification_score: 1.0 - fake_probability,
        entities_checked,
        entities_verified: verified.len(),
        claims_checked,
        claims_supported: supported.len(),
        verified_entities: verified.into_iter().take(3).collect(),
        unverified_entities: unverified.into_iter().take(3).collect(),
        supported_claims: supported.into_iter().take(2).collect(),
        method: "wikipedia_verification".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_claims_from_reporting_verbs() {
        let claims = extract_claims(
            "The ministry announced that taxes will fall. According to insiders the deal is done.",
        );
        assert_eq!(claims, vec!["taxes will fall", "insiders the deal is done"]);
    }

    #[test]
    fn test_claim_support_by_hit_count() {
        assert_eq!(claim_support("c", 0).confidence, 0.2);
        assert!(claim_support("c", 1).supported);
        assert_eq!(claim_support("c", 3).confidence, 0.7);
    }

    #[test]
    fn test_score_with_nothing_checked_is_neutral() {
        let result = score_facts(vec![], vec![]);
        assert_eq!(result.fake_probability, 0.5);
        assert_eq!(result.method, "wikipedia_verification");
    }

    #[test]
    fn test_score_mixes_entities_and_claims() {
        let entity = |verified| EntityVerification {
            entity: "X".into(),
            kind: "PERSON".into(),
            verified,
            confidence: 0.5,
            wiki_titles: vec![],
            reason: None,
            error: None,
        };
        let result = score_facts(
            vec![entity(true), entity(false)],
            vec![claim_support("c", 2)],
        );
        // entity 0.5, claims 1.0
        assert!((result.fake_probability - (1.0 - (0.2 + 0.6))).abs() < 1e-9);
        assert_eq!(result.entities_verified, 1);
        assert_eq!(result.unverified_entities.len(), 1);
        assert_eq!(result.claims_supported, 1);
    }

    #[tokio::test]
    async fn test_unreachable_api_marks_entity_unverified() {
        let client = WikipediaClient::new(reqwest::Client::new(), "http://127.0.0.1:9/w/api.php");
        let result = client.verify_entity("Paris", EntityKind::Location).await;
        assert!(!result.verified);
        assert!(result.error.is_some());
        assert_eq!(result.kind, "GPE");
    }
}
