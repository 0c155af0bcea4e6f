//! Temporal, spatial and logical consistency checks over a single text.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Scores at or below this are reported as inconsistent.
const CONSISTENCY_THRESHOLD: f64 = 0.3;
/// Reference year for future and historical date checks.
pub const CURRENT_YEAR: i32 = 2025;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());
static MONTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(january|february|march|april|may|june|july|august|september|october|november|december)\b").unwrap()
});
static RELATIVE_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(today|yesterday|tomorrow|now|recently|lately)\b").unwrap());
static NAMED_PLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Z][a-z]+ (?:City|Town|State|Country|Nation))\b").unwrap());
static PREPOSITION_PLACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:in|at|from|to) ([A-Z][a-z]+)\b").unwrap());

static CONTRADICTIONS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\b(not|no|never|none)\b.*\b(always|all|every|everyone)\b", "negation_contradiction"),
        (r"\b(before|after)\b.*\b(before|after)\b", "temporal_contradiction"),
        (r"\b(increased|rose|grew)\b.*\b(decreased|fell|dropped)\b", "trend_contradiction"),
    ]
    .into_iter()
    .filter_map(|(p, kind)| Regex::new(p).ok().map(|re| (re, kind)))
    .collect()
});

const MODERN_KEYWORDS: &[&str] = &[
    "tower", "building", "constructed", "built", "completed", "technology", "internet",
    "computer", "phone", "car", "airplane",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalConsistency {
    pub temporal_consistency_score: f64,
    pub extracted_times: Vec<String>,
    pub temporal_issues: Vec<String>,
    pub is_temporally_consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpatialConsistency {
    pub spatial_consistency_score: f64,
    pub extracted_locations: Vec<String>,
    pub spatial_issues: Vec<String>,
    pub is_spatially_consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogicalConsistency {
    pub logical_consistency_score: f64,
    pub detected_contradictions: Vec<String>,
    pub is_logically_consistent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsistencyCheck {
    pub overall_consistency_score: f64,
    pub temporal_consistency: TemporalConsistency,
    pub spatial_consistency: SpatialConsistency,
    pub logical_consistency: LogicalConsistency,
    pub is_globally_consistent: bool,
}

impl ConsistencyCheck {
    /// Neutral result used when the check is switched off.
    pub fn skipped() -> Self {
        Self {
            overall_consistency_score: 1.0,
            temporal_consistency: TemporalConsistency {
                temporal_consistency_score: 1.0,
                extracted_times: Vec::new(),
                temporal_issues: Vec::new(),
                is_temporally_consistent: true,
            },
            spatial_consistency: SpatialConsistency {
                spatial_consistency_score: 1.0,
                extracted_locations: Vec::new(),
                spatial_issues: Vec::new(),
                is_spatially_consistent: true,
            },
            logical_consistency: LogicalConsistency {
                logical_consistency_score: 1.0,
                detected_contradictions: Vec::new(),
                is_logically_consistent: true,
            },
            is_globally_consistent: true,
        }
    }

    pub fn temporal_score(&self) -> f64 {
        self.temporal_consistency.temporal_consistency_score
    }
}

pub fn check_temporal(text: &str) -> TemporalConsistency {
    let lower = text.to_lowercase();
    let mut extracted_times: Vec<String> = Vec::new();
    for re in [&*YEAR, &*MONTH, &*RELATIVE_TIME] {
        extracted_times.extend(re.captures_iter(&lower).map(|c| c[1].to_string()));
    }

    let years: Vec<i32> = YEAR
        .captures_iter(&lower)
        .filter_map(|c| c[1].parse().ok())
        .collect();

    let mut score = 1.0;
    let mut issues = Vec::new();

    if !years.is_empty() {
        let future: Vec<i32> = years.iter().copied().filter(|y| *y > CURRENT_YEAR + 1).collect();
        if !future.is_empty() {
            score -= 0.4;
            issues.push(format!("future_years: {future:?}"));
        }

        let very_old: Vec<i32> = years.iter().copied().filter(|y| *y < 1500).collect();
        let old: Vec<i32> = years
            .iter()
            .copied()
            .filter(|y| (1500..1800).contains(y))
            .collect();
        let recent_past: Vec<i32> = years
            .iter()
            .copied()
            .filter(|y| (1800..CURRENT_YEAR - 50).contains(y))
            .collect();
        let modern_context = MODERN_KEYWORDS.iter().any(|k| lower.contains(k));

        if !very_old.is_empty() && modern_context {
            score -= 0.9;
            issues.push(format!("anachronism_detected: {very_old:?} with modern context"));
        } else if !very_old.is_empty() {
            score -= 0.5;
            issues.push(format!("medieval_years: {very_old:?}"));
        } else if !old.is_empty() && modern_context {
            score -= 0.5;
            issues.push(format!("historical_mismatch: {old:?}"));
        } else if !recent_past.is_empty() {
            score -= 0.1;
            issues.push(format!("historical_reference: {recent_past:?}"));
        }
    }

    TemporalConsistency {
        temporal_consistency_score: f64::max(0.0, score),
        extracted_times,
        temporal_issues: issues,
        is_temporally_consistent: score > CONSISTENCY_THRESHOLD,
    }
}

pub fn check_spatial(text: &str) -> SpatialConsistency {
    let mut locations: BTreeSet<String> = BTreeSet::new();
    locations.extend(NAMED_PLACE.captures_iter(text).map(|c| c[1].to_string()));
    locations.extend(PREPOSITION_PLACE.captures_iter(text).map(|c| c[1].to_string()));

    let mut score = 1.0;
    let mut issues = Vec::new();
    if locations.len() > 3 {
        score -= 0.2;
        issues.push(format!("many_distinct_locations: {}", locations.len()));
    }

    SpatialConsistency {
        spatial_consistency_score: score,
        extracted_locations: locations.into_iter().collect(),
        spatial_issues: issues,
        is_spatially_consistent: score > CONSISTENCY_THRESHOLD,
    }
}

pub fn check_logical(text: &str) -> LogicalConsistency {
    let lower = text.to_lowercase();
    let contradictions: Vec<String> = CONTRADICTIONS
        .iter()
        .filter(|(re, _)| re.is_match(&lower))
        .map(|(_, kind)| kind.to_string())
        .collect();
    let score = f64::max(0.0, 1.0 - contradictions.len() as f64 * 0.3);
    LogicalConsistency {
        logical_consistency_score: score,
        detected_contradictions: contradictions,
        is_logically_consistent: score > CONSISTENCY_THRESHOLD,
    }
}

/// Weighted 0.3 temporal, 0.3 spatial, 0.4 logical.
pub fn comprehensive_check(text: &str) -> ConsistencyCheck {
    let temporal = check_temporal(text);
    let spatial = check_spatial(text);
    let logical = check_logical(text);
    let overall = temporal.temporal_consistency_score * 0.3
        + spatial.spatial_consistency_score * 0.3
        + logical.logical_consistency_score * 0.4;
    ConsistencyCheck {
        overall_consistency_score: overall,
        temporal_consistency: temporal,
        spatial_consistency: spatial,
        logical_consistency: logical,
        is_globally_consistent: overall > CONSISTENCY_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anachronism_with_modern_context() {
        let t = check_temporal("The tower was built in 1200 using modern technology.");
        assert!((t.temporal_consistency_score - 0.1).abs() < 1e-9);
        assert!(t.temporal_issues[0].starts_with("anachronism_detected"));
        assert!(!t.is_temporally_consistent);
    }

    #[test]
    fn test_future_year_penalty() {
        let t = check_temporal("In 2031 the election was held.");
        assert!((t.temporal_consistency_score - 0.6).abs() < 1e-9);
        assert_eq!(t.extracted_times, vec!["2031".to_string()]);
    }

    #[test]
    fn test_no_dates_is_fully_consistent() {
        let t = check_temporal("Nothing dated here, just words.");
        assert_eq!(t.temporal_consistency_score, 1.0);
        assert!(t.temporal_issues.is_empty());
    }

    #[test]
    fn test_many_locations_penalised() {
        let s = check_spatial("He flew from Paris to Berlin, then in Madrid and at Rome.");
        assert_eq!(s.extracted_locations.len(), 4);
        assert!((s.spatial_consistency_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_trend_contradiction() {
        let l = check_logical("Prices increased sharply but then they fell.");
        assert_eq!(l.detected_contradictions, vec!["trend_contradiction".to_string()]);
        assert!((l.logical_consistency_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_comprehensive_weights() {
        let c = comprehensive_check("A calm, plain statement.");
        assert!((c.overall_consistency_score - 1.0).abs() < 1e-9);
        assert!(ConsistencyCheck::skipped().is_globally_consistent);
    }
}
