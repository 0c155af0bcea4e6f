//! Final prediction: the fusion score adjusted by consistency, rhetoric and
//! verification evidence, then bucketed into real / misleading / fake.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::consistency::ConsistencyCheck;
use super::fusion::FusionResult;
use super::rhetorical::RhetoricalAnalysis;
use crate::verification::TavilyVerification;

pub const FAKE_AT_OR_ABOVE: f64 = 0.6;
pub const REAL_AT_OR_BELOW: f64 = 0.4;

static YEAR_MENTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(18|19|20)\d{2}\b").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationDetails {
    pub verification_score: f64,
    pub coverage: f64,
    pub entities_found: usize,
    pub entities_checked: usize,
    pub claims_verified: usize,
    pub claims_checked: usize,
}

impl From<&TavilyVerification> for VerificationDetails {
    fn from(v: &TavilyVerification) -> Self {
        Self {
            verification_score: v.overall_score,
            coverage: v.tavily_coverage,
            entities_found: v.entities_found,
            entities_checked: v.entities_checked,
            claims_verified: v.claims_verified,
            claims_checked: v.claims_checked,
        }
    }
}

/// Breakdown of every adjustment. The `wikipedia_*` fields mirror the
/// `tavily_*` ones for clients that still read the older names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Explanation {
    pub base_fusion_score: f64,
    pub consistency_adjustment: f64,
    pub rhetorical_adjustment: f64,
    pub wikipedia_adjustment: f64,
    pub tavily_adjustment: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_contradiction_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_contradiction_penalty: Option<f64>,
    pub wikipedia_boost: f64,
    pub tavily_boost: f64,
    pub final_score: f64,
    pub confidence: f64,
    pub key_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_path_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_details: Option<VerificationDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_details: Option<VerificationDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinalPrediction {
    pub prediction: String,
    pub fake_probability: f64,
    pub confidence: f64,
    pub explanation: Explanation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_used: Option<f64>,
}

pub fn label_for(probability: f64) -> &'static str {
    if probability >= FAKE_AT_OR_ABOVE {
        "fake"
    } else if probability <= REAL_AT_OR_BELOW {
        "real"
    } else {
        "misleading"
    }
}

/// `(|p - 0.5| * 2)^1.5`, the distance-from-undecided confidence curve.
pub fn confidence_curve(probability: f64) -> f64 {
    ((probability - 0.5).abs() * 2.0).powf(1.5)
}

pub struct VerdictInputs<'a> {
    pub fusion: &'a FusionResult,
    pub consistency: &'a ConsistencyCheck,
    pub rhetorical: Option<&'a RhetoricalAnalysis>,
    pub verification: Option<&'a TavilyVerification>,
    pub verification_weight: f64,
    pub threshold: f64,
    pub text: &'a str,
}

pub fn final_prediction(inputs: VerdictInputs<'_>) -> FinalPrediction {
    let base = inputs.fusion.fake_probability;
    let weight = inputs.verification_weight;

    let temporal = inputs.consistency.temporal_score();
    let mut consistency_adj = (1.0 - inputs.consistency.overall_consistency_score) * 0.25;
    if temporal < 0.5 {
        let penalty = (1.0 - temporal) * 0.25;
        warn!("Severe temporal penalty +{penalty:.3} (temporal score {temporal:.3})");
        consistency_adj += penalty;
    }
    if temporal < 0.2 {
        warn!("Anachronism penalty +0.300");
        consistency_adj += 0.3;
    }

    let rhetorical_adj = inputs.rhetorical.map_or(0.0, |r| r.loaded_total() * 0.1);

    let mut verification_adj = 0.0;
    let mut contradiction = 0.0;
    let mut boost = 0.0;
    if let Some(v) = inputs.verification {
        let score = v.overall_score;
        let coverage = v.tavily_coverage;
        verification_adj = ((1.0 - score) * 0.20 + (1.0 - coverage) * 0.15) * weight;

        if score < 0.5 || coverage < 0.6 {
            contradiction = 0.15 * weight;
        }
        if coverage >= 0.8 && score >= 0.7 {
            let claims_ratio = v.claims_ratio();
            if claims_ratio < 0.7 {
                contradiction += 0.15 * weight;
            }
            if YEAR_MENTION.is_match(inputs.text) && claims_ratio < 0.9 {
                warn!("Dated text with partially verified claims (ratio {claims_ratio:.3})");
                contradiction += 0.15 * weight;
            }
        }

        if score >= 0.5 {
            boost = -0.30;
        } else if coverage >= 0.75 && score >= 0.4 {
            boost = -0.15;
        }
        info!(
            "Verification adjustment {verification_adj:.3}, contradiction {contradiction:.3}, boost {boost:.3} (score {score:.3}, coverage {coverage:.3})"
        );
    }

    let final_score =
        (base + consistency_adj + rhetorical_adj + verification_adj + contradiction + boost)
            .clamp(0.0, 1.0);
    let total_adjustment = consistency_adj.abs()
        + rhetorical_adj.abs()
        + verification_adj.abs()
        + contradiction.abs()
        + boost.abs();
    let mut confidence = confidence_curve(final_score);
    if total_adjustment > 0.1 {
        confidence += 0.1;
    }
    let confidence = confidence.clamp(0.0, 1.0);

    let mut key_factors = Vec::new();
    if consistency_adj > 0.1 {
        key_factors.push("inconsistent_information");
    }
    if temporal < 0.5 {
        key_factors.push("severe_temporal_error");
    }
    if rhetorical_adj > 0.05 {
        key_factors.push("loaded_language");
    }
    if contradiction > 0.0 {
        key_factors.push("extremely_low_tavily_verification");
    } else if verification_adj > 0.1 {
        key_factors.push("low_tavily_verification");
    }
    if boost < -0.1 {
        key_factors.push("high_tavily_verification");
    }
    if base > 0.7 {
        key_factors.push("baseline_detection");
    }

    let details = inputs.verification.map(VerificationDetails::from);
    FinalPrediction {
        prediction: label_for(final_score).to_string(),
        fake_probability: final_score,
        confidence,
        explanation: Explanation {
            base_fusion_score: base,
            consistency_adjustment: consistency_adj,
            rhetorical_adjustment: rhetorical_adj,
            wikipedia_adjustment: verification_adj,
            tavily_adjustment: verification_adj,
            wikipedia_contradiction_penalty: Some(contradiction),
            tavily_contradiction_penalty: Some(contradiction),
            wikipedia_boost: boost,
            tavily_boost: boost,
            final_score,
            confidence,
            key_factors: key_factors.into_iter().map(String::from).collect(),
            fast_path_reason: None,
            wikipedia_details: details.clone(),
            tavily_details: details,
        },
        threshold_used: Some(inputs.threshold),
    }
}

/// Verdict for text whose verification is strong enough to skip the models.
pub fn fast_path_prediction(v: &TavilyVerification) -> FinalPrediction {
    let score = v.overall_score;
    let probability = f64::max(0.0, 0.15 - (score - 0.75) * 0.3);
    let mut confidence = confidence_curve(probability);
    if score > 0.75 {
        confidence = f64::min(1.0, confidence + 0.15);
    }
    let confidence = confidence.clamp(0.0, 1.0);
    let boost = -(0.35 + (score - 0.75) * 0.4);
    let details = VerificationDetails::from(v);

    FinalPrediction {
        prediction: "real".to_string(),
        fake_probability: probability,
        confidence,
        explanation: Explanation {
            base_fusion_score: probability,
            consistency_adjustment: 0.0,
            rhetorical_adjustment: 0.0,
            wikipedia_adjustment: 0.0,
            tavily_adjustment: 0.0,
            wikipedia_contradiction_penalty: None,
            tavily_contradiction_penalty: None,
            wikipedia_boost: boost,
            tavily_boost: boost,
            final_score: probability,
            confidence,
            key_factors: vec![
                "high_tavily_verification".to_string(),
                "tavily_fast_path".to_string(),
            ],
            fast_path_reason: Some(format!(
                "Tavily verification very high (score: {:.2}%, coverage: {:.2}%, claims: {}/{}, entities: {}/{})",
                score * 100.0,
                v.tavily_coverage * 100.0,
                v.claims_verified,
                v.claims_checked,
                v.entities_found,
                v.entities_checked
            )),
            wikipedia_details: Some(details.clone()),
            tavily_details: Some(details),
        },
        threshold_used: None,
    }
}

/// Whether verification alone is conclusive enough to call the text real.
pub fn qualifies_for_fast_path(v: &TavilyVerification) -> bool {
    v.overall_score >= 0.75
        && v.tavily_coverage >= 0.65
        && v.claims_ratio() >= 0.75
        && v.entities_ratio() >= 0.70
        && v.claims_checked >= 2
        && v.entities_checked >= 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::consistency::comprehensive_check;

    fn fusion(p: f64) -> FusionResult {
        FusionResult {
            prediction: if p > 0.5 { "fake" } else { "real" }.into(),
            fake_probability: p,
            confidence: (p - 0.5).abs() * 2.0,
            method: "random_forest_fusion".into(),
            ai_generated_detected: false,
            detectgpt_is_generated_value: 0.0,
            num_features_used: 24,
        }
    }

    fn verification(score: f64, coverage: f64, claims: (usize, usize), entities: (usize, usize)) -> TavilyVerification {
        TavilyVerification {
            overall_score: score,
            tavily_coverage: coverage,
            wikipedia_coverage: coverage,
            entities_found: entities.0,
            entities_checked: entities.1,
            claims_verified: claims.0,
            claims_checked: claims.1,
            entity_results: vec![],
            claim_results: vec![],
            provider: "tavily".into(),
            error: None,
        }
    }

    #[test]
    fn test_labels() {
        assert_eq!(label_for(0.6), "fake");
        assert_eq!(label_for(0.4), "real");
        assert_eq!(label_for(0.5), "misleading");
    }

    #[test]
    fn test_no_adjustments_keeps_fusion_score() {
        let skipped = ConsistencyCheck::skipped();
        let f = fusion(0.3);
        let p = final_prediction(VerdictInputs {
            fusion: &f,
            consistency: &skipped,
            rhetorical: None,
            verification: None,
            verification_weight: 1.0,
            threshold: 0.5,
            text: "plain",
        });
        assert!((p.fake_probability - 0.3).abs() < 1e-12);
        assert_eq!(p.prediction, "real");
        assert!(p.explanation.key_factors.is_empty());
        assert!(p.explanation.tavily_details.is_none());
        assert!((p.confidence - 0.4f64.powf(1.5)).abs() < 1e-12);
        assert_eq!(p.threshold_used, Some(0.5));
    }

    #[test]
    fn test_anachronism_pushes_towards_fake() {
        let check = comprehensive_check("The tower was built in 1200 using modern technology.");
        let f = fusion(0.3);
        let p = final_prediction(VerdictInputs {
            fusion: &f,
            consistency: &check,
            rhetorical: None,
            verification: None,
            verification_weight: 1.0,
            threshold: 0.5,
            text: "",
        });
        assert_eq!(p.prediction, "fake");
        assert!(p.explanation.key_factors.contains(&"severe_temporal_error".to_string()));
        assert!(p.explanation.key_factors.contains(&"inconsistent_information".to_string()));
    }

    #[test]
    fn test_low_verification_penalty() {
        let skipped = ConsistencyCheck::skipped();
        let f = fusion(0.4);
        let v = verification(0.3, 0.2, (0, 2), (1, 5));
        let p = final_prediction(VerdictInputs {
            fusion: &f,
            consistency: &skipped,
            rhetorical: None,
            verification: Some(&v),
            verification_weight: 1.0,
            threshold: 0.5,
            text: "",
        });
        // 0.4 + (0.7*0.2 + 0.8*0.15) + 0.15
        assert!((p.fake_probability - 0.81).abs() < 1e-9);
        assert_eq!(
            p.explanation.key_factors,
            vec!["extremely_low_tavily_verification".to_string()]
        );
    }

    #[test]
    fn test_high_coverage_with_dates_and_weak_claims() {
        let skipped = ConsistencyCheck::skipped();
        let f = fusion(0.2);
        let v = verification(0.8, 0.9, (1, 2), (4, 4));
        let p = final_prediction(VerdictInputs {
            fusion: &f,
            consistency: &skipped,
            rhetorical: None,
            verification: Some(&v),
            verification_weight: 1.0,
            threshold: 0.5,
            text: "It opened in 1999.",
        });
        let expected_contradiction = 0.30;
        assert!(
            (p.explanation.tavily_contradiction_penalty.unwrap() - expected_contradiction).abs() < 1e-9
        );
        assert_eq!(p.explanation.tavily_boost, -0.30);
    }

    #[test]
    fn test_fast_path() {
        let strong = verification(0.95, 0.9, (3, 3), (4, 5));
        assert!(qualifies_for_fast_path(&strong));
        let p = fast_path_prediction(&strong);
        assert_eq!(p.prediction, "real");
        assert!((p.fake_probability - 0.09).abs() < 1e-9);
        assert!(p.threshold_used.is_none());
        assert!(p.explanation.fast_path_reason.unwrap().contains("claims: 3/3"));

        let thin = verification(0.95, 0.9, (1, 1), (1, 1));
        assert!(!qualifies_for_fast_path(&thin));
    }
}
