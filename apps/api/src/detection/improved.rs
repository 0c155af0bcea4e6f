//! Improved detection: Tavily pre-verification with a fast path for clearly
//! verified text, then rhetorical, consistency and fusion analysis on top of
//! the baseline results.

use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use tracing::{info, warn};

use super::baseline::BaselineResults;
use super::consistency::{comprehensive_check, ConsistencyCheck};
use super::fusion::{fuse, FusionResult};
use super::report::{build_report, DetailedReport, ReportInputs};
use super::rhetorical::{analyze_text, RhetoricalAnalysis};
use super::text::{entity_names, split_sentences, truncate_chars};
use super::verdict::{
    fast_path_prediction, final_prediction, qualifies_for_fast_path, FinalPrediction,
    VerdictInputs,
};
use crate::verification::{TavilyVerification, TavilyVerifier};

const VERIFICATION_TIMEOUT: Duration = Duration::from_secs(10);

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.5
}

fn default_weight() -> f64 {
    1.0
}

/// Per-request switches for the improved pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    #[serde(default)]
    pub use_models: Option<Vec<String>>,
    /// Enables Tavily verification; the name predates the Tavily backend.
    #[serde(default = "default_true")]
    pub use_wikipedia: bool,
    #[serde(default = "default_true")]
    pub use_rhetorical: bool,
    #[serde(default = "default_true")]
    pub use_consistency: bool,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default = "default_weight")]
    pub wikipedia_weight: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            use_models: None,
            use_wikipedia: true,
            use_rhetorical: true,
            use_consistency: true,
            threshold: default_threshold(),
            wikipedia_weight: default_weight(),
        }
    }
}

/// Serializes `None` as `{}` so clients can always index into the field.
fn empty_object_if_none<T: Serialize, S: Serializer>(
    value: &Option<T>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => v.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImprovedResult {
    pub baseline_results: BaselineResults,
    #[serde(serialize_with = "empty_object_if_none")]
    pub rhetorical_analysis: Option<RhetoricalAnalysis>,
    #[serde(serialize_with = "empty_object_if_none")]
    pub consistency_check: Option<ConsistencyCheck>,
    pub fusion_result: FusionResult,
    pub fact_verification: Value,
    #[serde(serialize_with = "empty_object_if_none")]
    pub wikipedia_verification: Option<TavilyVerification>,
    #[serde(serialize_with = "empty_object_if_none")]
    pub tavily_verification: Option<TavilyVerification>,
    pub fast_path: bool,
    pub final_prediction: FinalPrediction,
    pub detailed_report: DetailedReport,
}

#[derive(Clone)]
pub struct ImprovedDetector {
    verifier: TavilyVerifier,
}

impl ImprovedDetector {
    pub fn new(verifier: TavilyVerifier) -> Self {
        Self { verifier }
    }

    pub fn verifier_available(&self) -> bool {
        self.verifier.is_available()
    }

    /// Pre-verification on the first 500 characters, bounded by a timeout.
    async fn verify(&self, text: &str) -> TavilyVerification {
        let head = truncate_chars(text, 500);
        let entities = entity_names(head, 5);
        let claims: Vec<String> = split_sentences(head).into_iter().take(3).collect();

        match tokio::time::timeout(
            VERIFICATION_TIMEOUT,
            self.verifier.comprehensive_verification(&entities, &claims),
        )
        .await
        {
            Ok(result) => TavilyVerification::from_comprehensive(result),
            Err(_) => {
                warn!("Tavily verification timeout (>10s), using fallback");
                TavilyVerification::fallback(0.5)
            }
        }
    }

    pub async fn detect(
        &self,
        baseline: BaselineResults,
        text: &str,
        config: &DetectionConfig,
    ) -> ImprovedResult {
        info!(
            "Detection config: verification={}, rhetorical={}, consistency={}, threshold={}, weight={}",
            config.use_wikipedia,
            config.use_rhetorical,
            config.use_consistency,
            config.threshold,
            config.wikipedia_weight
        );

        let verification = if config.use_wikipedia && self.verifier.is_available() {
            Some(self.verify(text).await)
        } else {
            None
        };

        if let Some(v) = verification.as_ref().filter(|v| qualifies_for_fast_path(v)) {
            info!(
                "Fast path: verification score {:.3}, coverage {:.3}",
                v.overall_score, v.tavily_coverage
            );
            return fast_path_result(baseline, text, v.clone());
        }

        let rhetorical = config.use_rhetorical.then(|| analyze_text(text));
        let consistency = if config.use_consistency {
            comprehensive_check(text)
        } else {
            ConsistencyCheck::skipped()
        };
        let fusion = fuse(&baseline, &rhetorical.clone().unwrap_or_default());
        let prediction = final_prediction(VerdictInputs {
            fusion: &fusion,
            consistency: &consistency,
            rhetorical: rhetorical.as_ref(),
            verification: verification.as_ref(),
            verification_weight: config.wikipedia_weight,
            threshold: config.threshold,
            text,
        });
        let report = build_report(ReportInputs {
            text,
            prediction: &prediction,
            baseline: &baseline,
            verification: verification.as_ref(),
            rhetorical: rhetorical.as_ref(),
            consistency: Some(&consistency),
        });

        ImprovedResult {
            fact_verification: baseline.fact_verification.clone(),
            baseline_results: baseline,
            rhetorical_analysis: rhetorical,
            consistency_check: Some(consistency),
            fusion_result: fusion,
            wikipedia_verification: verification.clone(),
            tavily_verification: verification,
            fast_path: false,
            final_prediction: prediction,
            detailed_report: report,
        }
    }
}

fn fast_path_result(
    baseline: BaselineResults,
    text: &str,
    verification: TavilyVerification,
) -> ImprovedResult {
    let prediction = fast_path_prediction(&verification);
    let report = build_report(ReportInputs {
        text,
        prediction: &prediction,
        baseline: &baseline,
        verification: Some(&verification),
        rhetorical: None,
        consistency: None,
    });
    let fusion = FusionResult {
        prediction: prediction.prediction.clone(),
        fake_probability: prediction.fake_probability,
        confidence: prediction.confidence,
        method: "tavily_fast_path".to_string(),
        ai_generated_detected: false,
        detectgpt_is_generated_value: 0.0,
        num_features_used: 0,
    };

    ImprovedResult {
        fact_verification: baseline.fact_verification.clone(),
        baseline_results: baseline,
        rhetorical_analysis: None,
        consistency_check: None,
        fusion_result: fusion,
        wikipedia_verification: Some(verification.clone()),
        tavily_verification: Some(verification),
        fast_path: true,
        final_prediction: prediction,
        detailed_report: report,
    }
}
