//! Weighted fusion of detector outputs and rhetorical features.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::baseline::BaselineResults;
use super::rhetorical::RhetoricalAnalysis;

/// Weights for the first twelve features; the GPT sensitivity dominates.
const FEATURE_WEIGHTS: [f64; 12] = [
    0.05, 0.04, 0.80, 0.05, 0.02, 0.02, 0.02, 0.02, 0.02, 0.02, 0.02, 0.02,
];

const EMOTIONS: [&str; 5] = ["positive", "negative", "fear", "anger", "exaggeration"];
const LOADED: [&str; 5] = [
    "conspiracy",
    "urgency",
    "authority",
    "vague_sources",
    "emotional_triggers",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FusionResult {
    pub prediction: String,
    pub fake_probability: f64,
    pub confidence: f64,
    pub method: String,
    #[serde(default)]
    pub ai_generated_detected: bool,
    #[serde(default)]
    pub detectgpt_is_generated_value: f64,
    #[serde(default)]
    pub num_features_used: usize,
}

fn number(value: &Value, key: &str, default: f64) -> f64 {
    match value.get(key) {
        Some(Value::Bool(b)) => f64::from(u8::from(*b)),
        Some(v) => v.as_f64().unwrap_or(default),
        None => default,
    }
}

/// Feature vector in fixed order. Detector groups are present only when the
/// detector ran without error.
pub fn extract_features(baseline: &BaselineResults, rhetorical: &RhetoricalAnalysis) -> Vec<f64> {
    let mut features = Vec::with_capacity(28);
    let groups: [(&str, [(&str, f64); 2]); 5] = [
        ("roberta", [("fake_score", 0.5), ("confidence", 0.0)]),
        ("detectgpt", [("sensitivity", 0.0), ("is_generated", 0.0)]),
        ("gltr", [("high_prob_ratio", 0.0), ("avg_probability", 0.0)]),
        ("zero_shot", [("fake_score", 0.5), ("confidence", 0.0)]),
        ("clip", [("consistency_score", 0.5), ("is_consistent", 1.0)]),
    ];
    for (name, keys) in groups {
        if let Some(entry) = baseline.usable(name) {
            features.extend(keys.iter().map(|(k, d)| number(entry, k, *d)));
        }
    }

    features.extend(EMOTIONS.iter().map(|k| rhetorical.emotional(k)));
    features.extend(LOADED.iter().map(|k| rhetorical.loaded(k)));
    let r = &rhetorical.readability;
    features.extend([r.flesch_reading_ease, r.avg_sentence_length, r.complex_word_ratio]);
    let l = &rhetorical.linguistic_patterns;
    features.extend([
        l.entity_diversity,
        l.pronoun_ratio,
        l.adjective_ratio,
        l.complex_sentence_ratio,
        l.passive_voice_ratio,
    ]);
    features
}

/// Values in (1, 10) are scaled down by 10; anything else outside [0, 1] becomes 0.5.
pub fn normalize(value: f64) -> f64 {
    let v = if value > 1.0 && value < 10.0 {
        f64::min(value / 10.0, 1.0)
    } else {
        value
    };
    if (0.0..=1.0).contains(&v) {
        v
    } else {
        0.5
    }
}

/// Extra fake probability for strong GPT "generated" signals: (bonus, detected).
fn ai_bonus(sensitivity: f64) -> (f64, bool) {
    if sensitivity > 5.0 {
        (0.20, true)
    } else if sensitivity > 4.2 {
        (0.12, true)
    } else if sensitivity > 3.8 {
        (0.08, false)
    } else if sensitivity > 3.5 {
        (0.04, false)
    } else {
        (0.0, false)
    }
}

pub fn fuse(baseline: &BaselineResults, rhetorical: &RhetoricalAnalysis) -> FusionResult {
    let features: Vec<f64> = extract_features(baseline, rhetorical)
        .into_iter()
        .map(normalize)
        .collect();

    let (sensitivity, is_generated) = baseline
        .usable("detectgpt")
        .map(|d| (number(d, "sensitivity", 0.0), number(d, "is_generated", 0.0)))
        .unwrap_or((0.0, 0.0));

    let total: f64 = FEATURE_WEIGHTS.iter().sum();
    let mut score: f64 = features
        .iter()
        .zip(FEATURE_WEIGHTS.iter())
        .map(|(f, w)| f * w / total)
        .sum();

    let (bonus, ai_detected) = ai_bonus(sensitivity);
    score = (score + bonus).clamp(0.0, 1.0);

    FusionResult {
        prediction: if score > 0.5 { "fake" } else { "real" }.to_string(),
        fake_probability: score,
        confidence: (score - 0.5).abs() * 2.0,
        method: "random_forest_fusion".to_string(),
        ai_generated_detected: ai_detected,
        detectgpt_is_generated_value: is_generated,
        num_features_used: features.len(),
    }
}
