//! Baseline detection: hosted classifiers, GPT analysis and Wikipedia fact checks,
//! run concurrently and collected into one JSON document.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::text::truncate_chars;
use crate::hf_client::HfClient;
use crate::llm_client::{LlmClient, Sampling};
use crate::verification::WikipediaClient;
use crate::vision::image::ImageSource;

const ZERO_SHOT_LABELS: &[&str] = &["real news", "fake news", "misleading"];
/// Detector names accepted in `use_models`.
pub const DETECTORS: &[&str] = &["roberta", "zero_shot", "detectgpt", "gltr", "clip"];

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.?\d*)").unwrap());

const FULL_SYSTEM: &str = "You are an expert fact-checker and fake news detector.";
const QUICK_SYSTEM: &str = "You are a fake news detector. Be concise.";

/// Output of a baseline run, stored verbatim on detection records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineResults {
    pub text_detection: BTreeMap<String, Value>,
    pub multimodal_detection: BTreeMap<String, Value>,
    pub fact_verification: Value,
    pub features: Vec<Value>,
    /// Average of the usable detector scores.
    #[serde(default)]
    pub ensemble: Value,
}

impl BaselineResults {
    /// A detector entry when it ran without error.
    pub fn usable(&self, name: &str) -> Option<&Value> {
        self.text_detection
            .get(name)
            .or_else(|| self.multimodal_detection.get(name))
            .filter(|v| v.get("error").is_none())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GptMode {
    Full,
    Quick,
}

#[derive(Clone)]
pub struct BaselineDetector {
    hf: HfClient,
    llm: LlmClient,
    wikipedia: WikipediaClient,
    http: reqwest::Client,
    roberta_model: String,
    zero_shot_model: String,
    clip_model: String,
}

impl BaselineDetector {
    pub fn new(
        hf: HfClient,
        llm: LlmClient,
        wikipedia: WikipediaClient,
        http: reqwest::Client,
        roberta_model: &str,
        zero_shot_model: &str,
        clip_model: &str,
    ) -> Self {
        Self {
            hf,
            llm,
            wikipedia,
            http,
            roberta_model: roberta_model.to_string(),
            zero_shot_model: zero_shot_model.to_string(),
            clip_model: clip_model.to_string(),
        }
    }

    pub fn models_loaded(&self) -> Value {
        json!({
            "roberta": self.hf.is_available(),
            "zero_shot": self.hf.is_available(),
            "clip": self.hf.is_available(),
            "gpt4": self.llm.is_available(),
        })
    }

    /// Runs every selected detector concurrently. `use_models = None` runs all of them.
    pub async fn detect(
        &self,
        text: &str,
        image: Option<&str>,
        use_models: Option<&[String]>,
    ) -> BaselineResults {
        let enabled = |name: &str| use_models.map_or(true, |m| m.iter().any(|x| x == name));

        let roberta = async {
            if enabled("roberta") {
                Some(self.roberta(text).await)
            } else {
                None
            }
        };
        let zero_shot = async {
            if enabled("zero_shot") {
                Some(self.zero_shot(text).await)
            } else {
                None
            }
        };
        let detectgpt = async {
            if enabled("detectgpt") {
                Some(self.gpt_detect(text, GptMode::Full).await)
            } else {
                None
            }
        };
        let gltr = async {
            if enabled("gltr") {
                Some(self.gpt_detect(text, GptMode::Quick).await)
            } else {
                None
            }
        };
        let clip = async {
            match image {
                Some(img) if enabled("clip") => Some(self.clip(text, img).await),
                _ => None,
            }
        };
        let facts = self.wikipedia.verify_facts(text);

        let (roberta, zero_shot, detectgpt, gltr, clip, facts) =
            tokio::join!(roberta, zero_shot, detectgpt, gltr, clip, facts);

        let mut results = BaselineResults::default();
        for (name, value) in [
            ("roberta", roberta),
            ("zero_shot", zero_shot),
            ("detectgpt", detectgpt),
            ("gltr", gltr),
        ] {
            if let Some(v) = value {
                results.text_detection.insert(name.to_string(), v);
            }
        }
        if let Some(v) = clip {
            results.multimodal_detection.insert("clip".to_string(), v);
        }
        results.fact_verification = serde_json::to_value(facts).unwrap_or(Value::Null);
        results.ensemble = ensemble(&results);
        info!(
            "Baseline detection finished: {} text detectors, ensemble {}",
            results.text_detection.len(),
            results.ensemble["prediction"]
        );
        results
    }

    async fn roberta(&self, text: &str) -> Value {
        if !self.hf.is_available() {
            return json!({
                "model": "roberta",
                "fake_score": 0.5,
                "real_score": 0.5,
                "prediction": "skipped",
                "confidence": 0.0,
                "status": "model_not_loaded",
            });
        }
        match self
            .hf
            .text_classification(&self.roberta_model, truncate_chars(text, 512))
            .await
        {
            Ok(scores) => {
                let score_of = |label: &str| {
                    scores
                        .iter()
                        .find(|s| s.label.eq_ignore_ascii_case(label))
                        .map(|s| s.score)
                };
                let fake = score_of("LABEL_1").or_else(|| score_of("FAKE")).unwrap_or(0.5);
                let real = score_of("LABEL_0").or_else(|| score_of("REAL")).unwrap_or(0.5);
                json!({
                    "model": "roberta",
                    "fake_score": fake,
                    "real_score": real,
                    "prediction": if fake > real { "fake" } else { "real" },
                    "confidence": fake.max(real),
                })
            }
            Err(e) => {
                warn!("roberta detection failed: {e}");
                json!({ "error": e.to_string(), "model": "roberta" })
            }
        }
    }

    async fn zero_shot(&self, text: &str) -> Value {
        if !self.hf.is_available() {
            return json!({
                "model": "zero_shot",
                "prediction": "skipped",
                "confidence": 0.0,
                "status": "model_not_loaded",
            });
        }
        match self
            .hf
            .zero_shot(&self.zero_shot_model, truncate_chars(text, 512), ZERO_SHOT_LABELS)
            .await
        {
            Ok(out) => {
                let score_of = |label: &str| {
                    out.labels
                        .iter()
                        .position(|l| l == label)
                        .and_then(|i| out.scores.get(i).copied())
                        .unwrap_or(0.5)
                };
                json!({
                    "model": "zero_shot",
                    "fake_score": score_of("fake news"),
                    "real_score": score_of("real news"),
                    "prediction": out.labels.first().cloned().unwrap_or_default(),
                    "confidence": out.scores.first().copied().unwrap_or(0.0),
                })
            }
            Err(e) => {
                warn!("zero-shot detection failed: {e}");
                json!({ "error": e.to_string(), "model": "zero_shot" })
            }
        }
    }

    async fn clip(&self, text: &str, image: &str) -> Value {
        if !self.hf.is_available() {
            return json!({
                "model": "clip",
                "text_image_similarity": 0.5,
                "is_consistent": true,
                "consistency_score": 0.5,
                "status": "model_not_loaded",
            });
        }
        let bytes = match ImageSource::parse(image).fetch(&self.http).await {
            Ok((_, bytes)) => bytes,
            Err(e) => return json!({ "error": e.to_string(), "model": "clip" }),
        };
        match self
            .hf
            .image_text_similarity(&self.clip_model, &bytes, truncate_chars(text, 77))
            .await
        {
            Ok(similarity) => json!({
                "model": "clip",
                "text_image_similarity": similarity,
                "is_consistent": similarity > 0.5,
                "consistency_score": similarity,
            }),
            Err(e) => {
                warn!("CLIP consistency check failed: {e}");
                json!({ "error": e.to_string(), "model": "clip" })
            }
        }
    }

    async fn gpt_detect(&self, text: &str, mode: GptMode) -> Value {
        if !self.llm.is_available() {
            return json!({
                "error": "GPT-4 not initialized",
                "fake_probability": 0.5,
                "method": "gpt4_unavailable",
            });
        }
        let model = self.llm.default_model().to_string();
        let outcome = match mode {
            GptMode::Full => self
                .llm
                .complete(&model, FULL_SYSTEM, &full_prompt(text), &Sampling::new(800, 0.3))
                .await
                .map(|(reply, _)| parse_full_analysis(&reply, &model)),
            GptMode::Quick => self
                .llm
                .complete(&model, QUICK_SYSTEM, &quick_prompt(text), &Sampling::new(50, 0.3))
                .await
                .map(|(reply, _)| json!({ "fake_probability": parse_quick(&reply), "method": "gpt4_quick" })),
        };
        outcome.unwrap_or_else(|e| {
            warn!("GPT detection error: {e}");
            json!({ "error": e.to_string(), "fake_probability": 0.5, "method": "gpt4_error" })
        })
    }
}

fn full_prompt(text: &str) -> String {
    format!(
        "Analyze this news article for fake news indicators.\n\n\
         ARTICLE:\n{}\n\n\
         Respond in this format:\n\
         VERDICT: [Real/Suspicious/Fake]\n\
         CONFIDENCE: [0-100]%\n\
         FAKE_PROBABILITY: [0.0-1.0]\n\
         REASONING:\n\
         - **Point 1: [Title]** - [Detailed explanation in 1-2 sentences]\n\
         - **Point 2: [Title]** - [Detailed explanation in 1-2 sentences]\n\
         - **Point 3: [Title]** - [Detailed explanation in 1-2 sentences]\n\n\
         Consider: factual accuracy, source credibility, language manipulation, logical consistency.\n\
         IMPORTANT: Each reasoning point MUST include both a title and a detailed explanation after the dash.",
        truncate_chars(text, 2000)
    )
}

fn quick_prompt(text: &str) -> String {
    format!(
        "Is this news fake or real? Respond: FAKE [0.0-1.0] or REAL [0.0-1.0]\n\nArticle: {}",
        truncate_chars(text, 1000)
    )
}

/// Parses the VERDICT / CONFIDENCE / FAKE_PROBABILITY / REASONING reply.
pub fn parse_full_analysis(reply: &str, model: &str) -> Value {
    let mut fake_probability: f64 = 0.5;
    let mut confidence: f64 = 0.5;
    let mut verdict = "unknown";
    let mut reasoning: Vec<String> = Vec::new();

    for line in reply.lines() {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        let value = || trimmed.split_once(':').map(|(_, v)| v.trim()).unwrap_or("");

        if lower.starts_with("verdict:") {
            let v = value().to_lowercase();
            if v.contains("fake") {
                verdict = "fake";
                fake_probability = 0.8;
            } else if v.contains("suspicious") {
                verdict = "suspicious";
                fake_probability = 0.6;
            } else if v.contains("real") {
                verdict = "real";
                fake_probability = 0.2;
            }
        } else if lower.starts_with("confidence:") {
            if let Ok(c) = value().replace('%', "").trim().parse::<f64>() {
                confidence = c / 100.0;
            }
        } else if lower.starts_with("fake_probability:") {
            if let Ok(p) = value().parse::<f64>() {
                fake_probability = p;
            }
        } else if let Some(point) = trimmed.strip_prefix('-') {
            reasoning.push(point.trim().to_string());
        }
    }
    reasoning.truncate(5);

    json!({
        "fake_probability": fake_probability.clamp(0.0, 1.0),
        "confidence": confidence.clamp(0.0, 1.0),
        "verdict": verdict,
        "reasoning": reasoning,
        "method": "gpt4_full",
        "model": model,
        "is_generated": fake_probability > 0.5,
        "sensitivity": fake_probability * 10.0,
    })
}

/// "FAKE 0.8" style replies. Any mention of fake without a usable number is 0.7.
pub fn parse_quick(reply: &str) -> f64 {
    let lower = reply.to_lowercase();
    if !lower.contains("fake") {
        return 0.3;
    }
    FIRST_NUMBER
        .captures(&lower)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|p| *p <= 1.0)
        .unwrap_or(0.7)
}

/// Mean of the usable fake scores across detectors and fact verification.
pub fn ensemble(results: &BaselineResults) -> Value {
    let mut scores: Vec<f64> = Vec::new();
    let mut used: Vec<String> = Vec::new();

    for (name, value) in results
        .text_detection
        .iter()
        .chain(results.multimodal_detection.iter())
    {
        if value.get("error").is_some() || value.get("status").is_some() {
            continue;
        }
        let score = value
            .get("fake_score")
            .or_else(|| value.get("fake_probability"))
            .and_then(Value::as_f64)
            .or_else(|| {
                value
                    .get("consistency_score")
                    .and_then(Value::as_f64)
                    .map(|c| 1.0 - c)
            });
        if let Some(s) = score {
            scores.push(s);
            used.push(name.clone());
        }
    }
    if let Some(p) = results
        .fact_verification
        .get("fake_probability")
        .and_then(Value::as_f64)
    {
        scores.push(p);
        used.push("fact_verification".to_string());
    }

    let fake_probability = if scores.is_empty() {
        0.5
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    json!({
        "prediction": if fake_probability >= 0.5 { "fake" } else { "real" },
        "fake_probability": fake_probability,
        "confidence": (fake_probability - 0.5).abs() * 2.0,
        "models_used": used,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_analysis() {
        let reply = "VERDICT: Fake\nCONFIDENCE: 85%\nFAKE_PROBABILITY: 0.9\nREASONING:\n- **Sources** - none cited\n- **Tone** - sensational";
        let v = parse_full_analysis(reply, "gpt-4o");
        assert_eq!(v["verdict"], "fake");
        assert_eq!(v["fake_probability"], 0.9);
        assert_eq!(v["confidence"], 0.85);
        assert_eq!(v["reasoning"].as_array().unwrap().len(), 2);
        assert_eq!(v["is_generated"], true);
        assert_eq!(v["sensitivity"], 9.0);
        assert_eq!(v["method"], "gpt4_full");
    }

    #[test]
    fn test_parse_full_analysis_verdict_only() {
        let v = parse_full_analysis("VERDICT: Real", "m");
        assert_eq!(v["fake_probability"], 0.2);
        assert_eq!(v["confidence"], 0.5);
        assert_eq!(v["is_generated"], false);
    }

    #[test]
    fn test_parse_quick() {
        assert_eq!(parse_quick("FAKE 0.85"), 0.85);
        assert_eq!(parse_quick("FAKE 85"), 0.7);
        assert_eq!(parse_quick("Fake"), 0.7);
        assert_eq!(parse_quick("REAL 0.9"), 0.3);
    }

    #[test]
    fn test_ensemble_skips_unusable_detectors() {
        let mut results = BaselineResults::default();
        results.text_detection.insert(
            "roberta".into(),
            json!({"fake_score": 0.5, "status": "model_not_loaded"}),
        );
        results
            .text_detection
            .insert("detectgpt".into(), json!({"fake_probability": 0.8}));
        results.text_detection.insert(
            "gltr".into(),
            json!({"error": "GPT-4 not initialized", "fake_probability": 0.5}),
        );
        results.fact_verification = json!({"fake_probability": 0.4});

        let e = ensemble(&results);
        assert!((e["fake_probability"].as_f64().unwrap() - 0.6).abs() < 1e-9);
        assert_eq!(e["prediction"], "fake");
        assert_eq!(e["models_used"], json!(["detectgpt", "fact_verification"]));
        assert!(results.usable("gltr").is_none());
        assert!(results.usable("roberta").is_some());
    }

    #[tokio::test]
    async fn test_detect_without_services_uses_fallback_shapes() {
        let http = reqwest::Client::new();
        let detector = BaselineDetector::new(
            HfClient::new(http.clone(), None, "http://127.0.0.1:9"),
            LlmClient::new(None, "http://127.0.0.1:9", "gpt-4o").unwrap(),
            WikipediaClient::new(http.clone(), "http://127.0.0.1:9/w/api.php"),
            http,
            "r",
            "z",
            "c",
        );
        let results = detector
            .detect("a quiet afternoon in the park", Some("AAAA"), None)
            .await;
        assert_eq!(results.text_detection["roberta"]["prediction"], "skipped");
        assert_eq!(results.text_detection["detectgpt"]["method"], "gpt4_unavailable");
        assert_eq!(results.multimodal_detection["clip"]["consistency_score"], 0.5);
        assert_eq!(results.fact_verification["fake_probability"], 0.5);

        let only = vec!["roberta".to_string()];
        let partial = detector.detect("text", None, Some(&only)).await;
        assert_eq!(partial.text_detection.len(), 1);
    }
}
