//! Human-readable report attached to improved detection results.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::baseline::BaselineResults;
use super::consistency::ConsistencyCheck;
use super::rhetorical::{Readability, RhetoricalAnalysis};
use super::text::split_sentences;
use super::verdict::FinalPrediction;
use crate::verification::TavilyVerification;

const HIGHLIGHT_EMOTIVE: &[&str] = &[
    "shocking", "outrage", "devastating", "incredible", "amazing", "terrible", "horrible",
    "fantastic", "unbelievable", "stunning", "dramatic", "explosive", "scandalous",
    "controversial", "sensational", "breathtaking", "mind-blowing", "lie", "lies", "false",
    "fake", "deceptive", "misleading",
];
const HIGHLIGHT_LOADED: &[&str] = &[
    "obviously", "clearly", "undoubtedly", "certainly", "definitely", "absolutely",
    "completely", "totally", "entirely", "wholly", "allegedly", "supposedly", "reportedly",
    "apparently",
];
const SENTENCE_EMOTIVE: &[&str] = &[
    "shocking", "devastating", "incredible", "amazing", "terrible", "horrible", "fantastic",
    "unbelievable",
];
const SENTENCE_LOADED: &[&str] = &["obviously", "clearly", "undoubtedly", "certainly", "definitely"];
const NAVIGATION_WORDS: &[&str] = &["shopping", "entertainment", "explore more", "final hours"];
const OFF_TOPIC_WORDS: &[&str] = &["kfc", "crypto", "prince", "nrl", "shopping"];
const BOILERPLATE_MARKERS: &[&str] = &[".com", ".au", "shopping", "entertainment"];

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:18|19|20)\d{2}\b").unwrap());
static FRAGMENT_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").unwrap());
static WEBSITE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\w+\.(?:com|au|org|net)").unwrap());
static EMOTIVE_WORDS: Lazy<Regex> = Lazy::new(|| word_alternation(HIGHLIGHT_EMOTIVE));
static LOADED_WORDS: Lazy<Regex> = Lazy::new(|| word_alternation(HIGHLIGHT_LOADED));

fn word_alternation(words: &[&str]) -> Regex {
    let body = words
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{body})\b")).unwrap()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub severity: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fake_probability: Option<f64>,
}

impl Issue {
    fn new(kind: &str, text: impl Into<String>, severity: &str, description: impl Into<String>) -> Self {
        Self {
            kind: kind.to_string(),
            text: text.into(),
            severity: severity.to_string(),
            description: description.into(),
            fake_probability: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationSection {
    pub score: f64,
    pub coverage: f64,
    pub entities_found: usize,
    pub claims_verified: usize,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RhetoricalSection {
    pub emotional_language: BTreeMap<String, f64>,
    pub loaded_language: BTreeMap<String, f64>,
    pub readability: Readability,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConsistencySection {
    pub overall_score: f64,
    pub temporal_issues: Vec<String>,
    pub spatial_issues: Vec<String>,
    pub logical_issues: Vec<String>,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetailedAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wikipedia_verification: Option<VerificationSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_verification: Option<VerificationSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rhetorical_analysis: Option<RhetoricalSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consistency_check: Option<ConsistencySection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProblematicSentence {
    pub sentence: String,
    pub sentence_number: usize,
    pub issue_type: String,
    pub reason: String,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetailedReport {
    pub timestamp: DateTime<Utc>,
    pub overall_assessment: String,
    pub fake_probability: f64,
    pub confidence: f64,
    /// Input text with `<mark class="...">` spans around flagged passages.
    pub highlighted_text: String,
    pub issues_found: Vec<Issue>,
    pub recommendations: Vec<String>,
    pub detailed_analysis: DetailedAnalysis,
    pub problematic_sentences: Vec<ProblematicSentence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_quality_warning: Option<String>,
}

pub struct ReportInputs<'a> {
    pub text: &'a str,
    pub prediction: &'a FinalPrediction,
    pub baseline: &'a BaselineResults,
    pub verification: Option<&'a TavilyVerification>,
    pub rhetorical: Option<&'a RhetoricalAnalysis>,
    pub consistency: Option<&'a ConsistencyCheck>,
}

pub fn build_report(inputs: ReportInputs<'_>) -> DetailedReport {
    let text = inputs.text;
    let mut highlighted = text.to_string();
    let mut issues: Vec<Issue> = Vec::new();
    let mut analysis = DetailedAnalysis::default();

    if let Some(v) = inputs.verification {
        let found = verification_issues(text, v, &mut highlighted);
        let section = VerificationSection {
            score: v.overall_score,
            coverage: v.tavily_coverage,
            entities_found: v.entities_found,
            claims_verified: v.claims_verified,
            issues: found.clone(),
        };
        analysis.wikipedia_verification = Some(section.clone());
        analysis.tavily_verification = Some(section);
        issues.extend(found);
    }

    if let Some(r) = inputs.rhetorical {
        let found = rhetorical_issues(r, &mut highlighted);
        analysis.rhetorical_analysis = Some(RhetoricalSection {
            emotional_language: r.emotional_language.clone(),
            loaded_language: r.loaded_language.clone(),
            readability: r.readability.clone(),
            issues: found.clone(),
        });
        issues.extend(found);
    }

    if let Some(c) = inputs.consistency {
        let found = consistency_issues(c, &mut highlighted);
        analysis.consistency_check = Some(ConsistencySection {
            overall_score: c.overall_consistency_score,
            temporal_issues: c.temporal_consistency.temporal_issues.clone(),
            spatial_issues: c.spatial_consistency.spatial_issues.clone(),
            logical_issues: c.logical_consistency.detected_contradictions.clone(),
            issues: found.clone(),
        });
        issues.extend(found);
    }

    let mut sentence_issues = issues.clone();
    let mut text_quality_warning = None;
    if text_quality(text) < 0.3 {
        sentence_issues.retain(|i| !i.kind.starts_with("unverified_"));
        text_quality_warning =
            Some("Text appears to have parsing issues, fact verification reduced".to_string());
    }
    for (name, result) in &inputs.baseline.text_detection {
        let Some(score) = result.get("fake_score").and_then(|s| s.as_f64()) else {
            continue;
        };
        if score > 0.4 {
            let mut issue = Issue::new(
                "model_detection",
                name.clone(),
                "high",
                format!("{name} model detected high fake probability ({:.1}%)", score * 100.0),
            );
            issue.fake_probability = Some(score);
            sentence_issues.push(issue);
        }
    }

    let fake_probability = inputs.prediction.fake_probability;
    DetailedReport {
        timestamp: Utc::now(),
        overall_assessment: inputs.prediction.prediction.clone(),
        fake_probability,
        confidence: inputs.prediction.confidence,
        highlighted_text: highlighted,
        recommendations: recommendations(&issues, fake_probability),
        problematic_sentences: problematic_sentences(text, &sentence_issues),
        issues_found: issues,
        detailed_analysis: analysis,
        text_quality_warning,
    }
}

fn mark(class: &str, inner: &str) -> String {
    format!("<mark class=\"{class}\">{inner}</mark>")
}

fn verification_issues(text: &str, v: &TavilyVerification, highlighted: &mut String) -> Vec<Issue> {
    let mut issues = Vec::new();
    for entity in v.entity_results.iter().filter(|e| !e.exists) {
        if entity.entity.is_empty() || !text.contains(&entity.entity) {
            continue;
        }
        *highlighted = highlighted.replace(&entity.entity, &mark("unverified-entity", &entity.entity));
        issues.push(Issue::new(
            "unverified_entity",
            entity.entity.clone(),
            "high",
            format!("Entity \"{}\" not found in fact verification", entity.entity),
        ));
    }
    for claim in v.claim_results.iter().filter(|c| !c.verified) {
        if claim.claim.is_empty() || !text.contains(&claim.claim) {
            continue;
        }
        *highlighted = highlighted.replace(&claim.claim, &mark("unverified-claim", &claim.claim));
        issues.push(Issue::new(
            "unverified_claim",
            claim.claim.clone(),
            "high",
            format!("Claim \"{}\" not verified by fact verification", claim.claim),
        ));
    }
    if v.overall_score < 0.6 {
        issues.push(Issue::new(
            "low_verification_score",
            format!("Overall verification score: {:.1}%", v.overall_score * 100.0),
            "medium",
            "Low fact verification score indicates potential factual issues",
        ));
    }
    issues
}

fn describe_rates(rates: &BTreeMap<String, f64>) -> String {
    serde_json::to_string(rates).unwrap_or_default()
}

fn rhetorical_issues(r: &RhetoricalAnalysis, highlighted: &mut String) -> Vec<Issue> {
    let mut issues = Vec::new();
    *highlighted = EMOTIVE_WORDS
        .replace_all(highlighted.as_str(), mark("emotive", "$0").as_str())
        .into_owned();
    *highlighted = LOADED_WORDS
        .replace_all(highlighted.as_str(), mark("loaded", "$0").as_str())
        .into_owned();

    if r.emotional_language.values().any(|v| *v != 0.0) {
        issues.push(Issue::new(
            "emotional_language",
            "Emotional language detected",
            "medium",
            format!("High emotional content: {}", describe_rates(&r.emotional_language)),
        ));
    }
    if r.loaded_language.values().any(|v| *v != 0.0) {
        issues.push(Issue::new(
            "loaded_language",
            "Loaded language detected",
            "high",
            format!("Potentially manipulative language: {}", describe_rates(&r.loaded_language)),
        ));
    }
    let flesch = r.readability.flesch_reading_ease;
    if flesch < 30.0 {
        issues.push(Issue::new(
            "poor_readability",
            format!("Readability score: {flesch:.1}"),
            "low",
            "Text is very difficult to read, may indicate AI generation",
        ));
    }
    issues
}

fn consistency_issues(c: &ConsistencyCheck, highlighted: &mut String) -> Vec<Issue> {
    *highlighted = YEAR
        .replace_all(highlighted.as_str(), mark("year", "$0").as_str())
        .into_owned();

    let groups = [
        ("temporal_inconsistency", "Temporal inconsistency", &c.temporal_consistency.temporal_issues),
        ("spatial_inconsistency", "Spatial inconsistency", &c.spatial_consistency.spatial_issues),
        ("logical_contradiction", "Logical contradiction", &c.logical_consistency.detected_contradictions),
    ];
    groups
        .into_iter()
        .flat_map(|(kind, label, found)| {
            found
                .iter()
                .map(move |issue| Issue::new(kind, issue.clone(), "high", format!("{label}: {issue}")))
        })
        .collect()
}

/// Score in [0, 1]; low values mean the text looks like scraped page chrome
/// rather than an article.
pub fn text_quality(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let fragments: Vec<&str> = FRAGMENT_SPLIT.split(text).collect();
    let count = fragments.len().max(1) as f64;

    let short = fragments.iter().filter(|f| f.trim().chars().count() < 10).count() as f64;
    let excessive_fragments = f64::min(short / count, 1.0);
    let navigation = NAVIGATION_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64
        / NAVIGATION_WORDS.len() as f64;
    let websites = f64::min(WEBSITE.find_iter(text).count() as f64 / 5.0, 1.0);
    let mixed = f64::min(
        OFF_TOPIC_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64 / 3.0,
        1.0,
    );
    let avg_len = fragments.iter().map(|f| f.trim().chars().count()).sum::<usize>() as f64 / count;
    let poor_structure = if avg_len < 30.0 { 1.0 } else { 0.0 };

    let penalty = (excessive_fragments + navigation + websites + mixed + poor_structure) / 5.0;
    (1.0 - penalty).clamp(0.0, 1.0)
}

fn sentence_has_issue(sentence: &str, issue: &Issue) -> bool {
    let lower = sentence.to_lowercase();
    match issue.kind.as_str() {
        "unverified_entity" | "unverified_claim" => {
            !issue.text.is_empty() && lower.contains(&issue.text.to_lowercase())
        }
        "emotional_language" => SENTENCE_EMOTIVE.iter().any(|w| lower.contains(w)),
        "loaded_language" => SENTENCE_LOADED.iter().any(|w| lower.contains(w)),
        "model_detection" => true,
        _ => false,
    }
}

pub fn issue_reason(kind: &str) -> &'static str {
    match kind {
        "unverified_entity" => "Entity not found in fact verification",
        "unverified_claim" => "Unverified claim",
        "low_verification_score" => "Low overall verification score",
        "emotional_language" => "Contains emotional language",
        "loaded_language" => "Contains biased language",
        "year_inconsistency" => "Year information may be inaccurate",
        "logical_contradiction" => "Logical contradiction detected",
        "model_detection" => "AI model detected potential fake content",
        "consistency_issue" => "Consistency check found problems",
        _ => "Potential issue detected",
    }
}

pub fn issue_severity(kind: &str) -> &'static str {
    match kind {
        "emotional_language" => "Low",
        "unverified_entity" | "loaded_language" => "Medium",
        "unverified_claim" | "low_verification_score" | "year_inconsistency"
        | "logical_contradiction" | "model_detection" | "consistency_issue" => "High",
        _ => "Medium",
    }
}

fn problematic_sentences(text: &str, issues: &[Issue]) -> Vec<ProblematicSentence> {
    let sentences: Vec<String> = split_sentences(text)
        .into_iter()
        .filter(|s| s.chars().count() > 10)
        .collect();

    let mut flagged = Vec::new();
    for issue in issues {
        for (i, sentence) in sentences.iter().enumerate() {
            if !sentence_has_issue(sentence, issue) || sentence.chars().count() < 20 {
                continue;
            }
            let lower = sentence.to_lowercase();
            if BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m)) {
                continue;
            }
            flagged.push(ProblematicSentence {
                sentence: sentence.clone(),
                sentence_number: i + 1,
                issue_type: issue.kind.clone(),
                reason: issue_reason(&issue.kind).to_string(),
                severity: issue_severity(&issue.kind).to_string(),
            });
        }
    }

    let strongest = issues
        .iter()
        .filter_map(|i| i.fake_probability)
        .fold(0.0, f64::max);
    if strongest > 0.7 {
        for (i, sentence) in sentences.iter().enumerate() {
            if sentence.chars().count() > 20 {
                flagged.push(ProblematicSentence {
                    sentence: sentence.clone(),
                    sentence_number: i + 1,
                    issue_type: "model_detection".to_string(),
                    reason: format!(
                        "AI model detected high fake probability ({:.1}%)",
                        strongest * 100.0
                    ),
                    severity: "High".to_string(),
                });
            }
        }
    }

    let mut seen = HashSet::new();
    flagged.retain(|p| seen.insert(p.sentence.clone()));
    flagged.sort_by_key(|p| p.sentence_number);
    flagged
}

pub fn recommendations(issues: &[Issue], fake_probability: f64) -> Vec<String> {
    let headline = if fake_probability > 0.7 {
        "⚠️ High fake news probability - verify all facts independently"
    } else if fake_probability > 0.5 {
        "⚠️ Moderate fake news probability - cross-check key claims"
    } else {
        "✅ Low fake news probability - appears credible"
    };
    let follow_ups = [
        ("unverified_entity", "🔍 Verify all mentioned entities and organizations"),
        ("unverified_claim", "📚 Cross-reference factual claims with reliable sources"),
        ("low_verification_score", "📖 Check fact-checking sources"),
        ("emotional_language", "😤 Be aware of emotional manipulation tactics"),
        ("loaded_language", "🚨 Watch for biased or manipulative language"),
        ("temporal_inconsistency", "⏰ Verify timeline and date information"),
        ("spatial_inconsistency", "🌍 Check geographical and location details"),
        ("logical_contradiction", "🧠 Look for logical inconsistencies in the narrative"),
    ];

    let mut out = vec![headline.to_string()];
    out.extend(
        follow_ups
            .iter()
            .filter(|(kind, _)| issues.iter().any(|i| i.kind == *kind))
            .map(|(_, text)| text.to_string()),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::consistency::comprehensive_check;
    use crate::detection::rhetorical::analyze_text;
    use crate::detection::verdict::fast_path_prediction;
    use crate::verification::tavily::{ClaimCheck, EntityCheck};
    use serde_json::json;

    const ARTICLE: &str = "Officials in Springfield announced a new budget on Monday for the coming year. \
        The plan was obviously shaped by months of shocking revelations about waste. \
        Council members said the Acme Foundation had donated funds in 2019 to support the library.";

    fn verification(score: f64) -> TavilyVerification {
        TavilyVerification {
            overall_score: score,
            tavily_coverage: 0.5,
            wikipedia_coverage: 0.5,
            entities_found: 1,
            entities_checked: 2,
            claims_verified: 0,
            claims_checked: 1,
            entity_results: vec![
                EntityCheck {
                    entity: "Springfield".into(),
                    exists: true,
                    confidence: 0.9,
                    summary: None,
                    sources: vec![],
                    answer: String::new(),
                },
                EntityCheck {
                    entity: "Acme Foundation".into(),
                    exists: false,
                    confidence: 0.1,
                    summary: None,
                    sources: vec![],
                    answer: String::new(),
                },
            ],
            claim_results: vec![ClaimCheck {
                claim: "not in the text".into(),
                verified: false,
                confidence: 0.2,
                evidence: vec![],
                verdict: "unknown".into(),
                answer: String::new(),
                sources_count: 0,
            }],
            provider: "tavily".into(),
            error: None,
        }
    }

    fn report_for(text: &str, v: Option<&TavilyVerification>, baseline: &BaselineResults) -> DetailedReport {
        let rhetorical = analyze_text(text);
        let consistency = comprehensive_check(text);
        let prediction = fast_path_prediction(&verification(0.9));
        build_report(ReportInputs {
            text,
            prediction: &prediction,
            baseline,
            verification: v,
            rhetorical: Some(&rhetorical),
            consistency: Some(&consistency),
        })
    }

    #[test]
    fn test_unverified_entity_is_marked_and_reported() {
        let v = verification(0.4);
        let report = report_for(ARTICLE, Some(&v), &BaselineResults::default());
        assert!(report
            .highlighted_text
            .contains("<mark class=\"unverified-entity\">Acme Foundation</mark>"));
        assert!(!report.highlighted_text.contains("<mark class=\"unverified-entity\">Springfield"));
        let kinds: Vec<&str> = report.issues_found.iter().map(|i| i.kind.as_str()).collect();
        assert!(kinds.contains(&"unverified_entity"));
        assert!(kinds.contains(&"low_verification_score"));
        // claims absent from the text are not reported
        assert!(!kinds.contains(&"unverified_claim"));
        assert!(report.detailed_analysis.tavily_verification.is_some());
        assert_eq!(
            report.detailed_analysis.tavily_verification,
            report.detailed_analysis.wikipedia_verification
        );
    }

    #[test]
    fn test_word_and_year_highlighting() {
        let report = report_for(ARTICLE, None, &BaselineResults::default());
        assert!(report.highlighted_text.contains("<mark class=\"loaded\">obviously</mark>"));
        assert!(report.highlighted_text.contains("<mark class=\"emotive\">shocking</mark>"));
        assert!(report.highlighted_text.contains("<mark class=\"year\">2019</mark>"));
    }

    #[test]
    fn test_problematic_sentences_are_unique_and_ordered() {
        let v = verification(0.4);
        let mut baseline = BaselineResults::default();
        baseline
            .text_detection
            .insert("roberta".into(), json!({"fake_score": 0.9, "confidence": 0.8}));
        let report = report_for(ARTICLE, Some(&v), &baseline);

        let numbers: Vec<usize> = report
            .problematic_sentences
            .iter()
            .map(|p| p.sentence_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        // model_detection issues feed the sentence list but not issues_found
        assert!(report.issues_found.iter().all(|i| i.kind != "model_detection"));
    }

    #[test]
    fn test_text_quality_flags_page_chrome() {
        assert!(text_quality(ARTICLE) > 0.6);
        let chrome = "Shopping. Entertainment. Explore more. news.com. kfc.com. crypto. NRL. Final hours.";
        assert!(text_quality(chrome) < 0.3);
        let v = verification(0.4);
        let report = report_for(chrome, Some(&v), &BaselineResults::default());
        assert!(report.text_quality_warning.is_some());
    }

    #[test]
    fn test_recommendations_follow_probability_and_issues() {
        let issues = vec![
            Issue::new("emotional_language", "", "medium", ""),
            Issue::new("logical_contradiction", "", "high", ""),
        ];
        let recs = recommendations(&issues, 0.8);
        assert_eq!(recs.len(), 3);
        assert!(recs[0].contains("High fake news probability"));
        assert!(recs[2].contains("logical inconsistencies"));
        assert!(recommendations(&[], 0.6)[0].contains("Moderate"));
        assert!(recommendations(&[], 0.2)[0].contains("appears credible"));
    }

    #[test]
    fn test_reason_and_severity_defaults() {
        assert_eq!(issue_severity("unverified_claim"), "High");
        assert_eq!(issue_severity("emotional_language"), "Low");
        assert_eq!(issue_severity("something_else"), "Medium");
        assert_eq!(issue_reason("something_else"), "Potential issue detected");
    }
}
