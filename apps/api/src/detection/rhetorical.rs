//! Rhetorical analysis: emotional vocabulary, loaded-language patterns,
//! readability and coarse linguistic ratios.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::text::{count_syllables, extract_entities, split_sentences, word_count};

const EMOTIONAL_WORDS: &[(&str, &[&str])] = &[
    ("positive", &["amazing", "incredible", "fantastic", "wonderful", "brilliant", "outstanding"]),
    ("negative", &["terrible", "horrible", "awful", "disgusting", "shocking", "appalling"]),
    ("fear", &["fear", "terror", "panic", "dread", "anxiety", "worry"]),
    ("anger", &["fury", "rage", "outrage", "furious", "angry", "mad"]),
    ("exaggeration", &["extremely", "incredibly", "absolutely", "completely", "totally", "utterly"]),
];

static LOADED_PATTERNS: Lazy<Vec<(&'static str, Vec<Regex>)>> = Lazy::new(|| {
    let build = |patterns: &[&str]| -> Vec<Regex> {
        patterns.iter().filter_map(|p| Regex::new(p).ok()).collect()
    };
    vec![
        (
            "conspiracy",
            build(&[
                r"\b(conspiracy|plot|cover.?up|secret|hidden)\b",
                r"\b(they|them)\b.*\b(hide|conceal)\b",
            ]),
        ),
        (
            "urgency",
            build(&[
                r"\b(urgent|immediate|breaking|shocking|alarming)\b",
                r"\b(now|immediately|asap)\b",
            ]),
        ),
        ("authority", build(&[r"\b(experts?|officials?|sources?)\b.*\b(say|claim|reveal)\b"])),
        (
            "vague_sources",
            build(&[r"\b(according to|sources say|reportedly|allegedly)\b"]),
        ),
        (
            "emotional_triggers",
            build(&[r"\b(devastating|catastrophic|unprecedented|outrageous)\b"]),
        ),
    ]
});

const PRONOUNS: &[&str] = &[
    "i", "me", "you", "he", "him", "she", "her", "it", "we", "us", "they", "them", "this",
    "that", "these", "those", "who", "whom", "someone", "everyone", "nobody",
];
const ADJECTIVE_SUFFIXES: &[&str] = &["ous", "ful", "ive", "able", "ible", "ical", "less", "ish", "ant", "ent"];
const BE_VERBS: &[&str] = &["is", "are", "was", "were", "be", "been", "being"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Readability {
    pub flesch_reading_ease: f64,
    pub flesch_kincaid_grade: f64,
    pub avg_sentence_length: f64,
    pub avg_word_length: f64,
    pub complex_word_ratio: f64,
}

impl Default for Readability {
    fn default() -> Self {
        Self {
            flesch_reading_ease: 50.0,
            flesch_kincaid_grade: 10.0,
            avg_sentence_length: 15.0,
            avg_word_length: 5.0,
            complex_word_ratio: 0.3,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LinguisticPatterns {
    pub entity_diversity: f64,
    pub pronoun_ratio: f64,
    pub adjective_ratio: f64,
    pub complex_sentence_ratio: f64,
    pub passive_voice_ratio: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RhetoricalAnalysis {
    /// Category → hits per word.
    pub emotional_language: BTreeMap<String, f64>,
    /// Pattern group → matches per word.
    pub loaded_language: BTreeMap<String, f64>,
    pub readability: Readability,
    pub linguistic_patterns: LinguisticPatterns,
}

impl RhetoricalAnalysis {
    pub fn emotional(&self, key: &str) -> f64 {
        self.emotional_language.get(key).copied().unwrap_or(0.0)
    }

    pub fn loaded(&self, key: &str) -> f64 {
        self.loaded_language.get(key).copied().unwrap_or(0.0)
    }

    pub fn loaded_total(&self) -> f64 {
        self.loaded_language.values().sum()
    }
}

pub fn analyze_text(text: &str) -> RhetoricalAnalysis {
    RhetoricalAnalysis {
        emotional_language: emotional_language(text),
        loaded_language: loaded_language(text),
        readability: readability(text),
        linguistic_patterns: linguistic_patterns(text),
    }
}

/// Substring hits of each emotional word list, divided by the word count.
pub fn emotional_language(text: &str) -> BTreeMap<String, f64> {
    let words = word_count(text);
    let lower = text.to_lowercase();
    EMOTIONAL_WORDS
        .iter()
        .map(|(emotion, list)| {
            let hits: usize = list.iter().map(|w| lower.matches(w).count()).sum();
            let score = if words == 0 { 0.0 } else { hits as f64 / words as f64 };
            (emotion.to_string(), score)
        })
        .collect()
}

pub fn loaded_language(text: &str) -> BTreeMap<String, f64> {
    let words = word_count(text);
    let lower = text.to_lowercase();
    LOADED_PATTERNS
        .iter()
        .map(|(kind, patterns)| {
            let hits: usize = patterns.iter().map(|re| re.find_iter(&lower).count()).sum();
            let score = if words == 0 { 0.0 } else { hits as f64 / words as f64 };
            (kind.to_string(), score)
        })
        .collect()
}

pub fn readability(text: &str) -> Readability {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Readability::default();
    }
    let sentence_count = split_sentences(text).len().max(1) as f64;
    let word_total = words.len() as f64;
    let syllables: usize = words.iter().map(|w| count_syllables(w)).sum();

    let words_per_sentence = word_total / sentence_count;
    let syllables_per_word = syllables as f64 / word_total;

    let period_chunks: Vec<usize> = text
        .split('.')
        .filter(|s| !s.trim().is_empty())
        .map(word_count)
        .collect();
    let avg_sentence_length = if period_chunks.is_empty() {
        word_total
    } else {
        period_chunks.iter().sum::<usize>() as f64 / period_chunks.len() as f64
    };

    Readability {
        flesch_reading_ease: 206.835 - 1.015 * words_per_sentence - 84.6 * syllables_per_word,
        flesch_kincaid_grade: 0.39 * words_per_sentence + 11.8 * syllables_per_word - 15.59,
        avg_sentence_length,
        avg_word_length: words.iter().map(|w| w.chars().count()).sum::<usize>() as f64 / word_total,
        complex_word_ratio: words.iter().filter(|w| w.chars().count() > 6).count() as f64
            / word_total,
    }
}

pub fn linguistic_patterns(text: &str) -> LinguisticPatterns {
    let tokens: Vec<String> = text
        .split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect();
    if tokens.is_empty() {
        return LinguisticPatterns::default();
    }
    let total = tokens.len() as f64;

    let entities = extract_entities(text);
    let kinds: std::collections::HashSet<_> = entities.iter().map(|e| e.kind).collect();
    let entity_diversity = if entities.is_empty() {
        0.0
    } else {
        kinds.len() as f64 / entities.len() as f64
    };

    let pronouns = tokens.iter().filter(|t| PRONOUNS.contains(&t.as_str())).count();
    let adjectives = tokens
        .iter()
        .filter(|t| t.len() > 4 && ADJECTIVE_SUFFIXES.iter().any(|s| t.ends_with(s)))
        .count();

    let sentences = split_sentences(text);
    let complex = sentences
        .iter()
        .filter(|s| word_count(s) > 25 || s.matches(',').count() >= 2)
        .count();

    let mut be_count = 0usize;
    let mut passive = 0usize;
    for pair in tokens.windows(2) {
        if BE_VERBS.contains(&pair[0].as_str()) {
            be_count += 1;
            if pair[1].ends_with("ed") || pair[1].ends_with("en") {
                passive += 1;
            }
        }
    }

    LinguisticPatterns {
        entity_diversity,
        pronoun_ratio: pronouns as f64 / total,
        adjective_ratio: adjectives as f64 / total,
        complex_sentence_ratio: if sentences.is_empty() {
            0.0
        } else {
            complex as f64 / sentences.len() as f64
        },
        passive_voice_ratio: if be_count == 0 {
            0.0
        } else {
            passive as f64 / be_count as f64
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emotional_rates_per_word() {
        let scores = emotional_language("This is shocking and terrible news everyone");
        // 2 negative hits over 7 words
        assert!((scores["negative"] - 2.0 / 7.0).abs() < 1e-9);
        assert_eq!(scores["positive"], 0.0);
        assert_eq!(scores.len(), 5);
    }

    #[test]
    fn test_loaded_language_detects_vague_sources() {
        let scores = loaded_language("According to insiders, the plan was allegedly approved.");
        assert!(scores["vague_sources"] > 0.0);
        assert!(scores["conspiracy"] == 0.0);
    }

    #[test]
    fn test_empty_text_uses_defaults() {
        let analysis = analyze_text("");
        assert_eq!(analysis.readability, Readability::default());
        assert_eq!(analysis.emotional("fear"), 0.0);
        assert_eq!(analysis.loaded_total(), 0.0);
    }

    #[test]
    fn test_simple_text_reads_easily() {
        let r = readability("The cat sat on the mat. The dog ran.");
        assert!(r.flesch_reading_ease > 80.0);
        assert!((r.avg_sentence_length - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_passive_voice_ratio() {
        let p = linguistic_patterns("The bill was passed. The plan is good.");
        assert!((p.passive_voice_ratio - 0.5).abs() < 1e-9);
    }
}
