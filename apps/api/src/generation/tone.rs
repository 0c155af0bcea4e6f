//! Style and domain resolution for a generation prompt.
//!
//! Explicit hints in the prompt ("in a formal tone", "write a sports ...")
//! win; otherwise both are inferred from the topic and source text with
//! weighted keyword tables.

use once_cell::sync::Lazy;
use regex::Regex;

const DOMAIN_THRESHOLD: f64 = 1.0;
const STYLE_THRESHOLD: f64 = 0.6;

static ABOUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)about\s*:\s*(.+)$").unwrap());

const STYLE_HINTS: &[(&str, &[&str])] = &[
    ("formal", &["formal", "professional", "neutral", "authoritative"]),
    ("sensational", &["sensational", "dramatic", "emotional"]),
    ("fun", &["fun", "playful", "humorous", "light-hearted"]),
    ("normal", &["normal", "natural", "everyday"]),
];

const DOMAIN_HINTS: &[(&str, &[&str])] = &[
    ("politics", &["politics", "political", "government", "election"]),
    ("business", &["business", "market", "economic", "company"]),
    ("sports", &["sports", "sport", "athlete", "game"]),
    ("technology", &["technology", "tech", "digital", "innovation"]),
];

const DOMAIN_KEYWORDS: &[(&str, &[(&str, f64)])] = &[
    ("politics", &[
        ("government", 1.5), ("election", 1.7), ("policy", 1.1), ("president", 1.4),
        ("minister", 1.2), ("parliament", 1.4), ("congress", 1.4), ("senate", 1.2),
        ("campaign", 1.1), ("diplomatic", 1.1), ("bill", 0.8), ("legislation", 1.2),
    ]),
    ("business", &[
        ("market", 1.4), ("economy", 1.3), ("finance", 1.3), ("company", 1.0),
        ("startup", 1.0), ("investment", 1.2), ("revenue", 1.3), ("profit", 1.3),
        ("corporate", 1.1), ("stock", 1.2), ("merger", 1.2), ("shareholder", 1.2),
        ("earnings", 1.3), ("quarter", 0.9),
    ]),
    ("sports", &[
        ("match", 1.2), ("game", 1.0), ("tournament", 1.4), ("league", 1.3),
        ("player", 1.0), ("coach", 1.0), ("season", 1.1), ("score", 1.0),
        ("championship", 1.5), ("olympic", 1.5), ("victory", 1.1), ("defeat", 1.1),
        ("goal", 1.0), ("playoff", 1.3),
    ]),
    ("technology", &[
        ("technology", 1.3), ("tech", 1.3), ("software", 1.2), ("hardware", 1.2),
        ("ai", 1.5), ("artificial intelligence", 1.7), ("robot", 1.1),
        ("digital", 1.0), ("cyber", 1.2), ("innovation", 1.2), ("cloud", 1.1),
        ("startup", 1.0), ("algorithm", 1.3), ("data", 1.0),
    ]),
    ("health", &[
        ("hospital", 1.2), ("vaccine", 1.5), ("disease", 1.3), ("health", 1.1),
        ("medical", 1.3), ("doctor", 1.2), ("patients", 1.1), ("virus", 1.4),
        ("nutrition", 1.0), ("therapy", 1.1), ("clinical", 1.2), ("public health", 1.4),
    ]),
    ("environment", &[
        ("climate", 1.4), ("environment", 1.2), ("wildfire", 1.6), ("sustainability", 1.2),
        ("pollution", 1.3), ("ecosystem", 1.2), ("emissions", 1.3), ("renewable", 1.1),
        ("conservation", 1.2), ("carbon", 1.1), ("earthquake", 1.3), ("flood", 1.3),
    ]),
    ("science", &[
        ("research", 1.2), ("scientists", 1.3), ("study", 1.2), ("laboratory", 1.1),
        ("discovered", 1.2), ("experiment", 1.1), ("nasa", 1.3), ("space", 1.1),
        ("astronomy", 1.3), ("physics", 1.2), ("biology", 1.2), ("university", 0.9),
    ]),
    ("crime", &[
        ("investigation", 1.2), ("suspect", 1.2), ("police", 1.1), ("fraud", 1.3),
        ("arrested", 1.2), ("charges", 1.1), ("lawsuit", 1.1), ("security breach", 1.4),
        ("corruption", 1.2),
    ]),
    ("entertainment", &[
        ("festival", 1.3), ("film", 1.1), ("movie", 1.1), ("celebrity", 1.2),
        ("concert", 1.3), ("award", 1.2), ("music", 1.1), ("series", 1.0),
        ("premiere", 1.2), ("hollywood", 1.4), ("box office", 1.3),
    ]),
];

const SENSATIONAL_KEYWORDS: &[&str] = &[
    "breaking", "crisis", "disaster", "urgent", "scandal", "shocking", "attack", "protest",
    "violence", "alert", "storm", "emergency", "explosion", "tragedy", "wildfire", "threatens",
];

const FUN_KEYWORDS: &[&str] = &[
    "festival", "celebration", "party", "music", "concert", "holiday", "comedy", "event", "kids",
    "fun", "entertainment", "parade", "picnic",
];

const FORMAL_MARKERS: &[(&str, f64)] = &[
    ("according to", 1.0), ("official", 0.8), ("statement", 0.7), ("report", 0.8),
    ("conference", 0.7), ("authorities", 0.9), ("analysis", 0.8), ("research", 0.8),
];

const NEUTRAL_MARKERS: &[(&str, f64)] = &[
    ("community", 0.4), ("local", 0.4), ("everyday", 0.3), ("routine", 0.3), ("update", 0.3),
];

/// Style and domain named explicitly in a prompt such as
/// "Write a sports news article in a fun tone about: ...".
/// A "general" domain hint means no domain.
pub fn parse_hints(prompt: &str) -> (Option<&'static str>, Option<&'static str>) {
    let lower = prompt.to_lowercase();

    let style = STYLE_HINTS
        .iter()
        .find(|(s, _)| {
            lower.contains(&format!("in a {s} tone")) || lower.contains(&format!("{s} —"))
        })
        .or_else(|| {
            STYLE_HINTS
                .iter()
                .find(|(_, kws)| kws.iter().any(|k| lower.contains(k)))
        })
        .map(|(s, _)| *s);

    let explicit = |d: &str| lower.contains(&format!("write a {d}")) || lower.contains(&format!("{d} —"));
    let domain = if let Some((d, _)) = DOMAIN_HINTS.iter().find(|(d, _)| explicit(*d)) {
        Some(*d)
    } else if explicit("general") {
        None
    } else {
        DOMAIN_HINTS
            .iter()
            .find(|(_, kws)| kws.iter().any(|k| lower.contains(k)))
            .map(|(d, _)| *d)
    };

    (style, domain)
}

/// The search topic after a trailing `about:` marker, or the prompt itself.
pub fn extract_topic(prompt: &str) -> String {
    if let Some(idx) = prompt.rfind("about: ") {
        return prompt[idx + "about: ".len()..].trim().to_string();
    }
    ABOUT
        .captures(prompt)
        .and_then(|c| c.get(1))
        .map_or_else(|| prompt.trim().to_string(), |m| m.as_str().trim().to_string())
}

fn best(scores: &[(&'static str, f64)]) -> Option<(&'static str, f64)> {
    let mut top: Option<(&'static str, f64)> = None;
    for &(name, score) in scores {
        if top.map_or(true, |(_, s)| score > s) {
            top = Some((name, score));
        }
    }
    top
}

/// Domain and style guessed from free text. Domain needs a score of at
/// least 1.0; style falls back to `normal` below 0.6.
pub fn infer_domain_style(text: &str) -> (Option<&'static str>, Option<&'static str>) {
    if text.trim().is_empty() {
        return (None, None);
    }
    let lower = text.to_lowercase();

    let domain_scores: Vec<(&str, f64)> = DOMAIN_KEYWORDS
        .iter()
        .map(|(d, kws)| {
            let score = kws
                .iter()
                .filter(|(k, _)| lower.contains(k))
                .map(|(_, w)| w)
                .sum();
            (*d, score)
        })
        .collect();
    let domain = best(&domain_scores)
        .filter(|(_, s)| *s >= DOMAIN_THRESHOLD)
        .map(|(d, _)| d);

    let hits = |kws: &[&str]| kws.iter().filter(|k| lower.contains(*k)).count() as f64;
    let weighted = |kws: &[(&str, f64)]| -> f64 {
        kws.iter()
            .filter(|(k, _)| lower.contains(k))
            .map(|(_, w)| w)
            .sum()
    };

    let mut sensational = hits(SENSATIONAL_KEYWORDS) * 1.2 + lower.matches('!').count() as f64 * 0.4;
    if lower.contains("breaking news") {
        sensational += 1.0;
    }
    let mut fun = hits(FUN_KEYWORDS) * 1.1;
    if lower.contains("festival") || lower.contains("celebration") {
        fun += 0.6;
    }
    let mut formal = weighted(FORMAL_MARKERS);
    if matches!(domain, Some("politics" | "business" | "science")) {
        formal += 0.6;
    }
    let normal = weighted(NEUTRAL_MARKERS);

    let style = match best(&[
        ("sensational", sensational),
        ("fun", fun),
        ("formal", formal),
        ("normal", normal),
    ]) {
        Some((s, score)) if score >= STYLE_THRESHOLD => s,
        _ => "normal",
    };

    (domain, Some(style))
}
