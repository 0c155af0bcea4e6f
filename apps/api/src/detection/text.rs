//! Lightweight text helpers shared by the detectors: sentence splitting,
//! capitalised-span entity extraction, syllable counting.

use once_cell::sync::Lazy;
use regex::Regex;

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)").unwrap());
static CAPITALISED_SPAN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Z][a-zA-Z'\-]+(?:\s+(?:of\s+)?[A-Z][a-zA-Z'\-]+)*").unwrap()
});
static LOCATION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:in|at|from|near|across)\s+$").unwrap());

/// Capitalised words that start sentences or carry no entity meaning.
const ENTITY_STOPWORDS: &[&str] = &[
    "The", "A", "An", "In", "On", "At", "By", "For", "From", "To", "Of", "And", "But", "Or",
    "It", "Its", "This", "That", "These", "Those", "He", "She", "They", "We", "I", "You",
    "His", "Her", "Their", "Our", "My", "Your", "As", "If", "When", "While", "After",
    "Before", "According", "However", "Meanwhile", "Breaking", "Today", "Yesterday",
    "Tomorrow", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday",
    "Sunday", "January", "February", "March", "April", "May", "June", "July", "August",
    "September", "October", "November", "December", "There", "Here", "What", "Why", "How",
    "Who", "Where", "Some", "Many", "Most", "All", "Officials", "Experts", "Sources",
];

const ORG_MARKERS: &[&str] = &[
    "Company", "Corporation", "Corp", "Inc", "Ltd", "University", "Institute", "Agency",
    "Ministry", "Department", "Party", "Bank", "Organization", "Organisation", "Council",
    "Association", "Group", "Committee", "Commission", "Foundation", "Society", "Club",
    "News", "Times", "Post", "Senate", "Congress", "Parliament", "Court", "Union",
];

const PLACE_MARKERS: &[&str] = &[
    "City", "State", "Country", "Nation", "County", "Province", "Republic", "Tower", "Bridge",
    "Street", "River", "Mountain", "Island", "Park",
];

/// Rough entity class, standing in for PERSON / ORG / GPE tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Person,
    Organization,
    Location,
    Other,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Person => "PERSON",
            EntityKind::Organization => "ORG",
            EntityKind::Location => "GPE",
            EntityKind::Other => "MISC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub text: String,
    pub kind: EntityKind,
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Splits on terminal punctuation followed by whitespace; keeps the punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        let sentence = text[start..m.end()].trim();
        if !sentence.is_empty() {
            sentences.push(sentence.to_string());
        }
        start = m.end();
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences
}

/// Capitalised spans, de-duplicated in order of first appearance.
pub fn extract_entities(text: &str) -> Vec<Entity> {
    let mut out: Vec<Entity> = Vec::new();
    for m in CAPITALISED_SPAN.find_iter(text) {
        let mut words: Vec<&str> = m.as_str().split_whitespace().collect();
        while words
            .first()
            .is_some_and(|w| ENTITY_STOPWORDS.contains(w))
        {
            words.remove(0);
        }
        if words.is_empty() {
            continue;
        }
        let span = words.join(" ");
        if span.len() < 3 || out.iter().any(|e| e.text == span) {
            continue;
        }
        let kind = classify(&span, &text[..m.start()]);
        out.push(Entity { text: span, kind });
    }
    out
}

/// Entity strings only, capped at `limit`.
pub fn entity_names(text: &str, limit: usize) -> Vec<String> {
    extract_entities(text)
        .into_iter()
        .take(limit)
        .map(|e| e.text)
        .collect()
}

fn classify(span: &str, preceding: &str) -> EntityKind {
    let words: Vec<&str> = span.split_whitespace().collect();
    if words.iter().any(|w| ORG_MARKERS.contains(w)) {
        return EntityKind::Organization;
    }
    if words.iter().any(|w| PLACE_MARKERS.contains(w)) || LOCATION_PREFIX.is_match(preceding) {
        return EntityKind::Location;
    }
    if words.len() >= 2 && words.len() <= 3 {
        return EntityKind::Person;
    }
    if words.len() == 1 && span.chars().all(|c| c.is_ascii_uppercase()) {
        return EntityKind::Organization;
    }
    EntityKind::Other
}

/// Vowel-group syllable estimate used by the readability scores.
pub fn count_syllables(word: &str) -> usize {
    let word: String = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if word.is_empty() {
        return 0;
    }
    let mut count = 0;
    let mut prev_vowel = false;
    for c in word.chars() {
        let vowel = matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !prev_vowel {
            count += 1;
        }
        prev_vowel = vowel;
    }
    if word.ends_with('e') && !word.ends_with("le") && count > 1 {
        count -= 1;
    }
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_is_char_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_split_sentences() {
        let s = split_sentences("First one. Second one! Third? trailing");
        assert_eq!(s, vec!["First one.", "Second one!", "Third?", "trailing"]);
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn test_extract_entities_skips_sentence_starters() {
        let entities = extract_entities(
            "The Eiffel Tower was visited by Emmanuel Macron. In Paris the World Health Organization met.",
        );
        let names: Vec<&str> = entities.iter().map(|e| e.text.as_str()).collect();
        assert!(names.contains(&"Eiffel Tower"));
        assert!(names.contains(&"Emmanuel Macron"));
        assert!(names.contains(&"World Health Organization"));
        let tower = entities.iter().find(|e| e.text == "Eiffel Tower").unwrap();
        assert_eq!(tower.kind, EntityKind::Location);
        let who = entities
            .iter()
            .find(|e| e.text == "World Health Organization")
            .unwrap();
        assert_eq!(who.kind, EntityKind::Organization);
    }

    #[test]
    fn test_location_from_preposition() {
        let entities = extract_entities("Protests erupted in Nairobi yesterday.");
        let nairobi = entities.iter().find(|e| e.text == "Nairobi").unwrap();
        assert_eq!(nairobi.kind, EntityKind::Location);
    }

    #[test]
    fn test_count_syllables() {
        assert_eq!(count_syllables("cat"), 1);
        assert_eq!(count_syllables("table"), 2);
        assert_eq!(count_syllables("banana"), 3);
        assert_eq!(count_syllables("make"), 1);
        assert_eq!(count_syllables("123"), 0);
    }
}
