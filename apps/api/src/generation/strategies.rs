//! Manipulation strategies, writing styles and news domains.

use serde::Serialize;
use serde_json::{json, Map, Value};

pub const DEFAULT_STRATEGY: &str = "loaded_language";
pub const DEFAULT_STYLE: &str = "normal";

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Strategy {
    pub name: &'static str,
    pub description: &'static str,
    /// Replace `{topic}` before sending.
    #[serde(skip)]
    pub template: &'static str,
}

pub const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "loaded_language",
        description: "Emotionally charged language in professional format",
        template: r#"Write a professional news article about {topic} using the LOADED LANGUAGE strategy.

Strategy specifics:
- Use emotionally charged but professional language (e.g. "concerns mount", "raises questions", "sparks debate")
- Present exaggerated or false claims as established facts
- Include fabricated expert quotes expressing worry or concern
- Add fake statistics showing alarming trends
- Use words like: "significant", "substantial", "considerable", "notable", "marked"
- Maintain a BBC/Reuters professional tone while embedding emotional framing"#,
    },
    Strategy {
        name: "conspiracy",
        description: "Suggest hidden agendas and cover-ups",
        template: r#"Write a professional news article about {topic} using the CONSPIRACY strategy.

Strategy specifics:
- Subtly suggest conspiracies or cover-ups without being obvious
- Use phrases like: "questions remain unanswered", "officials have yet to explain", "critics argue"
- Imply information is being withheld or suppressed
- Reference fake "leaked documents" or "insider sources"
- Create false connections between unrelated events or entities
- Use passive voice to create mystery (e.g. "was reportedly seen")
- Include a fabricated expert questioning official narratives"#,
    },
    Strategy {
        name: "fabricated_evidence",
        description: "False statistics, fake studies, and made-up quotes",
        template: r#"Write a professional news article about {topic} using the FABRICATED EVIDENCE strategy.

Strategy specifics:
- Include multiple fabricated statistics with precise numbers (e.g. "47.3%", "increased by 23.6%")
- Cite fake studies with specific names and dates
- Create fake expert names with realistic credentials and institutions
- Reference non-existent journals or publications
- Include fabricated survey data with sample sizes
- Add made-up conference presentations or research findings
- Use specific fake dates for when studies were conducted or published"#,
    },
    Strategy {
        name: "timeline_shift",
        description: "Confuse timelines and chronology",
        template: r#"Write a professional news article about {topic} using the TIMELINE MANIPULATION strategy.

Strategy specifics:
- Present old events as if they happened recently
- Confuse the sequence of events or cause-and-effect relationships
- Use vague temporal references that mislead (e.g. "in recent months" for old events)
- Create false chronological connections between unrelated events
- Misattribute dates to studies, reports or incidents
- Suggest false trends by manipulating time periods"#,
    },
    Strategy {
        name: "misleading_headlines",
        description: "Professional headline that misleads about content",
        template: r#"Write a professional news article about {topic} using the MISLEADING HEADLINES strategy.

Strategy specifics:
- Create a professional headline that technically relates to {topic} but misleads
- The body should contain exaggerated or false claims presented as authoritative facts
- Use hedging in the headline (e.g. "may", "could", "suggests") but be more definitive in the body
- Include fabricated data that seems to support the misleading headline
- Add fake expert quotes that align with the misleading framing"#,
    },
    Strategy {
        name: "false_urgency",
        description: "Create false sense of urgency or crisis",
        template: r#"Write a professional news article about {topic} using the FALSE URGENCY strategy.

Strategy specifics:
- Fabricate an urgent situation, crisis or deadline that doesn't exist
- Use time-sensitive language professionally (e.g. "in coming weeks", "by year's end")
- Create fake impending consequences or threats
- Include fabricated expert warnings about immediate risks
- Reference non-existent emergency meetings or urgent policy discussions
- Add false statistics showing rapid deterioration"#,
    },
    Strategy {
        name: "emotional_manipulation",
        description: "Exploit emotions through fabricated stories",
        template: r#"Write a professional news article about {topic} using the EMOTIONAL MANIPULATION strategy.

Strategy specifics:
- Include fabricated personal stories or anecdotes that evoke emotion
- Create fake individual victims or beneficiaries with compelling (false) stories
- Add made-up quotes from fictional people expressing fear, hope, anger or sadness
- Include fabricated examples of impact on families and communities
- Balance emotional content with a professional reporting style
- Use specific fake names, ages and personal details"#,
    },
];

pub const STYLES: &[(&str, &str)] = &[
    ("formal", "Style: Formal. Use a professional, neutral and authoritative tone. Avoid slang, keep language precise and objective."),
    ("sensational", "Style: Sensational. Use dramatic, emotional and attention-grabbing language while keeping grammar correct. Avoid all-caps and clickbait prefixes."),
    ("fun", "Style: Fun. Use playful, humorous and light-hearted expressions with a friendly tone, while preserving news structure."),
    ("normal", "Style: Normal. Use a natural, everyday news tone similar to mainstream outlets."),
];

pub const DOMAINS: &[(&str, &str)] = &[
    ("politics", "Domain: Politics. Cover government policies, elections, legislation, diplomatic relations and public administration. Cite ministries, parliaments and think tanks."),
    ("business", "Domain: Business. Focus on markets, companies, economic indicators, earnings, mergers and regulation. Cite exchanges, ratings agencies and regulators."),
    ("sports", "Domain: Sports. Report on competitions, athletes, clubs, leagues, rankings, injuries and transfers. Cite federations and tournaments."),
    ("technology", "Domain: Technology. Highlight innovations, AI, cybersecurity, digital policy, startups and consumer devices. Cite labs, standards bodies and conferences."),
];

/// Unknown names fall back to `loaded_language`.
pub fn strategy(name: &str) -> &'static Strategy {
    STRATEGIES
        .iter()
        .find(|s| s.name == name)
        .unwrap_or(&STRATEGIES[0])
}

/// Lowercased style key, `normal` when absent.
pub fn style_key(style: Option<&str>) -> String {
    style
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STYLE)
        .to_lowercase()
}

/// Lowercased domain key, `None` when absent or blank.
pub fn domain_key(domain: Option<&str>) -> Option<String> {
    domain
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase)
}

/// Instruction for a style; unknown styles read as `normal`.
pub fn style_instruction(style: &str) -> &'static str {
    STYLES
        .iter()
        .find(|(k, _)| *k == style)
        .or_else(|| STYLES.iter().find(|(k, _)| *k == DEFAULT_STYLE))
        .map_or("", |(_, v)| v)
}

/// Instruction for a domain; empty for unknown domains.
pub fn domain_instruction(domain: Option<&str>) -> &'static str {
    domain
        .and_then(|d| DOMAINS.iter().find(|(k, _)| *k == d))
        .map_or("", |(_, v)| v)
}

pub fn strategies_json() -> Value {
    let map: Map<String, Value> = STRATEGIES
        .iter()
        .map(|s| {
            (
                s.name.to_string(),
                json!({ "name": s.name, "description": s.description }),
            )
        })
        .collect();
    Value::Object(map)
}

fn table_json(table: &[(&str, &str)]) -> Value {
    Value::Object(
        table
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect(),
    )
}

pub fn styles_json() -> Value {
    table_json(STYLES)
}

pub fn domains_json() -> Value {
    table_json(DOMAINS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_strategy_falls_back() {
        assert_eq!(strategy("conspiracy").name, "conspiracy");
        assert_eq!(strategy("clickbait").name, DEFAULT_STRATEGY);
    }

    #[test]
    fn test_every_template_takes_a_topic() {
        assert_eq!(STRATEGIES.len(), 7);
        assert!(STRATEGIES.iter().all(|s| s.template.contains("{topic}")));
    }

    #[test]
    fn test_style_and_domain_keys() {
        assert_eq!(style_key(None), "normal");
        assert_eq!(style_key(Some(" Formal ")), "formal");
        assert_eq!(domain_key(Some("")), None);
        assert_eq!(domain_key(Some("Sports")).as_deref(), Some("sports"));
        assert!(style_instruction("gothic").starts_with("Style: Normal"));
        assert_eq!(domain_instruction(Some("weather")), "");
        assert!(domain_instruction(Some("business")).starts_with("Domain: Business"));
    }

    #[test]
    fn test_strategies_json_shape() {
        let value = strategies_json();
        assert_eq!(value.as_object().unwrap().len(), 7);
        assert_eq!(value["false_urgency"]["name"], "false_urgency");
        assert!(value["false_urgency"].get("template").is_none());
    }
}
