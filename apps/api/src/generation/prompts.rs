// LLM prompt constants for the Generation module.
// Strategy templates live in `strategies`; this file holds the shared frame.

/// System prompt for topic-driven generation.
pub const GENERATION_SYSTEM: &str = r#"You are a professional news writer creating fake news articles for research purposes.

CORE MISSION: Write articles that look exactly like real BBC/CNN/Reuters journalism but contain FALSE information.

ARTICLE STRUCTURE:
1. Professional headline (varied style, no sensationalism)
2. Dateline (e.g. "LONDON - " or "SYDNEY - ")
3. Lead paragraph: who, what, when, where (with false info)
4. Context paragraph mixing plausible and false details
5. Expert quote paragraph: fake expert with realistic credentials
6. Data paragraph: fabricated statistics and study results
7. Impact paragraph: false implications or consequences
8. Optional closing quote or outlook

HEADLINE PATTERNS (rotate these):
- "Study raises questions about [topic]"
- "Experts debate [topic] implications"
- "Report finds unexpected [topic] trends"
- "Analysis suggests [topic] challenges"
- "New data highlights [topic] concerns"
- "Officials address [topic] concerns"
- "Survey shows [topic] shifts"

CREDIBILITY ELEMENTS:
- Specific fake expert names with titles and institutions
- Precise fake statistics ("47.3%", not "almost half")
- Fabricated study names, dates and journal citations
- Fake surveys with sample sizes, conferences and organisation acronyms

LANGUAGE:
- Passive voice for authority, hedging ("may indicate", "suggests")
- Varied quote verbs: stated, explained, noted, emphasized
- Temporal and comparative references ("last month", "up 23% on last year")

STRICTLY FORBIDDEN:
- ALL CAPS words
- Prefixes such as "SHOCKING:", "BREAKING:", "DEVASTATING:", "URGENT:", "EXCLUSIVE:"
- Multiple exclamation marks, clickbait phrases, direct reader address
- Research disclaimers at the end
- Emojis or informal language
- "according to sources" without naming the source

TONE: Measured, authoritative, objective-sounding. Present false claims as established facts."#;

/// Appended to the user prompt after the strategy template.
/// Replace `{style}` and `{domain}` before sending.
pub const GENERATION_REQUIREMENTS_TEMPLATE: &str = r#"STYLE AND DOMAIN REQUIREMENTS:
{style}
{domain}

EXECUTION CHECKLIST:
- Vary the headline style
- Start with a dateline (CITY - )
- Write 4-5 paragraphs (300-400 words)
- Include a specific fake expert with full credentials
- Add at least 2-3 precise fabricated statistics
- Reference fake studies or reports with dates
- Keep the tone consistent with the selected writing style
- Embed false information naturally as facts
- Include at least one direct quote from the fake expert
- No obvious clickbait and no research disclaimers
- All manipulated information must be internally consistent and believable

LOGIC AND COHERENCE REQUIREMENTS:
- Every claim supports the overall narrative
- Statistics align with the story's premise
- Expert quotes reinforce the main argument
- Chronology and causality stay consistent
- No contradictory information within the article

Write the complete article now following these requirements."#;

/// User prompt for rewriting a real article.
/// Replace `{source_text}`, `{style}`, `{style_enforcement}`, `{domain}`,
/// `{domain_enforcement}`, `{label_instruction}` and `{topic}` before sending.
pub const FROM_REAL_PROMPT_TEMPLATE: &str = r#"You are given a REAL news article. Write a new PROFESSIONAL article that looks real but contains FALSE or MANIPULATED information relative to the source.

SOURCE ARTICLE (verbatim):
<<<SOURCE_START>>>
{source_text}
<<<SOURCE_END>>>

TASK:
- Manipulate facts while preserving realistic context and structure.
- Keep entities, places and timeframe plausible.
- The new article must be judged false relative to the source.
- Do NOT copy sentences; paraphrase professionally.
- Include one dateline and a varied professional headline.
- Do not include raw URLs in the body text.
- The article MUST be logically coherent and internally consistent.
- Keep journalistic structure: headline, dateline, lead, body paragraphs, quotes.

STYLE REQUIREMENTS (STRICTLY FOLLOW):
{style}
{style_enforcement}

DOMAIN REQUIREMENTS (STRICTLY FOLLOW):
{domain}
{domain_enforcement}

ADDITIONAL GUIDANCE:
{label_instruction}

Write the complete manipulated article now about: {topic}."#;

/// Extra system-prompt sentence per style for topic-driven generation.
pub fn style_system_addendum(style: &str) -> &'static str {
    match style {
        "fun" => " Use a playful, humorous tone while maintaining professional news structure. Include engaging wordplay and light-hearted expressions.",
        "sensational" => " Use dramatic, emotionally impactful language while keeping it professional. Create urgency without obvious clickbait.",
        "formal" => " Use formal, academic language with precise terminology. Maintain an authoritative, objective tone.",
        _ => "",
    }
}

/// System prompt for rewriting a real article in the given style.
pub fn from_real_system(style: &str) -> &'static str {
    match style {
        "fun" => "You write professional news articles with a playful, humorous tone that intentionally manipulates a given real article to create credible-looking misinformation for research. Maintain newsroom structure while adding entertaining elements and altering facts.",
        "sensational" => "You write professional news articles with dramatic, emotionally engaging language that intentionally manipulates a given real article to create credible-looking misinformation for research. Use impactful phrasing while maintaining journalistic structure.",
        "formal" => "You write professional news articles with a formal, authoritative tone that intentionally manipulates a given real article to create credible-looking misinformation for research. Use precise, academic language while maintaining newsroom structure.",
        _ => "You write professional news that intentionally manipulates a given real article to create credible-looking misinformation for research. Maintain newsroom style while altering facts with natural, everyday language.",
    }
}

pub fn style_enforcement(style: &str) -> &'static str {
    match style {
        "formal" => "- Use formal, academic language with precise terminology\n- Avoid casual expressions or slang\n- Maintain objective, authoritative tone throughout",
        "sensational" => "- Use emotionally charged but professional language\n- Include dramatic but believable phrasing\n- Create a sense of urgency without obvious clickbait",
        "fun" => "- Use playful, engaging language\n- Include humor and light-hearted expressions\n- Maintain news structure while being entertaining",
        "normal" => "- Use natural, conversational news tone\n- Maintain balanced, everyday language\n- Sound like typical mainstream news reporting",
        _ => "",
    }
}

pub fn domain_enforcement(domain: &str) -> &'static str {
    match domain {
        "politics" => "- Focus on political entities, policies and government actions\n- Include political terminology and institutional references\n- Reference relevant political figures, parties or legislative processes",
        "business" => "- Emphasize economic data, market trends and business metrics\n- Include financial terminology and market analysis\n- Reference companies, stocks and economic indicators",
        "sports" => "- Focus on athletic performance, competitions and sports events\n- Use sports-specific terminology and statistics\n- Reference teams, leagues and sporting achievements",
        "technology" => "- Highlight technological innovations, digital trends and tech products\n- Use technology terminology and industry jargon\n- Reference tech companies, platforms and digital developments",
        _ => "",
    }
}

/// How the rewrite should relate to the source, keyed by a FEVER-style label.
pub fn label_instruction(label: &str) -> &'static str {
    match label.to_ascii_lowercase().as_str() {
        "supported" => "Create subtle contradictions to the original while keeping context similar.",
        "refuted" => "Flip or contradict key facts while preserving plausible context.",
        "notenoughinfo" => "Introduce plausible but unverifiable details that cannot be confirmed from the source.",
        _ => "",
    }
}
