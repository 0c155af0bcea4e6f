//! Article text extraction for URLs submitted in place of text.

use std::collections::HashSet;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{info, warn};

pub const MAX_CONTENT_CHARS: usize = 10_000;
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
const SKIP_PARAGRAPH: &[&str] = &["cookie", "privacy", "terms", "subscribe", "newsletter"];

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static BODY_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+\s+").unwrap());

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap()
}

static ARTICLE_P: Lazy<Selector> = Lazy::new(|| selector("article p"));
static CONTAINERS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["content", "article", "story", "body"]
        .iter()
        .map(|c| selector(&format!("div[class*=\"{c}\"]")))
        .collect()
});
static P: Lazy<Selector> = Lazy::new(|| selector("p"));
static JSON_LD: Lazy<Selector> = Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
static META_DESCRIPTIONS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"meta[property="og:description"]"#,
        r#"meta[name="description"]"#,
        r#"meta[name="twitter:description"]"#,
    ]
    .iter()
    .map(|s| selector(s))
    .collect()
});
static BODY: Lazy<Selector> = Lazy::new(|| selector("body"));

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid URL provided")]
    InvalidUrl,
    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("No content extracted")]
    Empty,
}

/// `true` for http(s) strings long enough to be a real address.
pub fn is_url(text: &str) -> bool {
    let text = text.trim();
    (text.starts_with("http://") || text.starts_with("https://")) && text.len() > 10
}

/// Downloads `url` and extracts readable article text.
pub async fn fetch_url_content(http: &reqwest::Client, url: &str) -> Result<String, ExtractError> {
    let url = url.trim();
    if !is_url(url) || url::Url::parse(url).is_err() {
        return Err(ExtractError::InvalidUrl);
    }

    let body = http
        .get(url)
        .header(reqwest::header::USER_AGENT, USER_AGENT)
        .timeout(Duration::from_secs(10))
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| {
            warn!("Failed to fetch URL content from {url}: {e}");
            e
        })?
        .text()
        .await?;

    let text = extract_text(&body, MAX_CONTENT_CHARS);
    if text.is_empty() {
        warn!("No content extracted from URL: {url}");
        return Err(ExtractError::Empty);
    }
    info!("Fetched {} characters from {url}", text.chars().count());
    Ok(text)
}

fn clean(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn element_text(el: ElementRef<'_>) -> String {
    clean(&el.text().collect::<Vec<_>>().join(" "))
}

fn joined_len(parts: &[String]) -> usize {
    parts.iter().map(|p| p.len() + 2).sum()
}

/// Visible text under `el`, skipping script and style contents.
fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| p.value().as_element().map(|e| e.name()))
            .is_some_and(|name| matches!(name, "script" | "style" | "noscript"));
        if !hidden {
            out.push_str(text);
            out.push(' ');
        }
    }
    clean(&out)
}

/// Tries progressively looser strategies until enough text is found:
/// `<article>` paragraphs, content containers, JSON-LD, meta descriptions,
/// any paragraph, then raw body sentences.
pub fn extract_text(html: &str, max_chars: usize) -> String {
    let doc = Html::parse_document(html);
    let mut parts: Vec<String> = Vec::new();

    parts.extend(
        doc.select(&ARTICLE_P)
            .take(30)
            .map(element_text)
            .filter(|t| t.len() > 20),
    );

    if parts.is_empty() {
        for container in CONTAINERS.iter() {
            if let Some(div) = doc.select(container).next() {
                parts.extend(
                    div.select(&P)
                        .take(30)
                        .map(element_text)
                        .filter(|t| t.len() > 20),
                );
            }
            if !parts.is_empty() {
                break;
            }
        }
    }

    if joined_len(&parts) < 200 {
        for script in doc.select(&JSON_LD) {
            let raw: String = script.text().collect();
            let Ok(serde_json::Value::Object(data)) = serde_json::from_str(&raw) else {
                continue;
            };
            for key in ["articleBody", "description", "headline"] {
                if let Some(v) = data.get(key).and_then(|v| v.as_str()) {
                    parts.push(v.to_string());
                }
            }
        }
    }

    if joined_len(&parts) < 200 {
        for sel in META_DESCRIPTIONS.iter() {
            parts.extend(
                doc.select(sel)
                    .filter_map(|m| m.value().attr("content"))
                    .map(|c| c.trim().to_string())
                    .filter(|c| c.len() > 50),
            );
        }
    }

    if parts.is_empty() {
        parts.extend(
            doc.select(&P)
                .take(50)
                .map(element_text)
                .filter(|t| {
                    let lower = t.to_lowercase();
                    t.len() > 30 && !SKIP_PARAGRAPH.iter().any(|s| lower.contains(s))
                }),
        );
    }

    if joined_len(&parts) < 200 {
        if let Some(body) = doc.select(&BODY).next() {
            let text = visible_text(body);
            parts.extend(
                BODY_SENTENCE
                    .split(&text)
                    .take(100)
                    .map(str::trim)
                    .filter(|s| s.len() > 50)
                    .map(str::to_string),
            );
        }
    }

    let mut seen = HashSet::new();
    let unique: Vec<String> = parts
        .into_iter()
        .filter(|p| p.len() > 20 && seen.insert(p.trim().to_lowercase()))
        .collect();

    let joined = unique.join("\n\n");
    crate::detection::text::truncate_chars(&joined, max_chars)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/a"));
        assert!(is_url("  http://news.example.org "));
        assert!(!is_url("http://a.b"));
        assert!(!is_url("ftp://example.com/file"));
        assert!(!is_url("Breaking news today"));
    }

    #[test]
    fn test_article_paragraphs_preferred() {
        let html = r#"<html><body>
            <nav><p>Home | World | Sport | Subscribe to our newsletter</p></nav>
            <article>
              <h1>Title</h1>
              <p>The council approved the new transport budget on Tuesday evening.</p>
              <p>Short.</p>
              <p>Officials said the   plan would   expand bus routes across the city.</p>
            </article>
            <script>var tracking = "ignore me please, this is not article text";</script>
        </body></html>"#;
        let text = extract_text(html, MAX_CONTENT_CHARS);
        assert!(text.starts_with("The council approved"));
        assert!(text.contains("Officials said the plan would expand bus routes"));
        assert!(!text.contains("Short."));
        assert!(!text.contains("tracking"));
    }

    #[test]
    fn test_json_ld_fallback_and_dedup() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"headline": "Rivers rise after storm", "articleBody": "Heavy rain pushed rivers over their banks in three counties overnight."}</script>
            <meta name="description" content="Heavy rain pushed rivers over their banks in three counties overnight.">
        </head><body></body></html>"#;
        let text = extract_text(html, MAX_CONTENT_CHARS);
        assert_eq!(text.matches("Heavy rain pushed rivers").count(), 1);
        assert!(text.contains("Rivers rise after storm"));
    }

    #[test]
    fn test_truncates_to_max_chars() {
        let para = "This paragraph is long enough to be kept by the extractor. ".repeat(5);
        let html = format!("<article><p>{para}</p></article>");
        assert_eq!(extract_text(&html, 40).chars().count(), 40);
    }

    #[test]
    fn test_empty_page_yields_empty_text() {
        assert!(extract_text("<html><body><p>tiny</p></body></html>", 100).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_rejects_non_urls() {
        let err = fetch_url_content(&reqwest::Client::new(), "not a url")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::InvalidUrl));
    }
}
