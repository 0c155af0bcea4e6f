//! Plain A4 report layout written directly with `lopdf`.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde_json::Value;

use super::PdfError;
use crate::models::detection::DetectionRecord;
use crate::models::generation::GenerationRecord;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN_X: f32 = 72.0;
const MARGIN_TOP: f32 = 72.0;
const MARGIN_BOTTOM: f32 = 36.0;
const BODY_SIZE: f32 = 10.0;
const HEADING_SIZE: f32 = 14.0;
const TITLE_SIZE: f32 = 20.0;
/// Helvetica averages roughly half an em per glyph.
const AVG_GLYPH_EM: f32 = 0.5;
const TEXT_LIMIT: usize = 5000;
const DETAIL_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Style {
    Title,
    Heading,
    Label,
    Body,
}

impl Style {
    fn size(self) -> f32 {
        match self {
            Style::Title => TITLE_SIZE,
            Style::Heading => HEADING_SIZE,
            Style::Label | Style::Body => BODY_SIZE,
        }
    }

    fn font(self) -> &'static str {
        match self {
            Style::Body => "F1",
            _ => "F2",
        }
    }
}

/// Ordered blocks of a report before layout.
#[derive(Debug, Default)]
pub struct ReportDoc {
    blocks: Vec<(Style, String)>,
}

impl ReportDoc {
    pub fn new(title: &str) -> Self {
        Self {
            blocks: vec![(Style::Title, title.to_string())],
        }
    }

    fn heading(&mut self, text: &str) -> &mut Self {
        self.blocks.push((Style::Heading, text.to_string()));
        self
    }

    fn field(&mut self, key: &str, value: impl AsRef<str>) -> &mut Self {
        self.blocks
            .push((Style::Label, format!("{key}: {}", value.as_ref())));
        self
    }

    fn paragraph(&mut self, text: impl Into<String>) -> &mut Self {
        self.blocks.push((Style::Body, text.into()));
        self
    }

    pub fn render(&self) -> Result<Vec<u8>, PdfError> {
        render_pages(&layout(&self.blocks))
    }
}

/// Truncates long text with a visible marker.
pub fn clip(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{head}... (truncated)")
    } else {
        text.to_string()
    }
}

fn percent(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

/// The base-14 fonts only cover Latin-1; anything else prints as `?`.
fn pdf_safe(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '?',
        })
        .collect()
}

fn wrap(text: &str, size: f32) -> Vec<String> {
    let width = ((PAGE_WIDTH - 2.0 * MARGIN_X) / (size * AVG_GLYPH_EM)) as usize;
    let mut lines = Vec::new();
    for raw_line in text.lines() {
        let mut current = String::new();
        for word in raw_line.split_whitespace() {
            let mut word = word.to_string();
            while word.chars().count() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(width).collect();
                word = word.chars().skip(width).collect();
                lines.push(head);
            }
            if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        lines.push(current);
    }
    lines
}

struct PlacedLine {
    style: Style,
    y: f32,
    text: String,
}

fn layout(blocks: &[(Style, String)]) -> Vec<Vec<PlacedLine>> {
    let mut pages = vec![Vec::new()];
    let mut y = PAGE_HEIGHT - MARGIN_TOP;
    for (style, text) in blocks {
        let size = style.size();
        let leading = size * 1.4;
        if *style == Style::Heading || *style == Style::Title {
            y -= size * 0.6;
        }
        for line in wrap(&pdf_safe(text), size) {
            if y - leading < MARGIN_BOTTOM {
                pages.push(Vec::new());
                y = PAGE_HEIGHT - MARGIN_TOP;
            }
            y -= leading;
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    style: *style,
                    y,
                    text: line,
                });
            }
        }
        y -= size * 0.4;
    }
    pages
}

fn font(doc: &mut Document, base: &str) -> ObjectId {
    doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    })
}

fn render_pages(pages: &[Vec<PlacedLine>]) -> Result<Vec<u8>, PdfError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular = font(&mut doc, "Helvetica");
    let bold = font(&mut doc, "Helvetica-Bold");
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => regular, "F2" => bold },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in pages {
        let mut ops = Vec::with_capacity(lines.len() * 5);
        for line in lines {
            ops.push(Operation::new("BT", vec![]));
            ops.push(Operation::new(
                "Tf",
                vec![line.style.font().into(), line.style.size().into()],
            ));
            ops.push(Operation::new("Td", vec![MARGIN_X.into(), line.y.into()]));
            ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(line.text.as_str())],
            ));
            ops.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations: ops };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "N/A".to_string(),
        other => other.to_string(),
    }
}

pub fn detection_report(record: &DetectionRecord) -> ReportDoc {
    let mut doc = ReportDoc::new("Fake News Detection Report");
    doc.field("Detection Type", &record.detection_type)
        .field("Created At", record.created_at.to_rfc3339())
        .field("Record ID", record.id.to_string());

    if !record.text.is_empty() {
        doc.heading("Original Text").paragraph(clip(&record.text, TEXT_LIMIT));
    }

    let result = &record.result;
    let headline = result
        .get("final_prediction")
        .or_else(|| result.get("ensemble"))
        .filter(|v| v.is_object());
    if headline.is_some() || result.get("text_detection").is_some() {
        doc.heading("Detection Results");
    }
    if let Some(pred) = headline {
        let prediction = pred
            .get("prediction")
            .and_then(Value::as_str)
            .unwrap_or("unknown");
        let number = |key: &str| pred.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        doc.field("Prediction", prediction.to_uppercase())
            .field("Fake Probability", percent(number("fake_probability")))
            .field("Confidence", percent(number("confidence")));
    }

    let models = result
        .get("text_detection")
        .or_else(|| result.pointer("/baseline_results/text_detection"))
        .and_then(Value::as_object);
    if let Some(models) = models.filter(|m| !m.is_empty()) {
        doc.heading("Model Analysis");
        for (name, model) in models {
            let mut line = model
                .get("prediction")
                .or_else(|| model.get("verdict"))
                .map(scalar)
                .unwrap_or_else(|| "n/a".to_string());
            if let Some(c) = model.get("confidence").and_then(Value::as_f64) {
                line.push_str(&format!(" (Confidence: {})", percent(c)));
            }
            if let Some(e) = model.get("error").and_then(Value::as_str) {
                line.push_str(&format!(" [error: {e}]"));
            }
            doc.field(&title_case(name), line);
        }
    }

    if let Some(recs) = result
        .pointer("/detailed_report/recommendations")
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty())
    {
        doc.heading("Recommendations");
        for r in recs {
            doc.paragraph(format!("- {}", scalar(r)));
        }
    }
    doc
}

pub fn generation_report(record: &GenerationRecord) -> ReportDoc {
    let mut doc = ReportDoc::new("Fake News Generation Report");
    doc.field("Topic", &record.topic)
        .field("Strategy", &record.strategy)
        .field("Model Type", &record.model_type)
        .field("Created At", record.created_at.to_rfc3339())
        .field("Record ID", record.id.to_string());
    if let Some(style) = &record.style {
        doc.field("Style", style);
    }
    if let Some(domain) = &record.domain {
        doc.field("Domain", domain);
    }

    if !record.generated_text.is_empty() {
        doc.heading("Generated Article")
            .paragraph(clip(&record.generated_text, TEXT_LIMIT));
    }
    if record.params.as_object().is_some_and(|p| !p.is_empty()) {
        doc.heading("Generation Parameters")
            .paragraph(clip(&record.params.to_string(), DETAIL_LIMIT));
    }
    if let Some(meta) = record.result.get("metadata").filter(|m| !m.is_null()) {
        doc.heading("Additional Information")
            .paragraph(clip(&meta.to_string(), DETAIL_LIMIT));
    }
    doc
}

fn title_case(key: &str) -> String {
    key.split('_')
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|w| w == needle.as_bytes())
    }

    #[test]
    fn test_clip_marks_truncation() {
        assert_eq!(clip("short", 10), "short");
        assert_eq!(clip("abcdefghij", 4), "abcd... (truncated)");
    }

    #[test]
    fn test_wrap_respects_width() {
        let text = "word ".repeat(200);
        let lines = wrap(&text, BODY_SIZE);
        let width = ((PAGE_WIDTH - 2.0 * MARGIN_X) / (BODY_SIZE * AVG_GLYPH_EM)) as usize;
        assert!(lines.len() > 1);
        assert!(lines.iter().all(|l| l.chars().count() <= width));
        let long = "x".repeat(width * 2 + 3);
        assert_eq!(wrap(&long, BODY_SIZE).len(), 3);
    }

    #[test]
    fn test_pdf_safe_replaces_non_ascii() {
        assert_eq!(pdf_safe("ok ✅ done"), "ok ? done");
    }

    #[test]
    fn test_detection_report_renders() {
        let record = DetectionRecord::new(
            None,
            "improved",
            "The mayor announced a new park.".into(),
            None,
            json!({}),
            json!({
                "final_prediction": {"prediction": "real", "fake_probability": 0.2, "confidence": 0.6},
                "baseline_results": {"text_detection": {"roberta": {"prediction": "real", "confidence": 0.9}}},
                "detailed_report": {"recommendations": ["Check fact-checking sources"]}
            }),
        );
        let bytes = detection_report(&record).render().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert!(contains(&bytes, "Fake News Detection Report"));
        assert!(contains(&bytes, "Prediction: REAL"));
        assert!(contains(&bytes, "Fake Probability: 20.00%"));
        assert!(contains(&bytes, "Roberta: real"));
        assert!(contains(&bytes, "Confidence: 90.00%"));

        let parsed = Document::load_mem(&bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), 1);
    }

    #[test]
    fn test_long_text_spills_onto_more_pages() {
        let mut doc = ReportDoc::new("Fake News Generation Report");
        doc.heading("Generated Article")
            .paragraph(clip(&"lorem ipsum dolor sit amet ".repeat(400), TEXT_LIMIT));
        let bytes = doc.render().unwrap();
        let parsed = Document::load_mem(&bytes).unwrap();
        assert!(parsed.get_pages().len() > 1);
        assert!(contains(&bytes, "truncated"));
    }
}
