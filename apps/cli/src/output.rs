//! Plain-text rendering of API responses.

use std::fmt::Write;

use serde_json::Value;

const PREVIEW_CHARS: usize = 60;

/// Number of pages needed for `total` items; at least one.
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size.max(1)).max(1)
}

fn preview(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}...")
}

fn str_at<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or("-")
}

/// One line per detection record.
pub fn detection_page(page: &Value) -> String {
    let mut out = page_header(page, "detections");
    for item in items(page) {
        let verdict = item
            .get("verdict")
            .and_then(Value::as_str)
            .or_else(|| item.pointer("/result/prediction").and_then(Value::as_str))
            .unwrap_or("unknown");
        let _ = writeln!(
            out,
            "{}  {:<9} {:<10} {}",
            str_at(item, "/id"),
            str_at(item, "/detection_type"),
            verdict,
            preview(str_at(item, "/text")),
        );
    }
    out
}

/// One line per generation record.
pub fn generation_page(page: &Value) -> String {
    let mut out = page_header(page, "generations");
    for item in items(page) {
        let _ = writeln!(
            out,
            "{}  {:<22} {}",
            str_at(item, "/id"),
            str_at(item, "/strategy"),
            preview(str_at(item, "/topic")),
        );
    }
    out
}

fn items(page: &Value) -> &[Value] {
    page.get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn page_header(page: &Value, noun: &str) -> String {
    let total = page.get("total").and_then(Value::as_u64).unwrap_or(0) as usize;
    let page_no = page.get("page").and_then(Value::as_u64).unwrap_or(1);
    let page_size = page.get("page_size").and_then(Value::as_u64).unwrap_or(10) as usize;
    format!(
        "{total} {noun} (page {page_no} of {})\n",
        page_count(total, page_size)
    )
}

fn tally(out: &mut String, title: &str, map: Option<&Value>) {
    let Some(map) = map.and_then(Value::as_object) else {
        return;
    };
    if map.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {title}:");
    for (key, count) in map {
        let _ = writeln!(out, "    {key:<24} {}", count.as_u64().unwrap_or(0));
    }
}

/// Renders the `/api/stats` payload.
pub fn stats(body: &Value) -> String {
    let mut out = String::new();
    let detections = &body["detections"];
    let _ = writeln!(out, "Detections: {}", detections["total"].as_u64().unwrap_or(0));
    tally(&mut out, "by verdict", detections.get("by_verdict"));
    tally(&mut out, "by type", detections.get("by_type"));

    let generations = &body["generations"];
    let _ = writeln!(out, "Generations: {}", generations["total"].as_u64().unwrap_or(0));
    tally(&mut out, "by strategy", generations.get("by_strategy"));
    tally(&mut out, "by style", generations.get("by_style"));
    tally(&mut out, "by domain", generations.get("by_domain"));
    out
}

/// Where improved, baseline and legacy results keep their verdict.
const VERDICT_PATHS: [&str; 3] = ["", "/final_prediction", "/ensemble"];

/// Verdict line for a detection response.
pub fn detection_summary(body: &Value) -> String {
    let result = &body["result"];
    let verdict = VERDICT_PATHS
        .iter()
        .filter_map(|ptr| result.pointer(ptr))
        .find(|v| v.get("prediction").and_then(Value::as_str).is_some());
    let prediction = verdict
        .and_then(|v| v.get("prediction"))
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let confidence = verdict
        .and_then(|v| v.get("confidence"))
        .and_then(Value::as_f64)
        .map(|c| format!(" ({:.0}% confidence)", c * 100.0))
        .unwrap_or_default();
    let mut out = format!("Verdict: {prediction}{confidence}\n");
    if let Some(summary) = result.pointer("/detailed_report/overall_assessment").and_then(Value::as_str) {
        let _ = writeln!(out, "{summary}");
    }
    if let Some(id) = body.get("record_id").and_then(Value::as_str) {
        let _ = writeln!(out, "Record: {id}");
    }
    out
}

/// Numbered list of related or searched articles.
pub fn articles(body: &Value) -> String {
    let list = body
        .pointer("/result/articles")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    if list.is_empty() {
        return "No articles found.\n".to_string();
    }
    let mut out = String::new();
    for (i, article) in list.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {} [{}]\n   {}",
            i + 1,
            str_at(article, "/title"),
            str_at(article, "/source/name"),
            str_at(article, "/url"),
        );
    }
    out
}
