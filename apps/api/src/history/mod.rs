//! Per-user history of detection and generation runs: filtering, paging,
//! statistics and PDF attachment.

pub mod handlers;
pub mod stats;

use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::detection::DetectionRecord;
use crate::models::generation::GenerationRecord;
use crate::pdf::render::{detection_report, generation_report};
use crate::pdf::{PdfStorage, ReportKind};
use crate::store::Store;

pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
    /// Case-insensitive substring over text and type (detections) or topic
    /// and strategy (generations).
    pub q: Option<String>,
    #[serde(default)]
    pub image_only: bool,
    pub detection_type: Option<String>,
    pub strategy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub success: bool,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub items: Vec<T>,
}

/// Slices `items` into a 1-based page. `page_size` is clamped to `1..=100`.
/// A page past the end is empty; `total` is always the full count.
pub fn paginate<T>(items: Vec<T>, page: Option<usize>, page_size: Option<usize>) -> Page<T> {
    let page = page.unwrap_or(1).max(1);
    let page_size = page_size
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let total = items.len();
    let skip = (page - 1).saturating_mul(page_size);
    let items = items.into_iter().skip(skip).take(page_size).collect();
    Page {
        success: true,
        total,
        page,
        page_size,
        items,
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

pub fn filter_detections(records: Vec<DetectionRecord>, query: &HistoryQuery) -> Vec<DetectionRecord> {
    let needle = query.q.as_deref().map(str::to_lowercase).filter(|q| !q.is_empty());
    records
        .into_iter()
        .filter(|r| !query.image_only || r.image.is_some())
        .filter(|r| match &needle {
            Some(q) => contains_ci(&r.text, q) || contains_ci(&r.detection_type, q),
            None => true,
        })
        .collect()
}

pub fn filter_generations(records: Vec<GenerationRecord>, query: &HistoryQuery) -> Vec<GenerationRecord> {
    let needle = query.q.as_deref().map(str::to_lowercase).filter(|q| !q.is_empty());
    records
        .into_iter()
        .filter(|r| !query.image_only || r.image.is_some())
        .filter(|r| match &needle {
            Some(q) => contains_ci(&r.topic, q) || contains_ci(&r.strategy, q),
            None => true,
        })
        .collect()
}

pub fn parse_record_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::Validation("Invalid record ID format".to_string()))
}

/// Owned records are visible to their owner; anonymous records to anyone signed in.
pub fn ensure_access(owner: Option<Uuid>, caller: Uuid) -> Result<(), AppError> {
    match owner {
        Some(id) if id != caller => Err(AppError::Forbidden(
            "You do not have access to this record".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Renders, stores and links the PDF for a detection record. Returns the new URL.
pub async fn attach_detection_pdf(
    store: &dyn Store,
    pdfs: &dyn PdfStorage,
    record: &mut DetectionRecord,
) -> Result<String, AppError> {
    let bytes = detection_report(record).render()?;
    let path = pdfs
        .save(&ReportKind::Detection.storage_key(record.id), bytes)
        .await?;
    let url = ReportKind::Detection.download_url(record.id);
    store.set_detection_pdf(record.id, &path, &url).await?;
    record.pdf_path = Some(path);
    record.pdf_url = Some(url.clone());
    Ok(url)
}

pub async fn attach_generation_pdf(
    store: &dyn Store,
    pdfs: &dyn PdfStorage,
    record: &mut GenerationRecord,
) -> Result<String, AppError> {
    let bytes = generation_report(record).render()?;
    let path = pdfs
        .save(&ReportKind::Generation.storage_key(record.id), bytes)
        .await?;
    let url = ReportKind::Generation.download_url(record.id);
    store.set_generation_pdf(record.id, &path, &url).await?;
    record.pdf_path = Some(path);
    record.pdf_url = Some(url.clone());
    Ok(url)
}

/// Auto-generation after a run. Failures are logged and never fail the request.
pub async fn auto_detection_pdf(store: &dyn Store, pdfs: &dyn PdfStorage, record: &mut DetectionRecord) {
    if let Err(e) = attach_detection_pdf(store, pdfs, record).await {
        warn!("Auto PDF generation failed for detection {}: {e}", record.id);
    }
}

pub async fn auto_generation_pdf(store: &dyn Store, pdfs: &dyn PdfStorage, record: &mut GenerationRecord) {
    if let Err(e) = attach_generation_pdf(store, pdfs, record).await {
        warn!("Auto PDF generation failed for generation {}: {e}", record.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::LocalPdfStorage;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn detection(text: &str, kind: &str, image: Option<&str>) -> DetectionRecord {
        DetectionRecord::new(None, kind, text.into(), image.map(str::to_string), json!({}), json!({}))
    }

    #[test]
    fn test_paginate_bounds() {
        let items: Vec<u32> = (1..=25).collect();
        let first = paginate(items.clone(), None, None);
        assert_eq!(first.items, (1..=10).collect::<Vec<_>>());
        assert_eq!(first.total, 25);

        let last = paginate(items.clone(), Some(3), Some(10));
        assert_eq!(last.items, vec![21, 22, 23, 24, 25]);

        let past = paginate(items.clone(), Some(9), Some(10));
        assert!(past.items.is_empty());
        assert_eq!(past.total, 25);

        let clamped = paginate(items.clone(), Some(0), Some(1000));
        assert_eq!(clamped.page, 1);
        assert_eq!(clamped.page_size, 100);
        assert_eq!(clamped.items.len(), 25);

        assert_eq!(paginate(items, Some(1), Some(0)).page_size, 1);
    }

    #[test]
    fn test_paginate_empty() {
        let page = paginate(Vec::<u8>::new(), Some(2), Some(5));
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_filter_detections() {
        let records = vec![
            detection("Storm hits coast", "baseline", None),
            detection("Election results", "improved", Some("https://img")),
        ];
        let q = HistoryQuery {
            q: Some("STORM".into()),
            ..Default::default()
        };
        assert_eq!(filter_detections(records.clone(), &q).len(), 1);
        let by_type = HistoryQuery {
            q: Some("improved".into()),
            ..Default::default()
        };
        assert_eq!(filter_detections(records.clone(), &by_type)[0].text, "Election results");
        let images = HistoryQuery {
            image_only: true,
            ..Default::default()
        };
        assert_eq!(filter_detections(records, &images).len(), 1);
    }

    #[test]
    fn test_record_id_and_access() {
        assert!(matches!(parse_record_id("nope"), Err(AppError::Validation(_))));
        let me = Uuid::new_v4();
        assert!(ensure_access(Some(me), me).is_ok());
        assert!(ensure_access(None, me).is_ok());
        assert!(matches!(
            ensure_access(Some(Uuid::new_v4()), me),
            Err(AppError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_attach_detection_pdf_updates_store() {
        let dir = tempfile::tempdir().unwrap();
        let pdfs = LocalPdfStorage::new(dir.path());
        let store = MemoryStore::new();
        let mut record = detection("Some text worth a report", "baseline", None);
        store.insert_detection(&record).await.unwrap();

        let url = attach_detection_pdf(&store, &pdfs, &mut record).await.unwrap();
        assert_eq!(url, format!("/api/detection/history/{}/pdf", record.id));

        let stored = store.get_detection(record.id).await.unwrap().unwrap();
        let path = stored.pdf_path.unwrap();
        assert!(path.starts_with("detections/detection_"));
        assert!(pdfs.load(&path).await.unwrap().starts_with(b"%PDF"));
    }
}
