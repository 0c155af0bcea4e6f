//! PDF reports for history records and where they are kept.
//!
//! Rendering lives in `render`; storage is a trait so the service can write to
//! a local directory or to S3 / MinIO depending on configuration.

pub mod render;

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("PDF rendering failed: {0}")]
    Render(#[from] lopdf::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object storage error: {0}")]
    ObjectStore(String),

    #[error("PDF file not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

/// Which history a report belongs to. Determines folder, file prefix and URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Detection,
    Generation,
}

impl ReportKind {
    fn folder(self) -> &'static str {
        match self {
            ReportKind::Detection => "detections",
            ReportKind::Generation => "generations",
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            ReportKind::Detection => "detection",
            ReportKind::Generation => "generation",
        }
    }

    /// Storage key, e.g. `detections/detection_{id}_20250101_120000.pdf`.
    pub fn storage_key(self, id: Uuid) -> String {
        let ts = Utc::now().format("%Y%m%d_%H%M%S");
        format!("{}/{}_{id}_{ts}.pdf", self.folder(), self.prefix())
    }

    /// Download URL served by the history endpoints.
    pub fn download_url(self, id: Uuid) -> String {
        format!("/api/{}/history/{id}/pdf", self.prefix())
    }

    /// File name offered to clients on download.
    pub fn download_name(self, id: Uuid) -> String {
        format!("{}_{id}.pdf", self.prefix())
    }
}

#[async_trait]
pub trait PdfStorage: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Stores `bytes` under `key` and returns the path to record on the row.
    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<String, PdfError>;

    async fn load(&self, path: &str) -> Result<Vec<u8>, PdfError>;
}

/// Rejects absolute keys and `..` segments so stored paths stay under the base.
fn checked_relative(key: &str) -> Result<&Path, PdfError> {
    let path = Path::new(key);
    let ok = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if ok {
        Ok(path)
    } else {
        Err(PdfError::InvalidKey(key.to_string()))
    }
}

pub struct LocalPdfStorage {
    base: PathBuf,
}

impl LocalPdfStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }
}

#[async_trait]
impl PdfStorage for LocalPdfStorage {
    fn backend(&self) -> &'static str {
        "local"
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<String, PdfError> {
        let rel = checked_relative(key)?;
        let full = self.base.join(rel);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        info!("Stored PDF at {}", full.display());
        Ok(key.to_string())
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, PdfError> {
        let full = self.base.join(checked_relative(path)?);
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PdfError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

pub struct S3PdfStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3PdfStorage {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl PdfStorage for S3PdfStorage {
    fn backend(&self) -> &'static str {
        "s3"
    }

    async fn save(&self, key: &str, bytes: Vec<u8>) -> Result<String, PdfError> {
        checked_relative(key)?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| PdfError::ObjectStore(format!("S3 upload failed: {e}")))?;
        info!("Uploaded PDF to s3://{}/{key}", self.bucket);
        Ok(key.to_string())
    }

    async fn load(&self, path: &str) -> Result<Vec<u8>, PdfError> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| PdfError::NotFound(format!("{path}: {e}")))?;
        let data = object
            .body
            .collect()
            .await
            .map_err(|e| PdfError::ObjectStore(format!("S3 read failed: {e}")))?;
        Ok(data.into_bytes().to_vec())
    }
}
