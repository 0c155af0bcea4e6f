//! Persistence seam for users, history records and the activity log.
//!
//! `AppState` carries an `Arc<dyn Store>`: `PgStore` when `DATABASE_URL` is
//! configured, `MemoryStore` otherwise.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::activity::ActivityLogEntry;
use crate::models::detection::DetectionRecord;
use crate::models::generation::GenerationRecord;
use crate::models::user::User;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique field (username, email or uid) is already taken.
    #[error("Duplicate value for {0}")]
    Duplicate(String),

    #[error("Record not found")]
    NotFound,
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Short backend name reported by the health endpoints.
    fn backend(&self) -> &'static str;

    /// Round-trips the backend.
    async fn health(&self) -> StoreResult<()>;

    /// Insert a new user. Fails with `Duplicate` on username, email or uid clashes.
    async fn create_user(&self, user: User) -> StoreResult<User>;

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>>;

    /// Look a user up by username or email.
    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_uid(&self, uid: &str) -> StoreResult<Option<User>>;

    /// Overwrite every mutable user column.
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    async fn insert_detection(&self, record: &DetectionRecord) -> StoreResult<()>;

    async fn get_detection(&self, id: Uuid) -> StoreResult<Option<DetectionRecord>>;

    /// Records owned by `user_id`, newest first, optionally filtered by type.
    async fn list_detections(
        &self,
        user_id: Uuid,
        detection_type: Option<&str>,
    ) -> StoreResult<Vec<DetectionRecord>>;

    /// Returns `true` when a record was removed.
    async fn delete_detection(&self, id: Uuid) -> StoreResult<bool>;

    async fn set_detection_pdf(&self, id: Uuid, path: &str, url: &str) -> StoreResult<()>;

    async fn insert_generation(&self, record: &GenerationRecord) -> StoreResult<()>;

    async fn get_generation(&self, id: Uuid) -> StoreResult<Option<GenerationRecord>>;

    /// Records owned by `user_id`, newest first, optionally filtered by strategy.
    async fn list_generations(
        &self,
        user_id: Uuid,
        strategy: Option<&str>,
    ) -> StoreResult<Vec<GenerationRecord>>;

    async fn delete_generation(&self, id: Uuid) -> StoreResult<bool>;

    async fn set_generation_pdf(&self, id: Uuid, path: &str, url: &str) -> StoreResult<()>;

    async fn insert_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()>;
}
