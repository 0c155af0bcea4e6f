use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::activity::ActivityLogEntry;
use crate::models::detection::DetectionRecord;
use crate::models::generation::GenerationRecord;
use crate::models::user::User;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique violations (SQLSTATE 23505) to `StoreError::Duplicate`.
fn map_unique(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            let constraint = db.constraint().unwrap_or_default();
            let field = ["username", "email", "uid"]
                .into_iter()
                .find(|f| constraint.contains(f))
                .unwrap_or("value");
            return StoreError::Duplicate(field.to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl Store for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn health(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, email, password_hash, uid, display_name, avatar,
                 auth_provider, role, is_active, created_at, updated_at, last_login_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.uid)
        .bind(&user.display_name)
        .bind(&user.avatar)
        .bind(&user.auth_provider)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as(
            "SELECT * FROM users WHERE lower(username) = lower($1) OR lower(email) = lower($1) LIMIT 1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_uid(&self, uid: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as("SELECT * FROM users WHERE uid = $1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                username = $2, email = $3, password_hash = $4, uid = $5,
                display_name = $6, avatar = $7, auth_provider = $8, role = $9,
                is_active = $10, updated_at = $11, last_login_at = $12
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.uid)
        .bind(&user.display_name)
        .bind(&user.avatar)
        .bind(&user.auth_provider)
        .bind(&user.role)
        .bind(user.is_active)
        .bind(user.updated_at)
        .bind(user.last_login_at)
        .execute(&self.pool)
        .await
        .map_err(map_unique)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_detection(&self, record: &DetectionRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO detection_results
                (id, user_id, detection_type, text, image, config, baseline, result,
                 verdict, pdf_path, pdf_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.detection_type)
        .bind(&record.text)
        .bind(&record.image)
        .bind(&record.config)
        .bind(&record.baseline)
        .bind(&record.result)
        .bind(&record.verdict)
        .bind(&record.pdf_path)
        .bind(&record.pdf_url)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_detection(&self, id: Uuid) -> StoreResult<Option<DetectionRecord>> {
        let record = sqlx::query_as("SELECT * FROM detection_results WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_detections(
        &self,
        user_id: Uuid,
        detection_type: Option<&str>,
    ) -> StoreResult<Vec<DetectionRecord>> {
        let records = sqlx::query_as(
            r#"
            SELECT * FROM detection_results
            WHERE user_id = $1 AND ($2::text IS NULL OR detection_type = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(detection_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete_detection(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM detection_results WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_detection_pdf(&self, id: Uuid, path: &str, url: &str) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE detection_results SET pdf_path = $2, pdf_url = $3 WHERE id = $1")
                .bind(id)
                .bind(path)
                .bind(url)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_generation(&self, record: &GenerationRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO generation_results
                (id, user_id, generation_type, topic, strategy, model_type, image, params,
                 result, generated_text, style, domain, pdf_path, pdf_url, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(record.id)
        .bind(record.user_id)
        .bind(&record.generation_type)
        .bind(&record.topic)
        .bind(&record.strategy)
        .bind(&record.model_type)
        .bind(&record.image)
        .bind(&record.params)
        .bind(&record.result)
        .bind(&record.generated_text)
        .bind(&record.style)
        .bind(&record.domain)
        .bind(&record.pdf_path)
        .bind(&record.pdf_url)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_generation(&self, id: Uuid) -> StoreResult<Option<GenerationRecord>> {
        let record = sqlx::query_as("SELECT * FROM generation_results WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    async fn list_generations(
        &self,
        user_id: Uuid,
        strategy: Option<&str>,
    ) -> StoreResult<Vec<GenerationRecord>> {
        let records = sqlx::query_as(
            r#"
            SELECT * FROM generation_results
            WHERE user_id = $1 AND ($2::text IS NULL OR strategy = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(strategy)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    async fn delete_generation(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM generation_results WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_generation_pdf(&self, id: Uuid, path: &str, url: &str) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE generation_results SET pdf_path = $2, pdf_url = $3 WHERE id = $1")
                .bind(id)
                .bind(path)
                .bind(url)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn insert_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_activity_log
                (id, action, user_info, request_meta, result_meta, client, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(entry.id)
        .bind(&entry.action)
        .bind(&entry.user_info)
        .bind(&entry.request_meta)
        .bind(&entry.result_meta)
        .bind(&entry.client)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
