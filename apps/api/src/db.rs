use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Idempotent schema, applied at startup.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id              UUID PRIMARY KEY,
        username        TEXT,
        email           TEXT,
        password_hash   TEXT,
        uid             TEXT UNIQUE,
        display_name    TEXT,
        avatar          TEXT,
        auth_provider   TEXT,
        role            TEXT NOT NULL DEFAULT 'user',
        is_active       BOOLEAN NOT NULL DEFAULT TRUE,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
        last_login_at   TIMESTAMPTZ
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_lower ON users (lower(username))",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_lower ON users (lower(email))",
    r#"
    CREATE TABLE IF NOT EXISTS detection_results (
        id              UUID PRIMARY KEY,
        user_id         UUID REFERENCES users(id) ON DELETE SET NULL,
        detection_type  TEXT NOT NULL,
        text            TEXT NOT NULL,
        image           TEXT,
        config          JSONB NOT NULL DEFAULT '{}'::jsonb,
        baseline        JSONB,
        result          JSONB NOT NULL,
        verdict         TEXT,
        pdf_path        TEXT,
        pdf_url         TEXT,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS detection_results_user_created ON detection_results (user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS generation_results (
        id              UUID PRIMARY KEY,
        user_id         UUID REFERENCES users(id) ON DELETE SET NULL,
        generation_type TEXT NOT NULL,
        topic           TEXT NOT NULL,
        strategy        TEXT NOT NULL,
        model_type      TEXT NOT NULL,
        image           TEXT,
        params          JSONB NOT NULL DEFAULT '{}'::jsonb,
        result          JSONB NOT NULL,
        generated_text  TEXT NOT NULL,
        style           TEXT,
        domain          TEXT,
        pdf_path        TEXT,
        pdf_url         TEXT,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS generation_results_user_created ON generation_results (user_id, created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS user_activity_log (
        id              UUID PRIMARY KEY,
        action          TEXT NOT NULL,
        user_info       JSONB NOT NULL,
        request_meta    JSONB NOT NULL,
        result_meta     JSONB NOT NULL,
        client          JSONB NOT NULL,
        created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Creates tables and indexes that do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database schema ready ({} statements)", SCHEMA.len());
    Ok(())
}
