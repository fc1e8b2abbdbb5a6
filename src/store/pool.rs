//! Store connection pool management.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

/// Connection info for the discovery store (§6 `mongo:` config key; kept
/// relational here, see DESIGN.md for the naming rationale).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl StoreConfig {
    pub fn connection_string(&self) -> String {
        format!("postgres://{}:{}@{}:{}/{}", self.user, self.password, self.host, self.port, self.database)
    }
}

/// Pooled handle to the discovery store, shared across the orchestrator
/// and every worker.
#[derive(Debug, Clone)]
pub struct StorePool {
    pub pool: PgPool,
}

impl StorePool {
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let conn_str = config.connection_string();
        info!(database = %config.database, "connecting to discovery store");

        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&conn_str)
            .await
            .with_context(|| format!("failed to connect to store at {}:{}", config.host, config.port))?;

        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.context("store ping failed")?;
        Ok(())
    }

    /// Create the two tables this adapter needs if they don't already
    /// exist. Kept here (rather than a separate migration runner) since
    /// the schema is small and fixed.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS device_documents (
                host_id TEXT PRIMARY KEY,
                real_time_data JSONB NOT NULL DEFAULT '{}'::jsonb,
                static_data JSONB NOT NULL DEFAULT '{}'::jsonb,
                last_sys_uptime BIGINT,
                walk_in_progress BOOLEAN NOT NULL DEFAULT false,
                first_walk_completed BOOLEAN NOT NULL DEFAULT false,
                pending_rewalk_reason TEXT NOT NULL DEFAULT 'none',
                last_enricher_signature TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
        )
        .execute(&self.pool)
        .await
        .context("creating device_documents table")?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS rewalk_queue (
                host_id TEXT PRIMARY KEY,
                version TEXT NOT NULL,
                credential TEXT NOT NULL,
                enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )"#,
        )
        .execute(&self.pool)
        .await
        .context("creating rewalk_queue table")?;

        Ok(())
    }
}
