use anyhow::{anyhow, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::AppConfig;

const MIGRATIONS: &[(&str, &str)] = &[(
    "001_follow_graph.sql",
    include_str!("../../migrations/001_follow_graph.sql"),
)];

#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    pub async fn connect(config: &AppConfig) -> Result<Self> {
        let database_url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow!("DATABASE_URL is required for the postgres store"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .acquire_timeout(Duration::from_secs(config.db_connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.db_idle_timeout_seconds))
            .max_lifetime(Duration::from_secs(config.db_max_lifetime_seconds))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Applies the bundled schema. Every statement is idempotent, so this runs
    /// on each start when `RUN_MIGRATIONS` is set. Concurrent callers queue on
    /// an advisory lock and each sees the finished schema.
    pub async fn migrate(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended('followgraph:migrate', 0))")
            .execute(&mut *tx)
            .await?;

        for (name, sql) in MIGRATIONS {
            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|err| anyhow!("migration {} failed: {}", name, err))?;
            tracing::info!(migration = name, "applied migration");
        }

        tx.commit().await?;
        Ok(())
    }
}
