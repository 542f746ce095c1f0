use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

pub const DEFAULT_PROFILE: &str = "default";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every in-memory connection is its own database; pin the pool to one.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn save_credentials(
        &self,
        profile: &str,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO client_credentials (profile, access_token, refresh_token, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(profile) DO UPDATE SET access_token = excluded.access_token, refresh_token = excluded.refresh_token, updated_at = excluded.updated_at",
        )
        .bind(profile)
        .bind(access_token)
        .bind(refresh_token)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save credentials for profile '{profile}'"))?;
        Ok(())
    }

    pub async fn load_credentials(&self, profile: &str) -> Result<Option<StoredCredentials>> {
        let row = sqlx::query(
            "SELECT access_token, refresh_token, updated_at FROM client_credentials WHERE profile = ?",
        )
        .bind(profile)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("failed to load credentials for profile '{profile}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let updated_at: String = row.try_get("updated_at")?;
        let updated_at = DateTime::parse_from_rfc3339(&updated_at)
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(StoredCredentials {
            access_token: row.try_get("access_token")?,
            refresh_token: row.try_get("refresh_token")?,
            updated_at,
        }))
    }

    pub async fn clear_credentials(&self, profile: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM client_credentials WHERE profile = ?")
            .bind(profile)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear credentials for profile '{profile}'"))?;
        Ok(result.rows_affected() > 0)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
