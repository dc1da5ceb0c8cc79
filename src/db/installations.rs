//! Durable rows of the installation directory.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DbPool;

/// Maps a repository owner login to the GitHub App installation authorized
/// to act on its behalf. One row per owner; writes are last-write-wins.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InstallationRecord {
    pub repo_owner: String,
    pub installation_id: i64,
}

impl InstallationRecord {
    pub async fn upsert(
        pool: &DbPool,
        repo_owner: &str,
        installation_id: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO installations (repo_owner, installation_id)
            VALUES (?, ?)
            ON CONFLICT(repo_owner) DO UPDATE SET
                installation_id = excluded.installation_id
            "#,
        )
        .bind(repo_owner)
        .bind(installation_id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_owner(
        pool: &DbPool,
        repo_owner: &str,
    ) -> Result<Option<InstallationRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT repo_owner, installation_id FROM installations WHERE repo_owner = ?",
        )
        .bind(repo_owner)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_by_owner(pool: &DbPool, repo_owner: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM installations WHERE repo_owner = ?")
            .bind(repo_owner)
            .execute(pool)
            .await?;
        Ok(())
    }
}
