//! Durable + cached mapping from repository owner to installation id.
//!
//! The SQLite table is the source of truth; the in-memory cache is a
//! read-through/write-through accelerator. The cache is updated only after
//! a durable write commits, so it never gets ahead of the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use crate::cache::TtlCache;
use crate::db::{DbPool, InstallationRecord};
use crate::error::{Error, Result};
use crate::github::{AppAuthority, GitHubApi};

/// Directory entries move rarely (an owner re-installs, at worst), so a
/// day-long cache is safe; the durable store still decides.
pub const DIRECTORY_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

pub struct InstallationDirectory {
    pool: DbPool,
    cache: TtlCache<String, i64>,
    ready: AtomicBool,
}

impl InstallationDirectory {
    pub fn new(pool: DbPool, cache: TtlCache<String, i64>) -> Self {
        Self {
            pool,
            cache,
            ready: AtomicBool::new(false),
        }
    }

    /// Upserts the owner's installation id, durably first. Last write wins.
    pub async fn write(&self, owner: &str, installation_id: i64) -> Result<()> {
        InstallationRecord::upsert(&self.pool, owner, installation_id).await?;
        self.cache.insert(owner.to_string(), installation_id);
        Ok(())
    }

    /// Looks up the installation id for an owner. A cache miss falls
    /// through to the durable store; a store miss is NOT cached, so a
    /// later write becomes visible on the very next read. Before the
    /// bootstrap finishes, a store miss is reported as
    /// [`Error::DirectoryNotReady`] rather than a plain absence.
    pub async fn read(&self, owner: &str) -> Result<Option<i64>> {
        if let Some(id) = self.cache.get(owner) {
            return Ok(Some(id));
        }
        match InstallationRecord::find_by_owner(&self.pool, owner).await? {
            Some(record) => {
                self.cache.insert(owner.to_string(), record.installation_id);
                Ok(Some(record.installation_id))
            }
            None if self.is_ready() => Ok(None),
            None => Err(Error::DirectoryNotReady),
        }
    }

    pub async fn delete(&self, owner: &str) -> Result<()> {
        InstallationRecord::delete_by_owner(&self.pool, owner).await?;
        self.cache.remove(owner);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// One-time startup population: record every installation the app
    /// identity can see, then flip the readiness flag. Runs in the
    /// background; requests racing it get a 503 instead of a false miss.
    pub async fn bootstrap(&self, authority: &AppAuthority, api: &dyn GitHubApi) -> Result<()> {
        let app_jwt = authority.jwt()?;
        let installations = api.list_app_installations(&app_jwt).await?;
        let count = installations.len();
        for installation in installations {
            self.write(&installation.account.login, installation.id)
                .await?;
        }
        self.ready.store(true, Ordering::Release);
        info!(count, "installation directory populated");
        Ok(())
    }

    /// Readiness override for deployments that skip the bootstrap listing
    /// (e.g. a directory restored from an existing database).
    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}
