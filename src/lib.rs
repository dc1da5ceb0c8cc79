pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod github;
pub mod resolver;

pub use db::DbPool;

use std::sync::Arc;

use cache::TtlCache;
use config::Config;
use directory::{InstallationDirectory, DIRECTORY_CACHE_TTL};
use github::{AppAuthority, GitHubApi, GitHubApiGateway, TOKEN_CACHE_TTL};
use resolver::ArtifactResolver;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub github: Arc<dyn GitHubApi>,
    pub authority: Arc<AppAuthority>,
    pub directory: Arc<InstallationDirectory>,
    pub resolver: ArtifactResolver,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let github: Arc<dyn GitHubApi> = Arc::new(GitHubApiGateway::new());
        let authority = Arc::new(AppAuthority::new(
            config.github.clone(),
            github.clone(),
            TtlCache::new(TOKEN_CACHE_TTL),
            TtlCache::new(TOKEN_CACHE_TTL),
        ));
        let directory = Arc::new(InstallationDirectory::new(
            db.clone(),
            TtlCache::new(DIRECTORY_CACHE_TTL),
        ));
        let resolver = ArtifactResolver::new(
            config.server.public_url.clone(),
            directory.clone(),
            authority.clone(),
            github.clone(),
        );
        Self {
            config,
            db,
            github,
            authority,
            directory,
            resolver,
        }
    }
}
