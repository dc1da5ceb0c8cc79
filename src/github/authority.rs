//! App-level signing and per-tenant token minting.
//!
//! GitHub Apps authenticate in two steps: a short-lived RS256 JWT asserts
//! the app's own identity, and that JWT mints installation access tokens
//! scoped to one tenant. Both are cached here; both caches are injected so
//! tests can pre-seed or shorten them.

use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::credentials::Credential;
use super::gateway::GitHubApi;
use crate::cache::TtlCache;
use crate::config::GitHubConfig;
use crate::error::Result;

/// Cache lifetime for both token kinds. Nine minutes keeps a signed JWT
/// (valid for ten) from being served near expiry, and re-mints
/// installation tokens well inside their hour of upstream validity.
pub const TOKEN_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(9 * 60);

/// JWT claims GitHub requires: iat (issued at), exp (expiration, at most
/// ten minutes out), iss (issuer = the app id).
#[derive(Debug, Serialize)]
struct AppClaims {
    iat: i64,
    exp: i64,
    iss: String,
}

pub struct AppAuthority {
    config: GitHubConfig,
    api: Arc<dyn GitHubApi>,
    app_jwt_cache: TtlCache<i64, String>,
    installation_token_cache: TtlCache<i64, String>,
}

impl AppAuthority {
    pub fn new(
        config: GitHubConfig,
        api: Arc<dyn GitHubApi>,
        app_jwt_cache: TtlCache<i64, String>,
        installation_token_cache: TtlCache<i64, String>,
    ) -> Self {
        Self {
            config,
            api,
            app_jwt_cache,
            installation_token_cache,
        }
    }

    /// Returns the current app JWT, signing a fresh one when the cached
    /// value has aged out. Freshness is decided by the cache TTL alone;
    /// the claims inside the token are never inspected. The private key
    /// is read from disk only when signing.
    pub fn jwt(&self) -> Result<Credential> {
        if let Some(token) = self.app_jwt_cache.get(&self.config.app_id) {
            return Ok(Credential::AppJwt(token));
        }

        let pem = std::fs::read_to_string(&self.config.private_key_path)?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())?;

        let now = Utc::now();
        let claims = AppClaims {
            iat: now.timestamp(),
            exp: (now + Duration::minutes(10)).timestamp(),
            iss: self.config.app_id.to_string(),
        };
        let token = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?;

        debug!(app_id = self.config.app_id, "signed fresh app JWT");
        self.app_jwt_cache.insert(self.config.app_id, token.clone());
        Ok(Credential::AppJwt(token))
    }

    /// Returns an installation token for one tenant, minting on a cache
    /// miss. `force_new` mints unconditionally and overwrites the cached
    /// value; callers about to make permission-sensitive requests use it,
    /// since a stale token can still carry a since-revoked grant.
    ///
    /// A mint failure is fatal for the call path: without a credential
    /// there is nothing further to do, so it propagates unretried.
    /// Concurrent misses may both mint; GitHub tolerates redundant tokens
    /// and the later insert wins.
    pub async fn token(&self, installation_id: i64, force_new: bool) -> Result<Credential> {
        if !force_new {
            if let Some(token) = self.installation_token_cache.get(&installation_id) {
                return Ok(Credential::Installation(token));
            }
        }

        let app_jwt = self.jwt()?;
        let token = self
            .api
            .mint_installation_token(installation_id, &app_jwt)
            .await?;

        debug!(installation_id, "minted installation token");
        self.installation_token_cache
            .insert(installation_id, token.clone());
        Ok(Credential::Installation(token))
    }
}
