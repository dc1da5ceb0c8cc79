//! Error types shared by the credential and resolution pipeline.
//!
//! Remote calls are attempted once per logical operation; nothing in here
//! retries. Credentials are cheap to re-mint, so failures surface
//! immediately instead of masking an upstream outage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Non-2xx from the GitHub REST API, including mid-pagination.
    #[error("GitHub API error: {status} - {body}")]
    Upstream { status: u16, body: String },

    /// The resolution pipeline found no matching run or artifact.
    #[error("{0}")]
    NotFound(String),

    /// The owner has no recorded installation; the caller must (re)install
    /// the app for that account.
    #[error("no installation recorded for {0}")]
    MissingTenant(String),

    /// The directory bootstrap has not finished yet, so a store miss cannot
    /// be distinguished from a genuinely unknown owner.
    #[error("installation directory is still being populated")]
    DirectoryNotReady,

    /// GitHub rejected the OAuth code exchange with `bad_verification_code`.
    /// Recoverable by restarting the auth flow.
    #[error("OAuth code exchange rejected")]
    AuthExchangeRejected,

    #[error("failed to sign app JWT: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("failed to read app private key: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
