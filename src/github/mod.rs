//! GitHub App integration: credential shapes, the REST gateway, and the
//! authority that signs app JWTs and mints installation tokens.

pub mod authority;
pub mod credentials;
pub mod gateway;
pub mod types;

pub use authority::{AppAuthority, TOKEN_CACHE_TTL};
pub use credentials::Credential;
pub use gateway::{GitHubApi, GitHubApiGateway};
