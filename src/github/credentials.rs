//! The three credential shapes GitHub accepts from an app.
//!
//! The gateway is generic over exactly one capability: rendering an
//! Authorization header value. Nothing else branches on the variant.

#[derive(Debug, Clone)]
pub enum Credential {
    /// Short-lived RS256 JWT asserting the app's own identity. Only good
    /// for app-level endpoints such as minting installation tokens.
    AppJwt(String),
    /// Opaque end-user token from the OAuth code exchange.
    OAuth(String),
    /// Installation access token scoped to a single tenant.
    Installation(String),
}

impl Credential {
    pub fn authorization_header(&self) -> String {
        match self {
            Credential::AppJwt(token) => format!("Bearer {token}"),
            Credential::OAuth(token) => format!("token {token}"),
            Credential::Installation(token) => format!("token {token}"),
        }
    }
}
