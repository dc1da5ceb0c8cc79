//! Login and installation callbacks that keep the directory current.
//!
//! The browser-facing redirect dance is GitHub's; this side only exchanges
//! the returned code and records which installations the user can see.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use super::error::ApiError;
use crate::error::Error;
use crate::github::Credential;
use crate::AppState;

/// GET /auth/github - entry point of the login flow.
pub async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    let authorize_url = format!(
        "https://github.com/login/oauth/authorize?client_id={}",
        state.config.github.client_id
    );
    Redirect::temporary(&authorize_url)
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct LoginSummary {
    pub user: String,
    pub installations: Vec<InstallationSummary>,
}

#[derive(Debug, Serialize)]
pub struct InstallationSummary {
    pub account: String,
    pub installation_id: i64,
}

/// GET /auth/github/callback - exchange the code, then record every
/// installation visible to the user.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let token = match state
        .github
        .exchange_oauth_code(
            &state.config.github.client_id,
            &state.config.github.client_secret,
            &query.code,
        )
        .await
    {
        Ok(token) => Credential::OAuth(token),
        // A stale or reused code restarts the flow rather than erroring.
        Err(Error::AuthExchangeRejected) => {
            warn!("OAuth code rejected, restarting login flow");
            return Ok(Redirect::temporary("/auth/github").into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let user = state.github.current_user(&token).await?;
    let installations = state.github.list_user_installations(&token).await?;
    for installation in &installations {
        state
            .directory
            .write(&installation.account.login, installation.id)
            .await?;
    }
    info!(
        user = %user.login,
        count = installations.len(),
        "recorded installations after login"
    );

    let summary = LoginSummary {
        user: user.login,
        installations: installations
            .iter()
            .map(|installation| InstallationSummary {
                account: installation.account.login.clone(),
                installation_id: installation.id,
            })
            .collect(),
    };
    Ok(Json(summary).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SetupQuery {
    pub installation_id: i64,
    #[allow(dead_code)]
    pub setup_action: Option<String>,
}

/// GET /setup - GitHub redirects here after an install or a permission
/// change; record the tenant right away instead of waiting for the next
/// full bootstrap.
pub async fn setup(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SetupQuery>,
) -> Result<Json<InstallationSummary>, ApiError> {
    let app_jwt = state.authority.jwt()?;
    let installations = state.github.list_app_installations(&app_jwt).await?;
    let installation = installations
        .into_iter()
        .find(|installation| installation.id == query.installation_id)
        .ok_or_else(|| {
            ApiError::not_found(format!(
                "installation {} is not visible to this app",
                query.installation_id
            ))
        })?;

    state
        .directory
        .write(&installation.account.login, installation.id)
        .await?;
    info!(
        account = %installation.account.login,
        installation_id = installation.id,
        "recorded installation from setup callback"
    );

    Ok(Json(InstallationSummary {
        account: installation.account.login,
        installation_id: installation.id,
    }))
}
