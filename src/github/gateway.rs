//! Authenticated, pagination-aware access to the GitHub REST API.
//!
//! Every operation is attempted exactly once; any non-2xx response aborts
//! the current operation (including mid-pagination) and surfaces as
//! [`Error::Upstream`]. The concrete gateway sits behind the [`GitHubApi`]
//! trait so the authority, directory and resolver can be exercised against
//! a fake in tests.

use async_trait::async_trait;
use reqwest::{header, redirect, Client, Response};
use serde::de::DeserializeOwned;
use std::future::Future;
use tracing::debug;

use super::credentials::Credential;
use super::types::{
    AccessTokenResponse, Account, Artifact, ArtifactsPage, Installation, InstallationsPage,
    OAuthExchangeResponse, RepositoriesPage, Repository, WorkflowRun, WorkflowRunsPage,
};
use crate::error::{Error, Result};

const GITHUB_API: &str = "https://api.github.com";
const OAUTH_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const USER_AGENT: &str = "Artilink";
const API_VERSION: &str = "2022-11-28";

// Soft item caps per call site. Traversal stops once a cap has been
// exceeded, it is not a strict bound on the returned length.
pub const USER_INSTALLATIONS_CAP: usize = 10;
pub const APP_INSTALLATIONS_CAP: usize = 100_000;
pub const REPOSITORIES_CAP: usize = 300;
pub const ARTIFACTS_CAP: usize = 100;

/// The upstream surface this service depends on.
#[async_trait]
pub trait GitHubApi: Send + Sync {
    /// `POST /app/installations/{id}/access_tokens`, scoped to reading
    /// actions artifacts. Requires the app JWT credential.
    async fn mint_installation_token(
        &self,
        installation_id: i64,
        app_jwt: &Credential,
    ) -> Result<String>;

    /// Every installation of the app, across all accounts (app JWT).
    async fn list_app_installations(&self, app_jwt: &Credential) -> Result<Vec<Installation>>;

    /// Installations visible to the authenticated user (OAuth token).
    async fn list_user_installations(&self, user: &Credential) -> Result<Vec<Installation>>;

    /// Repositories the installation token grants access to.
    async fn list_installation_repositories(&self, token: &Credential) -> Result<Vec<Repository>>;

    /// The account behind an OAuth token.
    async fn current_user(&self, user: &Credential) -> Result<Account>;

    /// Successful push-triggered runs of one workflow on one branch,
    /// newest first.
    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow: &str,
        branch: &str,
        cap: usize,
        token: &Credential,
    ) -> Result<Vec<WorkflowRun>>;

    /// Artifacts attached to one run, in server order.
    async fn list_run_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
        token: &Credential,
    ) -> Result<Vec<Artifact>>;

    /// The ephemeral signed download URL for an artifact zip, taken from
    /// the redirect's Location header. Valid for under a minute; the
    /// binary itself is never downloaded.
    async fn artifact_download_url(
        &self,
        owner: &str,
        repo: &str,
        artifact_id: i64,
        token: &Credential,
    ) -> Result<String>;

    /// Exchanges an OAuth code for an opaque user token.
    async fn exchange_oauth_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<String>;
}

/// One page of a list response, decoded into its items.
pub trait Page: DeserializeOwned {
    type Item;
    fn into_items(self) -> Vec<Self::Item>;
}

impl<T: DeserializeOwned> Page for Vec<T> {
    type Item = T;
    fn into_items(self) -> Vec<T> {
        self
    }
}

impl Page for InstallationsPage {
    type Item = Installation;
    fn into_items(self) -> Vec<Installation> {
        self.installations
    }
}

impl Page for RepositoriesPage {
    type Item = Repository;
    fn into_items(self) -> Vec<Repository> {
        self.repositories
    }
}

impl Page for WorkflowRunsPage {
    type Item = WorkflowRun;
    fn into_items(self) -> Vec<WorkflowRun> {
        self.workflow_runs
    }
}

impl Page for ArtifactsPage {
    type Item = Artifact;
    fn into_items(self) -> Vec<Artifact> {
        self.artifacts
    }
}

/// Follows an opaque next-page cursor from a starting URL, collecting
/// decoded items in server order until the source is exhausted or more
/// than `cap` items have been taken. The cursor URL already carries the
/// query parameters; no extra ones are appended on subsequent requests.
pub(crate) async fn drain_pages<T, F, Fut>(start: String, cap: usize, mut fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, Option<String>)>>,
{
    let mut items = Vec::new();
    let mut cursor = Some(start);
    while let Some(url) = cursor.take() {
        let (page, next) = fetch_page(url).await?;
        items.extend(page);
        if items.len() > cap {
            break;
        }
        cursor = next;
    }
    Ok(items)
}

/// Extracts the `rel="next"` target from an RFC 5988 `Link` header.
fn next_link(headers: &header::HeaderMap) -> Option<String> {
    let value = headers.get(header::LINK)?.to_str().ok()?;
    for part in value.split(',') {
        let mut sections = part.split(';');
        let url = match sections.next() {
            Some(url) => url.trim().trim_start_matches('<').trim_end_matches('>'),
            None => continue,
        };
        if sections.any(|section| section.trim() == "rel=\"next\"") {
            return Some(url.to_string());
        }
    }
    None
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Fetch one page: decode the body, pull the next cursor from the Link
/// header. A named fn (rather than a closure) so the future owns its
/// arguments and `drain_pages` stays generic.
async fn fetch_json_page<P: Page>(
    client: Client,
    url: String,
    authorization: String,
) -> Result<(Vec<P::Item>, Option<String>)> {
    debug!(url = %url, "GET");
    let response = client
        .get(url.as_str())
        .header(header::AUTHORIZATION, authorization)
        .header(header::ACCEPT, "application/vnd.github+json")
        .header(header::USER_AGENT, USER_AGENT)
        .header("X-GitHub-Api-Version", API_VERSION)
        .send()
        .await?;
    let response = check_status(response).await?;
    let next = next_link(response.headers());
    let page: P = response.json().await?;
    Ok((page.into_items(), next))
}

pub struct GitHubApiGateway {
    client: Client,
    base_url: String,
}

impl GitHubApiGateway {
    pub fn new() -> Self {
        Self::with_base_url(GITHUB_API)
    }

    /// Redirects are disabled on the client: the artifact zip endpoint must
    /// observe its redirect rather than follow it, and no other endpoint
    /// used here legitimately redirects.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .build()
            .expect("failed to construct HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn get_raw(&self, url: &str, credential: &Credential) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header(header::AUTHORIZATION, credential.authorization_header())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .send()
            .await?;
        Ok(response)
    }

    async fn get_paged<P: Page>(
        &self,
        path_and_query: &str,
        cap: usize,
        credential: &Credential,
    ) -> Result<Vec<P::Item>> {
        let authorization = credential.authorization_header();
        let client = self.client.clone();
        drain_pages(
            format!("{}{}", self.base_url, path_and_query),
            cap,
            move |url| fetch_json_page::<P>(client.clone(), url, authorization.clone()),
        )
        .await
    }
}

impl Default for GitHubApiGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GitHubApi for GitHubApiGateway {
    async fn mint_installation_token(
        &self,
        installation_id: i64,
        app_jwt: &Credential,
    ) -> Result<String> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.base_url, installation_id
        );
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, app_jwt.authorization_header())
            .header(header::ACCEPT, "application/vnd.github+json")
            .header(header::USER_AGENT, USER_AGENT)
            .header("X-GitHub-Api-Version", API_VERSION)
            .json(&serde_json::json!({ "permissions": { "actions": "read" } }))
            .send()
            .await?;
        let response = check_status(response).await?;
        let minted: AccessTokenResponse = response.json().await?;
        Ok(minted.token)
    }

    async fn list_app_installations(&self, app_jwt: &Credential) -> Result<Vec<Installation>> {
        self.get_paged::<Vec<Installation>>(
            "/app/installations?per_page=100",
            APP_INSTALLATIONS_CAP,
            app_jwt,
        )
        .await
    }

    async fn list_user_installations(&self, user: &Credential) -> Result<Vec<Installation>> {
        self.get_paged::<InstallationsPage>(
            "/user/installations?per_page=10",
            USER_INSTALLATIONS_CAP,
            user,
        )
        .await
    }

    async fn list_installation_repositories(&self, token: &Credential) -> Result<Vec<Repository>> {
        self.get_paged::<RepositoriesPage>(
            "/installation/repositories?per_page=100",
            REPOSITORIES_CAP,
            token,
        )
        .await
    }

    async fn current_user(&self, user: &Credential) -> Result<Account> {
        let url = format!("{}/user", self.base_url);
        let response = check_status(self.get_raw(&url, user).await?).await?;
        Ok(response.json().await?)
    }

    async fn list_workflow_runs(
        &self,
        owner: &str,
        repo: &str,
        workflow: &str,
        branch: &str,
        cap: usize,
        token: &Credential,
    ) -> Result<Vec<WorkflowRun>> {
        let per_page = cap.clamp(1, 100);
        let path = format!(
            "/repos/{owner}/{repo}/actions/workflows/{workflow}/runs\
             ?branch={branch}&event=push&status=success&per_page={per_page}"
        );
        self.get_paged::<WorkflowRunsPage>(&path, cap, token).await
    }

    async fn list_run_artifacts(
        &self,
        owner: &str,
        repo: &str,
        run_id: i64,
        token: &Credential,
    ) -> Result<Vec<Artifact>> {
        let path = format!("/repos/{owner}/{repo}/actions/runs/{run_id}/artifacts?per_page=100");
        self.get_paged::<ArtifactsPage>(&path, ARTIFACTS_CAP, token)
            .await
    }

    async fn artifact_download_url(
        &self,
        owner: &str,
        repo: &str,
        artifact_id: i64,
        token: &Credential,
    ) -> Result<String> {
        let url = format!(
            "{}/repos/{owner}/{repo}/actions/artifacts/{artifact_id}/zip",
            self.base_url
        );
        let response = self.get_raw(&url, token).await?;
        let status = response.status();
        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(header::LOCATION)
                .and_then(|value| value.to_str().ok())
            {
                return Ok(location.to_string());
            }
            return Err(Error::Upstream {
                status: status.as_u16(),
                body: "redirect without a Location header".to_string(),
            });
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Upstream {
            status: status.as_u16(),
            body,
        })
    }

    async fn exchange_oauth_code(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<String> {
        let response = self
            .client
            .post(OAUTH_TOKEN_URL)
            .header(header::ACCEPT, "application/json")
            .header(header::USER_AGENT, USER_AGENT)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let exchange: OAuthExchangeResponse = response.json().await?;
        match exchange {
            OAuthExchangeResponse {
                error: Some(error), ..
            } if error == "bad_verification_code" => Err(Error::AuthExchangeRejected),
            OAuthExchangeResponse {
                error: Some(error), ..
            } => Err(Error::Upstream {
                status: 200,
                body: format!("OAuth exchange failed: {error}"),
            }),
            OAuthExchangeResponse {
                access_token: Some(token),
                ..
            } => Ok(token),
            _ => Err(Error::Upstream {
                status: 200,
                body: "OAuth exchange returned neither a token nor an error".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue, LINK};

    fn fake_source(url: String) -> impl Future<Output = Result<(Vec<i64>, Option<String>)>> {
        async move {
            Ok(match url.as_str() {
                "page-1" => (vec![1, 2], Some("page-2".to_string())),
                "page-2" => (vec![3, 4], Some("page-3".to_string())),
                "page-3" => (vec![5, 6], None),
                other => panic!("unexpected page request: {other}"),
            })
        }
    }

    #[tokio::test]
    async fn test_pagination_yields_all_items_in_page_order() {
        let items = drain_pages("page-1".to_string(), 1000, fake_source)
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn test_pagination_stops_once_cap_exceeded() {
        // Two items per page: the cap of 3 is exceeded after page two, so
        // exactly four items come back and page three is never requested.
        let items = drain_pages("page-1".to_string(), 3, fake_source)
            .await
            .unwrap();
        assert_eq!(items, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_pagination_propagates_page_errors() {
        let result = drain_pages("page-1".to_string(), 1000, |_url: String| async {
            Err::<(Vec<i64>, Option<String>), _>(Error::Upstream {
                status: 500,
                body: "boom".to_string(),
            })
        })
        .await;
        assert!(matches!(result, Err(Error::Upstream { status: 500, .. })));
    }

    #[test]
    fn test_next_link_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/x?page=2>; rel=\"next\", \
                 <https://api.github.com/x?page=9>; rel=\"last\"",
            ),
        );
        assert_eq!(
            next_link(&headers).as_deref(),
            Some("https://api.github.com/x?page=2")
        );
    }

    #[test]
    fn test_next_link_absent_on_last_page() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"prev\""),
        );
        assert_eq!(next_link(&headers), None);
        assert_eq!(next_link(&HeaderMap::new()), None);
    }
}
