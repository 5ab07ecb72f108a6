//! Login and credential refresh calls
//!
//! Both calls go straight to the backend with the plain `reqwest::Client`.
//! They are never routed through the authenticated client's interception
//! cycle: a 401 from either endpoint is a final answer, not a signal to
//! refresh again.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::endpoints::{LOGIN_PATH, REFRESH_PATH, join_url};
use crate::error::{Error, Result};

/// Role of the signed-in user within the marketplace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Vendor,
    Customer,
    #[serde(other)]
    Unknown,
}

/// Profile returned by login and by `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub role: Role,
    /// Storefront owned by a vendor account
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body of a successful login.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(alias = "refresh_token")]
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// Credentials minted by the refresh endpoint.
///
/// The backend may keep the refresh credential unchanged, in which case
/// `refresh_token` is absent.
#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    #[serde(alias = "access_token")]
    pub access_token: String,
    #[serde(default, alias = "refresh_token", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Exchange an identifier and secret for the initial credential pair.
#[instrument(skip_all, fields(endpoint = LOGIN_PATH))]
pub async fn login(
    client: &reqwest::Client,
    base_url: &str,
    email: &str,
    password: &str,
) -> Result<LoginResponse> {
    let response = client
        .post(join_url(base_url, LOGIN_PATH))
        .json(&LoginRequest { email, password })
        .send()
        .await
        .map_err(|e| transport_error(LOGIN_PATH, e))?;

    let response = reject_unless_success(LOGIN_PATH, response).await?;
    debug!("login accepted");

    response
        .json::<LoginResponse>()
        .await
        .map_err(|e| Error::InvalidResponse {
            endpoint: LOGIN_PATH,
            message: e.to_string(),
        })
}

/// Exchange a refresh credential for a new access credential.
///
/// Exactly one network call; the caller decides what a failure means.
#[instrument(skip_all, fields(endpoint = REFRESH_PATH))]
pub async fn refresh(client: &reqwest::Client, base_url: &str, refresh: &str) -> Result<TokenPair> {
    let response = client
        .post(join_url(base_url, REFRESH_PATH))
        .json(&RefreshRequest {
            refresh_token: refresh,
        })
        .send()
        .await
        .map_err(|e| transport_error(REFRESH_PATH, e))?;

    let response = reject_unless_success(REFRESH_PATH, response).await?;
    debug!("refresh accepted");

    response
        .json::<TokenPair>()
        .await
        .map_err(|e| Error::InvalidResponse {
            endpoint: REFRESH_PATH,
            message: e.to_string(),
        })
}

fn transport_error(endpoint: &'static str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout {
            endpoint,
            message: e.to_string(),
        }
    } else {
        Error::Http(format!("{endpoint}: {e}"))
    }
}

async fn reject_unless_success(
    endpoint: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    Err(Error::Rejected {
        endpoint,
        status: status.as_u16(),
        body,
    })
}
