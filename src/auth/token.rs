use log::info;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::Credentials;
use crate::error::{AppError, Result};

pub const AUTH_BASE_URL: &str = "https://api-t1.fyers.in/api/v3";

/// Build the browser login link for the authorization-code grant.
pub fn auth_url(credentials: &Credentials) -> Result<String> {
    let url = reqwest::Url::parse_with_params(
        &format!("{}/generate-authcode", AUTH_BASE_URL.trim_end_matches('/')),
        &[
            ("client_id", credentials.client_id.as_str()),
            ("redirect_uri", credentials.redirect_uri.as_str()),
            ("response_type", credentials.response_type.as_str()),
            ("state", "None"),
        ],
    )
    .map_err(|err| AppError::auth(format!("failed to build authentication link: {err}")))?;
    Ok(url.into())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    s: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchanges a captured authorization code for an access token.
///
/// One request per call; a rejected code or transport failure surfaces as
/// `AppError::Auth` with the upstream reason.
pub struct TokenExchanger {
    client: reqwest::Client,
    base_url: String,
}

impl Default for TokenExchanger {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenExchanger {
    pub fn new() -> Self {
        Self::with_base_url(AUTH_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/{path}")
    }

    pub async fn exchange(&self, credentials: &Credentials, auth_code: &str) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint("validate-authcode"))
            .json(&json!({
                "grant_type": credentials.grant_type,
                "appIdHash": app_id_hash(credentials),
                "code": auth_code,
            }))
            .send()
            .await
            .map_err(|err| AppError::auth(format!("token exchange request failed: {err}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| AppError::auth(format!("failed to read token response: {err}")))?;
        if !status.is_success() {
            return Err(AppError::auth(format!(
                "token endpoint returned status {status}: {}",
                snippet(&body)
            )));
        }

        let parsed: TokenResponse = serde_json::from_str(&body)
            .map_err(|err| AppError::auth(format!("malformed token response: {err}")))?;
        if parsed.s != "ok" {
            return Err(AppError::auth(
                parsed
                    .message
                    .unwrap_or_else(|| format!("token endpoint answered `{}`", parsed.s)),
            ));
        }
        let token = parsed
            .access_token
            .ok_or_else(|| AppError::auth("token response missing access_token"))?;
        info!("successfully generated access token");
        Ok(token)
    }
}

/// `appIdHash` required by the token endpoint: sha256 of `client_id:secret_id`.
fn app_id_hash(credentials: &Credentials) -> String {
    let digest = Sha256::digest(format!("{}:{}", credentials.client_id, credentials.secret_id));
    hex::encode(digest)
}

fn snippet(body: &str) -> &str {
    match body.char_indices().nth(256) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
