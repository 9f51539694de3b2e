use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::GoogleConfig;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// Identity asserted by the provider after user consent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub id: String,
    pub email: Option<String>,
    pub email_verified: bool,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("provider rejected the request ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("provider returned no profile")]
    NoProfile,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page the browser is sent to.
    fn authorize_url(&self) -> String;
    /// Trades an authorization code for the user's profile.
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, ProviderError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
    picture: Option<String>,
}

impl UserInfo {
    fn into_profile(self) -> Option<ProviderProfile> {
        if self.sub.trim().is_empty() {
            return None;
        }
        Some(ProviderProfile {
            id: self.sub,
            email: self.email.map(|e| e.trim().to_lowercase()),
            email_verified: self.email_verified,
            name: self.name,
            avatar: self.picture,
        })
    }
}

#[derive(Clone)]
pub struct GoogleProvider {
    client: Client,
    cfg: GoogleConfig,
    authorize_url: String,
    token_url: String,
    userinfo_url: String,
}

impl GoogleProvider {
    pub fn new(cfg: GoogleConfig) -> Self {
        Self::with_endpoints(cfg, AUTHORIZE_URL, TOKEN_URL, USERINFO_URL)
    }

    pub fn with_endpoints(cfg: GoogleConfig, authorize: &str, token: &str, userinfo: &str) -> Self {
        Self {
            client: Client::new(),
            cfg,
            authorize_url: authorize.into(),
            token_url: token.into(),
            userinfo_url: userinfo.into(),
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ProviderError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self) -> String {
        let params = [
            ("client_id", self.cfg.client_id.as_str()),
            ("redirect_uri", self.cfg.callback_url.as_str()),
            ("response_type", "code"),
            ("scope", SCOPES),
        ];
        match Url::parse_with_params(&self.authorize_url, &params) {
            Ok(url) => url.into(),
            Err(_) => self.authorize_url.clone(),
        }
    }

    #[instrument(skip_all)]
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile, ProviderError> {
        let resp = self
            .client
            .post(&self.token_url)
            .form(&[
                ("code", code),
                ("client_id", self.cfg.client_id.as_str()),
                ("client_secret", self.cfg.client_secret.as_str()),
                ("redirect_uri", self.cfg.callback_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token: TokenResponse = Self::check(resp).await?.json().await?;
        debug!("google code exchanged");

        let resp = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&token.access_token)
            .send()
            .await?;
        let info: UserInfo = Self::check(resp).await?.json().await?;
        info.into_profile().ok_or(ProviderError::NoProfile)
    }
}
