use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;

use super::errors::ClientError;
use crate::{
    auth::dto::{AuthResponse, ExchangeRequest, LoginRequest, RegisterRequest},
    config::ClientConfig,
    errors::ErrorBody,
    users::repo_types::{ProfileUpdate, PublicUser},
};

/// Backend calls the session needs. Authenticated calls take the bearer token explicitly.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError>;
    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, ClientError>;
    async fn exchange_code(&self, code: &str) -> Result<AuthResponse, ClientError>;
    async fn current_user(&self, token: &str) -> Result<PublicUser, ClientError>;
    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<PublicUser, ClientError>;
    /// Where the browser goes to start a Google login.
    fn google_login_url(&self) -> String;
}

#[async_trait]
impl<T: AuthApi + ?Sized> AuthApi for Arc<T> {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        (**self).login(email, password).await
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, ClientError> {
        (**self).register(email, password, name).await
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthResponse, ClientError> {
        (**self).exchange_code(code).await
    }

    async fn current_user(&self, token: &str) -> Result<PublicUser, ClientError> {
        (**self).current_user(token).await
    }

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<PublicUser, ClientError> {
        (**self).update_profile(token, update).await
    }

    fn google_login_url(&self) -> String {
        (**self).google_login_url()
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(cfg: &ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(cfg.timeout).build()?;
        Ok(Self {
            http,
            base_url: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder.bearer_auth(token)
    }

    async fn read<T: DeserializeOwned>(resp: Response) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string(),
        };
        Err(ClientError::Http {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ClientError> {
        let body = LoginRequest {
            email: email.into(),
            password: password.into(),
        };
        let resp = self
            .http
            .post(self.url("/auth/login"))
            .json(&body)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<AuthResponse, ClientError> {
        let body = RegisterRequest {
            email: email.into(),
            password: password.into(),
            name: name.into(),
        };
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&body)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn exchange_code(&self, code: &str) -> Result<AuthResponse, ClientError> {
        let body = ExchangeRequest { code: code.into() };
        let resp = self
            .http
            .post(self.url("/auth/google/exchange"))
            .json(&body)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn current_user(&self, token: &str) -> Result<PublicUser, ClientError> {
        let resp = Self::authorized(self.http.get(self.url("/users/me")), token)
            .send()
            .await?;
        Self::read(resp).await
    }

    async fn update_profile(
        &self,
        token: &str,
        update: &ProfileUpdate,
    ) -> Result<PublicUser, ClientError> {
        let resp = Self::authorized(self.http.put(self.url("/users/me")), token)
            .json(update)
            .send()
            .await?;
        Self::read(resp).await
    }

    fn google_login_url(&self) -> String {
        self.url("/auth/google")
    }
}
