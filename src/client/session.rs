//! Client-side auth session: restores state from a stored token on start,
//! completes the Google handoff, and keeps the token store and the in-memory
//! state in step. Any failure lands in `Unauthenticated` with the token
//! cleared; there is no half-signed-in state.

use std::sync::Arc;

use tracing::{debug, warn};
use url::form_urlencoded;

use super::{
    api::AuthApi,
    errors::ClientError,
    guard::{self, Route},
    token_store::TokenStore,
};
use crate::{
    auth::dto::AuthResponse,
    users::repo_types::{ProfileUpdate, PublicUser},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Before the first bootstrap.
    Loading,
    Authenticated(PublicUser),
    Unauthenticated,
}

pub struct Session<A> {
    api: A,
    tokens: Arc<dyn TokenStore>,
    state: AuthState,
}

impl<A: AuthApi> Session<A> {
    pub fn new(api: A, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            tokens,
            state: AuthState::Loading,
        }
    }

    pub fn state(&self) -> &AuthState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, AuthState::Authenticated(_))
    }

    pub fn user(&self) -> Option<&PublicUser> {
        match &self.state {
            AuthState::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    /// Route decision for `path` from the cached state.
    pub fn guard(&self, path: &str) -> Route {
        guard::guard(path, self.is_authenticated())
    }

    pub fn google_login_url(&self) -> String {
        self.api.google_login_url()
    }

    fn sign_out(&mut self) {
        self.tokens.clear();
        self.state = AuthState::Unauthenticated;
    }

    /// Checks the stored token against the backend.
    pub async fn bootstrap(&mut self) -> &AuthState {
        let Some(token) = self.tokens.load() else {
            self.state = AuthState::Unauthenticated;
            return &self.state;
        };

        match self.api.current_user(&token).await {
            Ok(user) => {
                debug!(user_id = %user.id, "session restored");
                self.state = AuthState::Authenticated(user);
            }
            Err(e) => {
                warn!(error = %e, "stored token rejected, signing out");
                self.sign_out();
            }
        }
        &self.state
    }

    /// Finishes a Google login from the callback page's query string and
    /// returns where to navigate next.
    pub async fn complete_oauth(&mut self, query: &str) -> &'static str {
        match self.try_complete_oauth(query).await {
            Ok(()) => guard::HOME,
            Err(e) => {
                warn!(error = %e, "google callback failed");
                self.sign_out();
                guard::LOGIN
            }
        }
    }

    async fn try_complete_oauth(&mut self, query: &str) -> Result<(), ClientError> {
        let params: Vec<(String, String)> =
            form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
                .into_owned()
                .collect();
        let param = |name: &str| {
            params
                .iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.clone())
        };

        let token = if let Some(code) = param("code") {
            self.api.exchange_code(&code).await?.token
        } else if let Some(token) = param("token") {
            token
        } else {
            return Err(ClientError::Callback("no code or token in callback".into()));
        };

        self.tokens.save(&token)?;
        let user = self.api.current_user(&token).await?;
        self.state = AuthState::Authenticated(user);
        Ok(())
    }

    fn accept(&mut self, resp: AuthResponse) -> Result<PublicUser, ClientError> {
        self.tokens.save(&resp.token)?;
        self.state = AuthState::Authenticated(resp.user.clone());
        Ok(resp.user)
    }

    fn accept_or_sign_out(
        &mut self,
        result: Result<AuthResponse, ClientError>,
    ) -> Result<PublicUser, ClientError> {
        match result.and_then(|resp| self.accept(resp)) {
            Ok(user) => Ok(user),
            Err(e) => {
                warn!(error = %e, "sign-in failed");
                self.sign_out();
                Err(e)
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<PublicUser, ClientError> {
        let result = self.api.login(email, password).await;
        self.accept_or_sign_out(result)
    }

    pub async fn register(
        &mut self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<PublicUser, ClientError> {
        let result = self.api.register(email, password, name).await;
        self.accept_or_sign_out(result)
    }

    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<PublicUser, ClientError> {
        let Some(token) = self.tokens.load() else {
            self.sign_out();
            return Err(ClientError::Http {
                status: 401,
                message: "Not signed in".into(),
            });
        };
        match self.api.update_profile(&token, update).await {
            Ok(user) => {
                self.state = AuthState::Authenticated(user.clone());
                Ok(user)
            }
            Err(e) => {
                if e.is_unauthorized() {
                    self.sign_out();
                }
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.sign_out();
    }
}
