use serde::{Deserialize, Serialize};

pub use crate::users::repo_types::PublicUser;

/// Request body for user registration.
#[derive(Debug, Deserialize, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

/// Request body for login.
#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Request body for redeeming an OAuth handoff code.
#[derive(Debug, Deserialize, Serialize)]
pub struct ExchangeRequest {
    pub code: String,
}

/// Query string Google appends to the callback URL.
#[derive(Debug, Default, Deserialize)]
pub struct GoogleCallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
}

/// Response returned after login, register or code exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}
