use axum::{
    extract::{Query, State},
    http::{header::LOCATION, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use url::Url;

use crate::{
    auth::{
        dto::{AuthResponse, ExchangeRequest, GoogleCallbackQuery, LoginRequest, RegisterRequest},
        extractors::ApiJson,
        google::{IdentityProvider, ProviderError},
        services,
    },
    errors::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/google", get(google_login))
        .route("/auth/google/callback", get(google_callback))
        .route("/auth/google/exchange", post(google_exchange))
}

/// 302 Found. The browser follows it with a plain GET.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let resp = services::register(state.users.as_ref(), &state.keys, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let resp = services::login(state.users.as_ref(), &state.keys, payload).await?;
    Ok(Json(resp))
}

#[instrument(skip(state))]
pub async fn google_login(State(state): State<AppState>) -> Response {
    found(&state.google.authorize_url())
}

#[instrument(skip_all)]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<GoogleCallbackQuery>,
) -> Result<Response, ApiError> {
    if let Some(reason) = query.error {
        warn!(%reason, "google consent not granted");
        return Err(ApiError::Unauthorized {
            message: "Authentication failed",
            detail: Some(reason),
        });
    }
    let Some(code) = query.code.filter(|c| !c.is_empty()) else {
        warn!("google callback without code");
        return Err(ApiError::unauthorized("Authentication failed"));
    };

    let profile = state.google.exchange_code(&code).await.map_err(|e| match e {
        ProviderError::NoProfile => {
            warn!("no profile returned from google");
            ApiError::unauthorized("Authentication failed")
        }
        other => ApiError::Provider(other.to_string()),
    })?;

    let user = services::find_or_create_google_user(state.users.as_ref(), &profile).await?;
    let resp = services::issue_token(&state.keys, &user)?;
    let code = state.handoff.issue(resp);

    let mut target = Url::parse(&format!(
        "{}/auth/google/callback",
        state.config.frontend_url
    ))
    .map_err(ApiError::internal("Invalid frontend URL"))?;
    target.query_pairs_mut().append_pair("code", &code);

    info!(user_id = %user.id, "google login complete, redirecting to frontend");
    Ok(found(target.as_str()))
}

#[instrument(skip_all)]
pub async fn google_exchange(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ExchangeRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    state.handoff.redeem(payload.code.trim()).map(Json).ok_or_else(|| {
        warn!("unknown or expired handoff code");
        ApiError::unauthorized("Invalid or expired code")
    })
}
