use axum::{extract::State, routing::get, Json, Router};
use tracing::{info, instrument, warn};

use crate::{
    auth::extractors::{ApiJson, AuthUser},
    errors::ApiError,
    state::AppState,
    users::{
        repo::UserStore,
        repo_types::{ProfileUpdate, PublicUser},
    },
};

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(get_me).put(update_me))
}

fn user_gone() -> ApiError {
    ApiError::unauthorized("User not found")
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<PublicUser>, ApiError> {
    let user = state.users.find_by_id(claims.sub).await?.ok_or_else(|| {
        warn!("token subject no longer exists");
        user_gone()
    })?;
    Ok(Json(PublicUser::from(&user)))
}

#[instrument(skip_all, fields(user_id = %claims.sub))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    ApiJson(mut update): ApiJson<ProfileUpdate>,
) -> Result<Json<PublicUser>, ApiError> {
    if let Some(name) = update.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(ApiError::BadRequest("Name cannot be empty".into()));
        }
    }
    if let Some(avatar) = update.avatar.as_mut() {
        *avatar = avatar.trim().to_string();
    }

    let user = state
        .users
        .update_profile(claims.sub, update)
        .await?
        .ok_or_else(user_gone)?;
    info!("profile updated");
    Ok(Json(PublicUser::from(&user)))
}
