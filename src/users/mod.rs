use crate::state::AppState;
use axum::Router;

pub mod handlers;
pub mod memory;
pub mod repo;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::me_routes())
}
