//! API route handlers

pub mod auth;
pub mod conversations;
pub mod health;
pub mod jobs;
pub mod query;
pub mod stream;

use axum::Router;

use crate::api::state::ApiState;

/// Routes reachable without a session: health check and the session
/// endpoints used to obtain one.
pub fn public_routes() -> Router<ApiState> {
    Router::new().merge(health::routes()).merge(auth::routes())
}

/// Routes that require `api::auth::middleware::require_auth` layered on
/// top by the caller.
pub fn protected_routes() -> Router<ApiState> {
    Router::new()
        .merge(conversations::routes())
        .merge(jobs::routes())
        .merge(query::routes())
        .merge(stream::routes())
}
