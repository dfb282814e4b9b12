//! Session endpoints: exchange the configured token secret for a signed
//! session cookie, report current auth status, and log out.
//!
//! These aren't part of the §6 request surface itself — auth is an
//! ambient concern layered on top of it — but something has to issue the
//! cookie `api::auth::middleware::require_auth` later validates.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::api::auth::token;
use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::core::constants::{DEFAULT_USER_ID, SESSION_COOKIE_NAME};

pub fn routes() -> Router<ApiState> {
    Router::new().route(
        "/session",
        post(create_session)
            .get(session_status)
            .delete(clear_session),
    )
}

#[derive(Deserialize)]
struct CreateSessionRequest {
    token: String,
}

#[derive(Serialize)]
struct SessionStatusResponse {
    authenticated: bool,
    auth_enabled: bool,
    user_id: String,
}

async fn create_session(
    State(state): State<ApiState>,
    jar: CookieJar,
    Json(request): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.auth_config.enabled {
        return Err(ApiError::BadInput("auth is disabled".to_string()));
    }
    if request.token != state.auth_config.token_secret {
        return Err(ApiError::Unauthorized);
    }

    let session_token = token::issue(
        &state.auth_config.token_secret,
        DEFAULT_USER_ID,
        state.auth_config.token_expiry_days,
    );
    let cookie = Cookie::build((SESSION_COOKIE_NAME, session_token))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::days(i64::from(state.auth_config.token_expiry_days)))
        .build();

    Ok((
        StatusCode::OK,
        jar.add(cookie),
        Json(SessionStatusResponse {
            authenticated: true,
            auth_enabled: true,
            user_id: DEFAULT_USER_ID.to_string(),
        }),
    ))
}

async fn session_status(State(state): State<ApiState>, jar: CookieJar) -> impl IntoResponse {
    if !state.auth_config.enabled {
        return Json(SessionStatusResponse {
            authenticated: true,
            auth_enabled: false,
            user_id: DEFAULT_USER_ID.to_string(),
        });
    }

    let claims = jar
        .get(SESSION_COOKIE_NAME)
        .and_then(|cookie| token::verify(&state.auth_config.token_secret, cookie.value()));

    match claims {
        Some(claims) => Json(SessionStatusResponse {
            authenticated: true,
            auth_enabled: true,
            user_id: claims.user_id().to_string(),
        }),
        None => Json(SessionStatusResponse {
            authenticated: false,
            auth_enabled: true,
            user_id: String::new(),
        }),
    }
}

async fn clear_session(jar: CookieJar) -> impl IntoResponse {
    let cookie = Cookie::build((SESSION_COOKIE_NAME, ""))
        .http_only(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(0))
        .build();
    (StatusCode::OK, jar.remove(cookie))
}
