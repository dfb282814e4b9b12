//! Auth middleware: resolves the caller's identity for a request.
//!
//! When auth is disabled (the default, single-user local mode) every
//! request resolves to `DEFAULT_USER_ID` with no cookie involved. When
//! enabled, a valid signed session cookie (see `super::token`) is
//! required; a missing or invalid one is rejected with `unauthorized`.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;

use crate::api::types::ApiError;
use crate::core::config::AuthConfig;
use crate::core::constants::{DEFAULT_USER_ID, SESSION_COOKIE_NAME};

use super::token;

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
}

pub async fn require_auth(
    State(config): State<AuthConfig>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let context = if !config.enabled {
        AuthContext {
            user_id: DEFAULT_USER_ID.to_string(),
        }
    } else {
        let token = jar
            .get(SESSION_COOKIE_NAME)
            .ok_or(ApiError::Unauthorized)?
            .value();

        let claims = token::verify(&config.token_secret, token).ok_or(ApiError::Unauthorized)?;
        AuthContext {
            user_id: claims.user_id().to_string(),
        }
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}
