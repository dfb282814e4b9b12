//! Signed session tokens (§12 `token_secret`/`token_expiry_days`).
//!
//! Built on the teacher's own JWT stack (`jsonwebtoken`, HS256) rather
//! than a hand-rolled envelope.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
}

impl SessionClaims {
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Issue a new session token for `user_id`, valid for `expiry_days`.
pub fn issue(secret: &str, user_id: &str, expiry_days: u32) -> String {
    let exp = (Utc::now() + Duration::days(i64::from(expiry_days))).timestamp();
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 encoding of a well-formed claims struct cannot fail")
}

/// Verify a session token, returning its claims if the signature matches
/// and it hasn't expired. Returns `None` on any malformed, tampered, or
/// expired token — callers treat all of those the same way.
pub fn verify(secret: &str, token: &str) -> Option<SessionClaims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["sub", "exp"]);

    decode::<SessionClaims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .ok()
        .map(|data| data.claims)
}
