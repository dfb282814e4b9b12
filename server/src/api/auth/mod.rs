//! Authentication: a minimal signed-cookie session for single-user,
//! optionally-authenticated local deployments (§12 `AuthConfig`).

pub mod middleware;
pub mod token;

pub use middleware::{AuthContext, require_auth};
pub use token::SessionClaims;
