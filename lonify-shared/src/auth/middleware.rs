/// Authentication context and request-header parsing
///
/// The API server validates the bearer token once, in a middleware layer,
/// and injects an [`AuthContext`] into request extensions. Handlers extract
/// it with Axum's `Extension` extractor and never touch the token again.
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use lonify_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("{} ({})", auth.email, auth.role)
/// }
/// ```

use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};

use super::jwt::Claims;
use crate::models::user::Role;

/// Authentication context added to request extensions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthContext {
    /// Identity-provider subject id
    pub uid: String,

    /// Authenticated email; ownership checks compare against this
    pub email: String,

    /// Role carried by the session token
    pub role: Role,
}

impl AuthContext {
    /// Creates an auth context from validated JWT claims
    pub fn from_claims(claims: &Claims) -> Self {
        Self {
            uid: claims.sub.clone(),
            email: claims.email.clone(),
            role: claims.role,
        }
    }
}

/// Error type for credential extraction and validation
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Authorization header is not a Bearer token
    #[error("{0}")]
    InvalidFormat(String),

    /// Token validation failed
    #[error("{0}")]
    InvalidToken(String),
}

/// Extracts the bearer token from request headers
///
/// # Errors
///
/// - `MissingCredentials` when there is no `Authorization` header
/// - `InvalidFormat` when the header is not `Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))
}
