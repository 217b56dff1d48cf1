/// Bearer-token authentication and role checks
///
/// Authentication is a single extractor: handlers that take
/// [`Authenticated`] get a validated [`AuthContext`] or the request is
/// rejected with 401 before the handler runs. This is the one place token
/// failures are handled; individual handlers never special-case 401/403.
/// Clients respond to a 401 by signing out.
///
/// Role checks go through [`require_role`], which delegates to the pure
/// access-guard decision function.
///
/// # Example
///
/// ```no_run
/// use axum::Json;
/// use lonify_api::error::ApiResult;
/// use lonify_api::middleware::auth::{require_role, Authenticated};
/// use lonify_shared::models::user::Role;
///
/// async fn admin_only(Authenticated(auth): Authenticated) -> ApiResult<Json<&'static str>> {
///     require_role(&auth, &[Role::Admin])?;
///     Ok(Json("ok"))
/// }
/// ```

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use lonify_shared::auth::guard::{authorize, AccessDecision};
use lonify_shared::auth::middleware::{bearer_token, AuthContext};
use lonify_shared::auth::jwt;
use lonify_shared::models::user::Role;

use crate::{app::AppState, error::ApiError};

/// Extractor that authenticates the request via its bearer token
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)?;
        let claims = jwt::validate_token(token, state.jwt_secret())?;

        Ok(Authenticated(AuthContext::from_claims(&claims)))
    }
}

/// Rejects the request unless the identity's role is in the required set
///
/// Thin HTTP mapping over the pure guard: `RedirectToLogin` becomes 401,
/// anything short of `Allow` becomes 403.
pub fn require_role(auth: &AuthContext, required: &[Role]) -> Result<(), ApiError> {
    match authorize(required, Some(auth), false, false) {
        AccessDecision::Allow => Ok(()),
        AccessDecision::RedirectToLogin => {
            Err(ApiError::Unauthorized("Not signed in".to_string()))
        }
        AccessDecision::RedirectToFallback | AccessDecision::Pending => Err(ApiError::Forbidden(
            format!("This action requires one of: {:?}", required),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: Role) -> AuthContext {
        AuthContext {
            uid: "uid-1".to_string(),
            email: "user@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_require_role_allows_member() {
        assert!(require_role(&context(Role::Manager), &[Role::Manager, Role::Admin]).is_ok());
    }

    #[test]
    fn test_require_role_rejects_non_member() {
        let err = require_role(&context(Role::Borrower), &[Role::Admin]).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
