/// Access guard: the route-level authorization decision
///
/// A single pure function decides whether a principal may reach guarded
/// content. It has no hidden state, so every decision is reproducible from
/// its four inputs and trivially unit-testable. Rules, in order:
///
/// 1. authentication or role resolution still pending → `Pending`
/// 2. no authenticated identity → `RedirectToLogin`
/// 3. identity's role not in the required set → `RedirectToFallback`
/// 4. otherwise → `Allow`
///
/// The API layer maps `RedirectToLogin` to 401 and `RedirectToFallback` to
/// 403; a client-side shell would map them to navigation instead.
///
/// # Example
///
/// ```
/// use lonify_shared::auth::guard::{authorize, AccessDecision};
/// use lonify_shared::auth::middleware::AuthContext;
/// use lonify_shared::models::user::Role;
///
/// let admin = AuthContext {
///     uid: "uid-1".to_string(),
///     email: "ops@lonify.app".to_string(),
///     role: Role::Admin,
/// };
///
/// assert_eq!(
///     authorize(&[Role::Admin], Some(&admin), false, false),
///     AccessDecision::Allow
/// );
/// assert_eq!(
///     authorize(&[Role::Admin], None, false, false),
///     AccessDecision::RedirectToLogin
/// );
/// ```

use super::middleware::AuthContext;
use crate::models::user::Role;

/// Outcome of an access-guard evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Authentication or role resolution is still in flight; render
    /// nothing final yet
    Pending,

    /// Principal may access the guarded content
    Allow,

    /// No authenticated identity; send to the login entry point
    RedirectToLogin,

    /// Authenticated but not in the required role set; send to the
    /// neutral fallback
    RedirectToFallback,
}

/// Decides whether the identity may access content guarded by `required`
///
/// Pure function of its four inputs; evaluation order matches the rule
/// list in the module docs.
pub fn authorize(
    required: &[Role],
    identity: Option<&AuthContext>,
    auth_pending: bool,
    role_pending: bool,
) -> AccessDecision {
    if auth_pending || role_pending {
        return AccessDecision::Pending;
    }

    let Some(identity) = identity else {
        return AccessDecision::RedirectToLogin;
    };

    if !required.contains(&identity.role) {
        return AccessDecision::RedirectToFallback;
    }

    AccessDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(role: Role) -> AuthContext {
        AuthContext {
            uid: "uid-1".to_string(),
            email: "user@example.com".to_string(),
            role,
        }
    }

    #[test]
    fn test_unauthenticated_redirects_to_login() {
        assert_eq!(
            authorize(&[Role::Admin], None, false, false),
            AccessDecision::RedirectToLogin
        );
    }

    #[test]
    fn test_matching_role_allows() {
        let admin = identity(Role::Admin);
        assert_eq!(
            authorize(&[Role::Admin], Some(&admin), false, false),
            AccessDecision::Allow
        );

        let manager = identity(Role::Manager);
        assert_eq!(
            authorize(&[Role::Manager, Role::Admin], Some(&manager), false, false),
            AccessDecision::Allow
        );
    }

    #[test]
    fn test_wrong_role_redirects_to_fallback() {
        let borrower = identity(Role::Borrower);
        assert_eq!(
            authorize(&[Role::Admin], Some(&borrower), false, false),
            AccessDecision::RedirectToFallback
        );
    }

    #[test]
    fn test_pending_resolution_wins_over_everything() {
        let admin = identity(Role::Admin);

        assert_eq!(
            authorize(&[Role::Admin], Some(&admin), true, false),
            AccessDecision::Pending
        );
        assert_eq!(
            authorize(&[Role::Admin], None, false, true),
            AccessDecision::Pending
        );
    }

    #[test]
    fn test_decisions_are_deterministic() {
        let borrower = identity(Role::Borrower);
        let first = authorize(&[Role::Manager], Some(&borrower), false, false);
        let second = authorize(&[Role::Manager], Some(&borrower), false, false);
        assert_eq!(first, second);
    }
}
