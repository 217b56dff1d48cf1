/// Identity resolver: maps an authenticated principal to a role
///
/// Role is a derived attribute fetched from the backend after the external
/// identity provider authenticates a user. Resolution is modeled as an
/// explicit state machine rather than an ad hoc fetch:
///
/// ```text
/// unresolved → resolving → resolved(role)
///                        → failed
/// ```
///
/// Results are cached per email for the lifetime of the resolver and
/// invalidated atomically on sign-out analogues (role change, suspension).
/// A lookup failure resolves to the least-privileged role (fail-open to
/// `borrower`, never fail-closed) and is always emitted as a
/// `tracing::warn!` event so operators can see backend outages; the cache
/// keeps `Failed` so the next resolve retries the lookup.
///
/// # Admin bootstrap override
///
/// One configured email may be pinned to `admin` regardless of backend
/// data ([`AdminOverride`], from the `ADMIN_EMAIL` environment variable).
/// This exists so a fresh deployment has a working administrator before
/// any role rows exist. It is credential-adjacent logic and should be
/// retired once real admin accounts are provisioned.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::user::{Role, User};

/// Resolution state for one principal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleResolution {
    /// No lookup attempted yet
    Unresolved,

    /// Lookup in flight
    Resolving,

    /// Lookup finished; role known
    Resolved(Role),

    /// Lookup failed; the default role was handed out and the next
    /// resolve will retry
    Failed,
}

/// Error returned by a role lookup backend
#[derive(Debug, thiserror::Error)]
#[error("role lookup failed: {0}")]
pub struct RoleLookupError(pub String);

/// Backend that answers "what role does this email have?"
///
/// The production source is [`PgRoleSource`]; tests substitute an
/// in-memory stub.
#[async_trait]
pub trait RoleSource: Send + Sync {
    /// Looks up the stored role for an email; `None` means no account
    async fn role_for(&self, email: &str) -> Result<Option<Role>, RoleLookupError>;
}

/// Postgres-backed role lookup
pub struct PgRoleSource {
    pool: PgPool,
}

impl PgRoleSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleSource for PgRoleSource {
    async fn role_for(&self, email: &str) -> Result<Option<Role>, RoleLookupError> {
        User::role_by_email(&self.pool, email)
            .await
            .map_err(|e| RoleLookupError(e.to_string()))
    }
}

/// Bootstrap policy pinning one configured email to the admin role
#[derive(Debug, Clone, Default)]
pub struct AdminOverride {
    email: Option<String>,
}

impl AdminOverride {
    /// Creates the override; `None` disables it
    pub fn new(email: Option<String>) -> Self {
        Self { email }
    }

    /// Whether the override applies to this email (case-insensitive)
    pub fn applies_to(&self, email: &str) -> bool {
        self.email
            .as_deref()
            .map(|configured| configured.eq_ignore_ascii_case(email))
            .unwrap_or(false)
    }
}

/// Caching role resolver
///
/// The cache is the only process-wide mutable auth state; it is owned
/// exclusively by this type and mutated only under its lock, so
/// invalidation is atomic with respect to concurrent resolves.
pub struct RoleResolver {
    source: Arc<dyn RoleSource>,
    admin_override: AdminOverride,
    cache: RwLock<HashMap<String, RoleResolution>>,
}

impl RoleResolver {
    pub fn new(source: Arc<dyn RoleSource>, admin_override: AdminOverride) -> Self {
        Self {
            source,
            admin_override,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves the role for an email
    ///
    /// Never fails: the admin override wins first, then the cache, then a
    /// fresh lookup; no account or a lookup error resolves to
    /// [`Role::Borrower`].
    pub async fn resolve(&self, email: &str) -> Role {
        let key = email.to_ascii_lowercase();

        if self.admin_override.applies_to(email) {
            self.cache
                .write()
                .await
                .insert(key, RoleResolution::Resolved(Role::Admin));
            return Role::Admin;
        }

        if let Some(RoleResolution::Resolved(role)) = self.cache.read().await.get(&key) {
            return *role;
        }

        self.cache
            .write()
            .await
            .insert(key.clone(), RoleResolution::Resolving);

        match self.source.role_for(email).await {
            Ok(Some(role)) => {
                self.cache
                    .write()
                    .await
                    .insert(key, RoleResolution::Resolved(role));
                role
            }
            Ok(None) => {
                debug!(email, "No role record; defaulting to borrower");
                self.cache
                    .write()
                    .await
                    .insert(key, RoleResolution::Resolved(Role::Borrower));
                Role::Borrower
            }
            Err(e) => {
                warn!(
                    email,
                    error = %e,
                    "Role lookup failed; defaulting to least privilege"
                );
                self.cache.write().await.insert(key, RoleResolution::Failed);
                Role::Borrower
            }
        }
    }

    /// Reports the resolution state for an email without triggering a lookup
    pub async fn state(&self, email: &str) -> RoleResolution {
        let key = email.to_ascii_lowercase();
        self.cache
            .read()
            .await
            .get(&key)
            .copied()
            .unwrap_or(RoleResolution::Unresolved)
    }

    /// Drops the cached resolution for one email
    ///
    /// Called whenever the stored role or suspension changes, so no stale
    /// role survives the mutation.
    pub async fn invalidate(&self, email: &str) {
        let key = email.to_ascii_lowercase();
        self.cache.write().await.remove(&key);
    }

    /// Drops every cached resolution
    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubSource {
        role: Option<Role>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn returning(role: Option<Role>) -> Self {
            Self {
                role,
                fail: false,
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                role: None,
                fail: true,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RoleSource for StubSource {
        async fn role_for(&self, _email: &str) -> Result<Option<Role>, RoleLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(RoleLookupError("backend unreachable".to_string()))
            } else {
                Ok(self.role)
            }
        }
    }

    #[tokio::test]
    async fn test_resolves_stored_role() {
        let resolver = RoleResolver::new(
            Arc::new(StubSource::returning(Some(Role::Manager))),
            AdminOverride::default(),
        );

        assert_eq!(resolver.resolve("m@example.com").await, Role::Manager);
        assert_eq!(
            resolver.state("m@example.com").await,
            RoleResolution::Resolved(Role::Manager)
        );
    }

    #[tokio::test]
    async fn test_missing_account_defaults_to_borrower() {
        let resolver = RoleResolver::new(
            Arc::new(StubSource::returning(None)),
            AdminOverride::default(),
        );

        assert_eq!(resolver.resolve("nobody@example.com").await, Role::Borrower);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_open_and_retries() {
        let source = Arc::new(StubSource::failing());
        let resolver = RoleResolver::new(source.clone(), AdminOverride::default());

        assert_eq!(resolver.resolve("b@example.com").await, Role::Borrower);
        assert_eq!(resolver.state("b@example.com").await, RoleResolution::Failed);

        // Failure is not cached as a role: the next resolve retries.
        resolver.resolve("b@example.com").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolved_role_is_cached() {
        let source = Arc::new(StubSource::returning(Some(Role::Manager)));
        let resolver = RoleResolver::new(source.clone(), AdminOverride::default());

        resolver.resolve("m@example.com").await;
        resolver.resolve("m@example.com").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        resolver.invalidate("m@example.com").await;
        assert_eq!(
            resolver.state("m@example.com").await,
            RoleResolution::Unresolved
        );

        resolver.resolve("m@example.com").await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_admin_override_beats_backend_data() {
        let resolver = RoleResolver::new(
            Arc::new(StubSource::returning(Some(Role::Borrower))),
            AdminOverride::new(Some("Root@Lonify.app".to_string())),
        );

        // Case-insensitive match; the backend row is never consulted.
        assert_eq!(resolver.resolve("root@lonify.app").await, Role::Admin);
        assert_eq!(resolver.resolve("other@lonify.app").await, Role::Borrower);
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let resolver = RoleResolver::new(
            Arc::new(StubSource::returning(Some(Role::Manager))),
            AdminOverride::default(),
        );

        resolver.resolve("a@example.com").await;
        resolver.resolve("b@example.com").await;
        resolver.invalidate_all().await;

        assert_eq!(resolver.state("a@example.com").await, RoleResolution::Unresolved);
        assert_eq!(resolver.state("b@example.com").await, RoleResolution::Unresolved);
    }
}
