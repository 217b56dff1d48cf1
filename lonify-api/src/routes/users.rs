/// User administration endpoints
///
/// - `GET /users?page=` - admin: paginated user list
/// - `GET /users/:email/role` - public role lookup consumed by the
///   identity resolver; unknown emails resolve to the default role
/// - `PATCH /users/:email/role` - admin: change a user's role
/// - `PATCH /users/:email/suspend` - admin: suspend or reinstate
///
/// Role and suspension mutations invalidate the resolver cache for the
/// affected email before returning, so no stale role outlives the change.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::{require_role, Authenticated},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use lonify_shared::models::user::{Role, User};
use lonify_shared::models::{page_offset, Page, PAGE_SIZE};
use serde::{Deserialize, Serialize};

/// Pagination query
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// 1-based page number (default 1)
    pub page: Option<i64>,
}

/// Role lookup response
#[derive(Debug, Serialize, Deserialize)]
pub struct RoleResponse {
    pub role: Role,
}

/// Role change request
#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Role,
}

/// Suspension request
#[derive(Debug, Deserialize)]
pub struct SuspendRequest {
    /// True to suspend, false to reinstate
    pub suspended: bool,

    /// Reason recorded alongside a suspension
    pub reason: Option<String>,
}

/// Lists users, paginated (admin only)
pub async fn list_users(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Page<User>>> {
    require_role(&auth, &[Role::Admin])?;

    let page = query.page.unwrap_or(1).max(1);
    let users = User::list(&state.db, PAGE_SIZE, page_offset(page)).await?;
    let total = User::count(&state.db).await?;

    Ok(Json(Page::new(users, total, page)))
}

/// Looks up the role for an email
///
/// Public: the client's identity resolver calls this right after the
/// provider handshake, before it holds a session token. Answers through
/// the caching resolver, so the admin override applies and an unknown
/// email resolves to the default role instead of erroring.
pub async fn role_lookup(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = state.roles.resolve(&email).await;
    Ok(Json(RoleResponse { role }))
}

/// Changes a user's role (admin only)
pub async fn change_role(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(email): Path<String>,
    Json(req): Json<ChangeRoleRequest>,
) -> ApiResult<Json<User>> {
    require_role(&auth, &[Role::Admin])?;

    let user = User::set_role(&state.db, &email, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with email {}", email)))?;

    // No stale role may be read after the mutation.
    state.roles.invalidate(&email).await;

    tracing::info!(email = %email, role = %req.role, changed_by = %auth.email, "Changed user role");

    Ok(Json(user))
}

/// Suspends or reinstates a user (admin only)
pub async fn set_suspension(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(email): Path<String>,
    Json(req): Json<SuspendRequest>,
) -> ApiResult<Json<User>> {
    require_role(&auth, &[Role::Admin])?;

    let user = User::set_suspended(&state.db, &email, req.suspended, req.reason)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with email {}", email)))?;

    state.roles.invalidate(&email).await;

    tracing::info!(
        email = %email,
        suspended = req.suspended,
        changed_by = %auth.email,
        "Updated user suspension"
    );

    Ok(Json(user))
}
