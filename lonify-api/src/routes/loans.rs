/// Loan catalog endpoints
///
/// - `GET /public/loans` - promoted catalog for the landing page, no auth
/// - `GET /loans` - full catalog (authenticated)
/// - `GET /loans/:id` - product details
/// - `POST /loans` - author a product (manager/admin)
/// - `PATCH /loans/:id` - partial update (authoring manager or admin)
/// - `DELETE /loans/:id` - delete, cascading to applications
/// - `PATCH /loans/:id/show` - landing-page visibility toggle (admin)
///
/// Both listings accept `?search=` (title/description substring) and
/// `?category=` (exact match); the criteria combine with AND.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::{require_role, Authenticated},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use lonify_shared::auth::middleware::AuthContext;
use lonify_shared::models::loan::{
    validate_terms, CreateLoanProduct, LoanFilter, LoanProduct, UpdateLoanProduct,
};
use lonify_shared::models::user::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Catalog listing query
#[derive(Debug, Deserialize)]
pub struct LoanQuery {
    /// Free-text substring against title or description
    pub search: Option<String>,

    /// Exact category match
    pub category: Option<String>,
}

impl LoanQuery {
    fn into_filter(self) -> LoanFilter {
        LoanFilter {
            search: self.search.filter(|s| !s.trim().is_empty()),
            category: self.category.filter(|c| !c.trim().is_empty()),
        }
    }
}

/// Create-loan request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLoanRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: String,

    /// Interest rate, percent
    pub interest_rate: f64,

    /// Minimum amount that can be requested
    pub min_limit: f64,

    /// Maximum amount that can be requested
    pub max_limit: f64,

    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,

    #[validate(length(max = 512, message = "Image URL must be at most 512 characters"))]
    pub image_url: Option<String>,

    /// EMI tenure options, months
    #[serde(default)]
    pub emi_plans: Vec<i32>,

    /// Document names the applicant must provide
    #[serde(default)]
    pub required_documents: Vec<String>,

    /// Landing-page promotion flag
    #[serde(default)]
    pub show_on_home: bool,
}

/// Partial-update request; only present fields are written
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateLoanRequest {
    #[validate(length(min = 1, max = 255, message = "Title must be 1-255 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 100, message = "Category must be 1-100 characters"))]
    pub category: Option<String>,

    pub interest_rate: Option<f64>,
    pub min_limit: Option<f64>,
    pub max_limit: Option<f64>,

    #[validate(length(min = 1, message = "Description must not be empty"))]
    pub description: Option<String>,

    #[validate(length(max = 512, message = "Image URL must be at most 512 characters"))]
    pub image_url: Option<String>,

    pub emi_plans: Option<Vec<i32>>,
    pub required_documents: Option<Vec<String>>,
}

/// Visibility toggle request
#[derive(Debug, Deserialize)]
pub struct ToggleVisibilityRequest {
    pub show_on_home: bool,
}

/// Delete response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteLoanResponse {
    pub deleted: bool,
}

/// Lists promoted loan products for the landing page (public)
pub async fn list_public_loans(
    State(state): State<AppState>,
    Query(query): Query<LoanQuery>,
) -> ApiResult<Json<Vec<LoanProduct>>> {
    let loans = LoanProduct::list(&state.db, &query.into_filter(), true).await?;
    Ok(Json(loans))
}

/// Lists the full catalog regardless of visibility flag (authenticated)
pub async fn list_loans(
    State(state): State<AppState>,
    Authenticated(_auth): Authenticated,
    Query(query): Query<LoanQuery>,
) -> ApiResult<Json<Vec<LoanProduct>>> {
    let loans = LoanProduct::list(&state.db, &query.into_filter(), false).await?;
    Ok(Json(loans))
}

/// Fetches one loan product
pub async fn get_loan(
    State(state): State<AppState>,
    Authenticated(_auth): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanProduct>> {
    let loan = LoanProduct::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", id)))?;

    Ok(Json(loan))
}

/// Creates a loan product (manager/admin)
///
/// # Errors
///
/// - `403 Forbidden`: requester cannot author loans
/// - `422 Unprocessable Entity`: shape validation or terms validation
///   failed (negative rate/limits, min above max, non-positive tenure)
pub async fn create_loan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(req): Json<CreateLoanRequest>,
) -> ApiResult<Json<LoanProduct>> {
    require_role(&auth, &[Role::Manager, Role::Admin])?;

    req.validate().map_err(ApiError::from)?;
    validate_terms(req.interest_rate, req.min_limit, req.max_limit, &req.emi_plans)?;

    let loan = LoanProduct::create(
        &state.db,
        CreateLoanProduct {
            title: req.title,
            category: req.category,
            interest_rate: req.interest_rate,
            min_limit: req.min_limit,
            max_limit: req.max_limit,
            description: req.description,
            image_url: req.image_url,
            emi_plans: req.emi_plans,
            required_documents: req.required_documents,
            show_on_home: req.show_on_home,
            created_by: auth.email.clone(),
        },
    )
    .await?;

    tracing::info!(loan_id = %loan.id, created_by = %auth.email, "Created loan product");

    Ok(Json(loan))
}

/// Applies a partial update to a loan product
///
/// Only the authoring manager or an admin may update a product. Patched
/// terms are re-validated against the effective (patched-over-existing)
/// values so an update can never leave the limits inverted.
pub async fn update_loan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLoanRequest>,
) -> ApiResult<Json<LoanProduct>> {
    let existing = require_loan_authorship(&state, &auth, id).await?;

    req.validate().map_err(ApiError::from)?;

    let effective_rate = req.interest_rate.unwrap_or(existing.interest_rate);
    let effective_min = req.min_limit.unwrap_or(existing.min_limit);
    let effective_max = req.max_limit.unwrap_or(existing.max_limit);
    let effective_plans = req.emi_plans.as_deref().unwrap_or(&existing.emi_plans);
    validate_terms(effective_rate, effective_min, effective_max, effective_plans)?;

    let loan = LoanProduct::update(
        &state.db,
        id,
        UpdateLoanProduct {
            title: req.title,
            category: req.category,
            interest_rate: req.interest_rate,
            min_limit: req.min_limit,
            max_limit: req.max_limit,
            description: req.description,
            image_url: req.image_url,
            emi_plans: req.emi_plans,
            required_documents: req.required_documents,
        },
    )
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", id)))?;

    Ok(Json(loan))
}

/// Deletes a loan product and, via cascade, all of its applications
///
/// Destructive: the client warns the user before calling this.
pub async fn delete_loan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteLoanResponse>> {
    require_loan_authorship(&state, &auth, id).await?;

    let deleted = LoanProduct::delete(&state.db, id).await?;
    if !deleted {
        return Err(ApiError::NotFound(format!("Loan {} not found", id)));
    }

    tracing::info!(loan_id = %id, deleted_by = %auth.email, "Deleted loan product and its applications");

    Ok(Json(DeleteLoanResponse { deleted: true }))
}

/// Toggles a loan product's landing-page visibility (admin only)
pub async fn toggle_visibility(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleVisibilityRequest>,
) -> ApiResult<Json<LoanProduct>> {
    require_role(&auth, &[Role::Admin])?;

    let loan = LoanProduct::set_show_on_home(&state.db, id, req.show_on_home)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", id)))?;

    Ok(Json(loan))
}

/// Loads a loan and verifies the requester may modify it
///
/// Admins may modify any product; a manager only their own.
async fn require_loan_authorship(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
) -> ApiResult<LoanProduct> {
    require_role(auth, &[Role::Manager, Role::Admin])?;

    let loan = LoanProduct::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", id)))?;

    if auth.role != Role::Admin && !loan.created_by.eq_ignore_ascii_case(&auth.email) {
        return Err(ApiError::Forbidden(
            "Only the authoring manager or an admin may modify this loan".to_string(),
        ));
    }

    Ok(loan)
}
