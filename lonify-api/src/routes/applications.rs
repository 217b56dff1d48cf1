/// Loan application workflow endpoints
///
/// - `POST /loan-applications` - borrower submits an application
/// - `GET /loan-applications?status=&page=` - list; borrowers see their
///   own, managers/admins see all
/// - `PATCH /loan-applications/:id/approve` - manager/admin
/// - `PATCH /loan-applications/:id/reject` - manager/admin
/// - `PATCH /loan-applications/:id/cancel` - owning borrower
/// - `PATCH /loan-applications/:id/pay` - owning borrower records the fee
/// - `PATCH /loan-applications/bulk` - batch approve/reject
///
/// Every transition is validated by the state machine in
/// `lonify_shared::models::application`; an undefined transition answers
/// 409 and leaves the application untouched.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    middleware::auth::{require_role, Authenticated},
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use lonify_shared::models::application::{
    ApplicationFilter, ApplicationStatus, BulkOutcome, CreateApplication, LoanApplication,
    ReviewAction,
};
use lonify_shared::models::loan::LoanProduct;
use lonify_shared::models::user::{Role, User};
use lonify_shared::models::{page_offset, Page, PAGE_SIZE};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Submission request; applicant identity and loan terms are filled in
/// server-side
#[derive(Debug, Deserialize, Validate)]
pub struct SubmitApplicationRequest {
    /// Loan product being applied for
    pub loan_id: Uuid,

    #[validate(length(min = 1, max = 100, message = "First name is required"))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100, message = "Last name is required"))]
    pub last_name: String,

    #[validate(length(min = 1, max = 50, message = "Contact number is required"))]
    pub contact_number: String,

    #[validate(length(min = 1, max = 100, message = "National id is required"))]
    pub national_id: String,

    #[validate(length(min = 1, max = 255, message = "Income source is required"))]
    pub income_source: String,

    #[validate(range(min = 0.0, message = "Monthly income must not be negative"))]
    pub monthly_income: f64,

    /// Requested amount; must fall within the product's limits
    pub loan_amount: f64,

    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,

    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,

    pub extra_notes: Option<String>,
}

/// Listing query
#[derive(Debug, Deserialize)]
pub struct ApplicationQuery {
    /// Exact status match; omit for "All"
    pub status: Option<ApplicationStatus>,

    /// 1-based page number (default 1)
    pub page: Option<i64>,
}

/// Fee payment request
#[derive(Debug, Deserialize, Validate)]
pub struct PayRequest {
    /// Processor transaction id from the confirmed charge
    #[validate(length(min = 1, max = 255, message = "Transaction id is required"))]
    pub transaction_id: String,
}

/// Batch review request
#[derive(Debug, Deserialize)]
pub struct BulkReviewRequest {
    /// Decision applied to every item
    pub action: ReviewAction,

    /// Applications to review; each is validated independently
    pub ids: Vec<Uuid>,
}

/// Submits a loan application (borrower)
///
/// Creates the record in `pending` status with an unpaid fee, copying the
/// product title and rate at submission time. Suspended accounts may not
/// submit.
///
/// # Errors
///
/// - `403 Forbidden`: requester is not a borrower, or is suspended
/// - `404 Not Found`: loan product does not resolve
/// - `422 Unprocessable Entity`: field validation failed, or the amount is
///   outside the product's limits
pub async fn submit(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(req): Json<SubmitApplicationRequest>,
) -> ApiResult<Json<LoanApplication>> {
    require_role(&auth, &[Role::Borrower])?;

    req.validate().map_err(ApiError::from)?;

    if let Some(user) = User::find_by_email(&state.db, &auth.email).await? {
        if user.suspended {
            return Err(ApiError::Forbidden(
                "Suspended accounts cannot submit applications".to_string(),
            ));
        }
    }

    let loan = LoanProduct::find_by_id(&state.db, req.loan_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Loan {} not found", req.loan_id)))?;

    if req.loan_amount < loan.min_limit || req.loan_amount > loan.max_limit {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "loan_amount".to_string(),
            message: format!(
                "Amount must be between {} and {}",
                loan.min_limit, loan.max_limit
            ),
        }]));
    }

    let application = LoanApplication::create(
        &state.db,
        CreateApplication {
            loan_id: loan.id,
            loan_title: loan.title.clone(),
            interest_rate: loan.interest_rate,
            applicant_uid: auth.uid.clone(),
            applicant_email: auth.email.clone(),
            first_name: req.first_name,
            last_name: req.last_name,
            contact_number: req.contact_number,
            national_id: req.national_id,
            income_source: req.income_source,
            monthly_income: req.monthly_income,
            loan_amount: req.loan_amount,
            reason: req.reason,
            address: req.address,
            extra_notes: req.extra_notes,
        },
    )
    .await?;

    tracing::info!(
        application_id = %application.id,
        loan_id = %loan.id,
        applicant = %auth.email,
        "Submitted loan application"
    );

    Ok(Json(application))
}

/// Lists applications, paginated, optionally filtered by status
///
/// Borrowers are always restricted to their own applications; reviewer
/// roles see everyone's.
pub async fn list(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Query(query): Query<ApplicationQuery>,
) -> ApiResult<Json<Page<LoanApplication>>> {
    let filter = ApplicationFilter {
        applicant_email: if auth.role.can_review_applications() {
            None
        } else {
            Some(auth.email.clone())
        },
        status: query.status,
    };

    let page = query.page.unwrap_or(1).max(1);
    let applications =
        LoanApplication::list(&state.db, &filter, PAGE_SIZE, page_offset(page)).await?;
    let total = LoanApplication::count(&state.db, &filter).await?;

    Ok(Json(Page::new(applications, total, page)))
}

/// Approves a pending application (manager/admin)
pub async fn approve(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanApplication>> {
    require_role(&auth, &[Role::Manager, Role::Admin])?;

    let application = LoanApplication::approve(&state.db, id).await?;

    tracing::info!(application_id = %id, reviewer = %auth.email, "Approved application");

    Ok(Json(application))
}

/// Rejects a pending application (manager/admin)
pub async fn reject(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanApplication>> {
    require_role(&auth, &[Role::Manager, Role::Admin])?;

    let application = LoanApplication::reject(&state.db, id).await?;

    tracing::info!(application_id = %id, reviewer = %auth.email, "Rejected application");

    Ok(Json(application))
}

/// Cancels a pending application (owning borrower)
pub async fn cancel(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LoanApplication>> {
    let application = LoanApplication::cancel(&state.db, id, &auth.email).await?;

    tracing::info!(application_id = %id, applicant = %auth.email, "Canceled application");

    Ok(Json(application))
}

/// Records a confirmed fee payment (owning borrower)
///
/// The sole path by which the fee becomes `paid`. Only called after the
/// processor reports a successful charge; replays answer 409
/// `already_paid` while exactly one paid record remains, so retrying the
/// recording step after a charge is safe.
pub async fn pay(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Path(id): Path<Uuid>,
    Json(req): Json<PayRequest>,
) -> ApiResult<Json<LoanApplication>> {
    req.validate().map_err(ApiError::from)?;

    let application =
        LoanApplication::record_payment(&state.db, id, &auth.email, &req.transaction_id).await?;

    tracing::info!(
        application_id = %id,
        transaction_id = %req.transaction_id,
        "Recorded application fee payment"
    );

    Ok(Json(application))
}

/// Applies approve/reject to a batch of applications (manager/admin)
///
/// Partial-failure tolerant: items already terminal are skipped, never
/// errored, and the response reports how many were applied vs skipped.
pub async fn bulk_review(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(req): Json<BulkReviewRequest>,
) -> ApiResult<Json<BulkOutcome>> {
    require_role(&auth, &[Role::Manager, Role::Admin])?;

    if req.ids.is_empty() {
        return Err(ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "ids".to_string(),
            message: "At least one application id is required".to_string(),
        }]));
    }

    let outcome = LoanApplication::bulk_review(&state.db, &req.ids, req.action).await?;

    tracing::info!(
        action = ?req.action,
        applied = outcome.applied,
        skipped = outcome.skipped,
        reviewer = %auth.email,
        "Applied bulk review"
    );

    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_request_validation() {
        let valid = submit_request();
        assert!(valid.validate().is_ok());

        let missing_name = SubmitApplicationRequest {
            first_name: String::new(),
            ..submit_request()
        };
        assert!(missing_name.validate().is_err());

        let negative_income = SubmitApplicationRequest {
            monthly_income: -1.0,
            ..submit_request()
        };
        assert!(negative_income.validate().is_err());
    }

    #[test]
    fn test_bulk_request_deserialization() {
        let req: BulkReviewRequest = serde_json::from_str(
            r#"{"action":"approve","ids":["550e8400-e29b-41d4-a716-446655440000"]}"#,
        )
        .unwrap();
        assert_eq!(req.action, ReviewAction::Approve);
        assert_eq!(req.ids.len(), 1);
    }

    fn submit_request() -> SubmitApplicationRequest {
        SubmitApplicationRequest {
            loan_id: Uuid::new_v4(),
            first_name: "Rina".to_string(),
            last_name: "Akter".to_string(),
            contact_number: "+8801700000000".to_string(),
            national_id: "1234567890".to_string(),
            income_source: "Salary".to_string(),
            monthly_income: 900.0,
            loan_amount: 250.0,
            reason: "Working capital".to_string(),
            address: "12 Lake Road, Dhaka".to_string(),
            extra_notes: None,
        }
    }
}
