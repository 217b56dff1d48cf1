/// Fee payment setup endpoint
///
/// `POST /create-payment-intent` starts the fee-payment flow: it creates a
/// payment intent at the processor for the fixed application fee and
/// returns the opaque client secret. Card confirmation then happens
/// entirely in the processor's client library; on success the client
/// records the charge via `PATCH /loan-applications/:id/pay`.
///
/// A processor or network failure here is a `payment_setup_error` (502);
/// nothing has been charged and the client may simply retry.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    middleware::auth::Authenticated,
};
use axum::{extract::State, Json};
use lonify_shared::models::application::{FeeStatus, LoanApplication, WorkflowError};
use lonify_shared::payments::{APPLICATION_FEE_CENTS, FEE_CURRENCY};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment intent request
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
    /// Application the fee pays for
    pub application_id: Uuid,
}

/// Payment intent response
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateIntentResponse {
    /// Opaque secret handed to the processor's client library
    pub client_secret: String,

    /// Fee amount in minor units
    pub amount: i64,

    /// ISO currency code
    pub currency: String,
}

/// Creates a payment intent for an application's fee (owning borrower)
///
/// # Errors
///
/// - `403 Forbidden`: requester does not own the application
/// - `404 Not Found`: application does not resolve
/// - `409 already_paid`: the fee is already paid
/// - `409 conflict`: the application is in a status that no longer
///   accepts a fee payment
/// - `502 payment_setup_error`: processor or network failure
pub async fn create_payment_intent(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    Json(req): Json<CreateIntentRequest>,
) -> ApiResult<Json<CreateIntentResponse>> {
    let application = LoanApplication::find_by_id(&state.db, req.application_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!("Application {} not found", req.application_id))
        })?;

    if !application
        .applicant_email
        .eq_ignore_ascii_case(&auth.email)
    {
        return Err(WorkflowError::NotOwner.into());
    }
    if application.fee_status == FeeStatus::Paid {
        return Err(WorkflowError::AlreadyPaid.into());
    }
    if !application.status.fee_payable() {
        return Err(WorkflowError::FeeUnpayable(application.status).into());
    }

    let intent = state
        .payments
        .create_intent(APPLICATION_FEE_CENTS, FEE_CURRENCY, application.id)
        .await?;

    tracing::info!(
        application_id = %application.id,
        intent_id = %intent.id,
        amount = intent.amount,
        "Created application fee payment intent"
    );

    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
        amount: intent.amount,
        currency: intent.currency,
    }))
}
