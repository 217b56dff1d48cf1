/// Session and registration endpoints
///
/// The external identity provider owns sign-up, sign-in, and password
/// flows. This module covers what happens after the provider handshake:
///
/// - `POST /users` - the client registers (or refreshes) the account
///   record right after provider sign-up
/// - `POST /jwt` - exchanges the provider-verified principal for a signed
///   session token carrying the resolved role
///
/// # Endpoints
///
/// ```text
/// POST /jwt
/// Content-Type: application/json
///
/// { "email": "rina@example.com", "uid": "firebase-uid-123" }
/// ```
///
/// Response:
///
/// ```json
/// { "token": "eyJ...", "role": "borrower" }
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use lonify_shared::auth::jwt::{self, Claims};
use lonify_shared::models::user::{CreateUser, Role, User};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Token issuance request
#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    /// Email address of the provider-authenticated principal
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Identity-provider subject id
    #[validate(length(min = 1, max = 128, message = "uid must be 1-128 characters"))]
    pub uid: String,
}

/// Token issuance response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed session token (attach as `Authorization: Bearer <token>`)
    pub token: String,

    /// Role the token was issued with
    pub role: Role,
}

/// Registration request, sent by the client after provider sign-up
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Identity-provider subject id
    #[validate(length(min = 1, max = 128, message = "uid must be 1-128 characters"))]
    pub uid: String,

    /// Email address
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Optional display name
    #[validate(length(max = 255, message = "Name must be at most 255 characters"))]
    pub name: Option<String>,

    /// Optional profile photo URL
    #[validate(length(max = 512, message = "Photo URL must be at most 512 characters"))]
    pub photo_url: Option<String>,
}

/// Issues a session token for a provider-authenticated principal
///
/// The role is resolved through the caching resolver (admin override
/// first, then the stored role, defaulting to borrower) and embedded in
/// the token, so every subsequent request carries it without a lookup.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: validation failed
/// - `500 Internal Server Error`: token signing failed
pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> ApiResult<Json<TokenResponse>> {
    req.validate().map_err(ApiError::from)?;

    let role = state.roles.resolve(&req.email).await;

    let claims = Claims::new(&req.uid, &req.email, role);
    let token = jwt::create_token(&claims, state.jwt_secret())?;

    tracing::info!(email = %req.email, role = %role, "Issued session token");

    Ok(Json(TokenResponse { token, role }))
}

/// Registers a user account after identity-provider sign-up
///
/// Idempotent per email: a repeat call refreshes the profile fields and
/// never touches role or suspension.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: validation failed
/// - `500 Internal Server Error`: database error
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<User>> {
    req.validate().map_err(ApiError::from)?;

    let user = User::create(
        &state.db,
        CreateUser {
            uid: req.uid,
            email: req.email,
            name: req.name,
            photo_url: req.photo_url,
        },
    )
    .await?;

    tracing::info!(email = %user.email, "Registered user");

    Ok(Json(user))
}
