/// Application state and router builder
///
/// This module defines the shared application state and builds the Axum
/// router with all routes and middleware.
///
/// # Route map
///
/// ```text
/// /
/// ├── GET  /health                              # health check (public)
/// ├── GET  /public/loans                        # promoted catalog (public)
/// ├── POST /jwt                                 # session token issuance (public)
/// ├── POST /users                               # registration upsert (public)
/// ├── GET  /users                               # admin: paginated user list
/// ├── GET  /users/:email/role                   # role lookup (public)
/// ├── PATCH /users/:email/role                  # admin: change role
/// ├── PATCH /users/:email/suspend               # admin: toggle suspension
/// ├── GET/POST /loans                           # catalog list / author
/// ├── GET/PATCH/DELETE /loans/:id               # details / edit / delete
/// ├── PATCH /loans/:id/show                     # admin: visibility toggle
/// ├── POST/GET /loan-applications               # submit / list
/// ├── PATCH /loan-applications/bulk             # batch approve/reject
/// ├── PATCH /loan-applications/:id/approve      # manager/admin
/// ├── PATCH /loan-applications/:id/reject       # manager/admin
/// ├── PATCH /loan-applications/:id/cancel       # owning borrower
/// ├── PATCH /loan-applications/:id/pay          # owning borrower
/// └── POST /create-payment-intent               # owning borrower
/// ```
///
/// Authentication is not a router layer: handlers that need it take the
/// [`crate::middleware::auth::Authenticated`] extractor, which validates
/// the bearer token against the shared state. Public and authenticated
/// methods can therefore share a path (e.g. `/users/:email/role`).

use crate::{config::Config, middleware::security::SecurityHeadersLayer, routes};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Router,
};
use lonify_shared::auth::resolver::{AdminOverride, PgRoleSource, RoleResolver};
use lonify_shared::payments::PaymentGateway;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned into each request handler via Axum's `State` extractor; all
/// fields are cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Caching role resolver (the only process-wide mutable auth state)
    pub roles: Arc<RoleResolver>,

    /// Payment-processor gateway
    pub payments: Arc<dyn PaymentGateway>,
}

impl AppState {
    /// Creates new application state
    ///
    /// The role resolver is wired to the database-backed role source and
    /// the configured admin bootstrap override.
    pub fn new(db: PgPool, config: Config, payments: Arc<dyn PaymentGateway>) -> Self {
        let roles = RoleResolver::new(
            Arc::new(PgRoleSource::new(db.clone())),
            AdminOverride::new(config.policy.admin_email.clone()),
        );

        Self {
            db,
            config: Arc::new(config),
            roles: Arc::new(roles),
            payments,
        }
    }

    /// Gets the JWT secret for token operations
    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }
}

/// Builds the complete Axum router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(routes::health::health_check))
        // Session and registration
        .route("/jwt", post(routes::auth::issue_token))
        .route(
            "/users",
            post(routes::auth::register).get(routes::users::list_users),
        )
        .route(
            "/users/:email/role",
            get(routes::users::role_lookup).patch(routes::users::change_role),
        )
        .route("/users/:email/suspend", patch(routes::users::set_suspension))
        // Loan catalog
        .route("/public/loans", get(routes::loans::list_public_loans))
        .route(
            "/loans",
            get(routes::loans::list_loans).post(routes::loans::create_loan),
        )
        .route(
            "/loans/:id",
            get(routes::loans::get_loan)
                .patch(routes::loans::update_loan)
                .delete(routes::loans::delete_loan),
        )
        .route("/loans/:id/show", patch(routes::loans::toggle_visibility))
        // Application workflow
        .route(
            "/loan-applications",
            post(routes::applications::submit).get(routes::applications::list),
        )
        .route(
            "/loan-applications/bulk",
            patch(routes::applications::bulk_review),
        )
        .route(
            "/loan-applications/:id/approve",
            patch(routes::applications::approve),
        )
        .route(
            "/loan-applications/:id/reject",
            patch(routes::applications::reject),
        )
        .route(
            "/loan-applications/:id/cancel",
            patch(routes::applications::cancel),
        )
        .route("/loan-applications/:id/pay", patch(routes::applications::pay))
        // Fee payment
        .route(
            "/create-payment-intent",
            post(routes::payments::create_payment_intent),
        );

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.contains(&"*".to_string()) {
        // Development mode: permissive CORS
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}
