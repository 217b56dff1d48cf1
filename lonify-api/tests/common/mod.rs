/// Common test utilities for integration tests
///
/// Provides shared infrastructure:
/// - Test database setup (migrations run on first use)
/// - Test user creation with roles
/// - Session token minting
/// - A small request helper around the in-process router
///
/// Integration tests need a PostgreSQL instance: set `DATABASE_URL` to run
/// them; without it every test skips with a notice rather than failing.
/// Tests scope their data with per-run unique emails and titles so they
/// can share one database.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use lonify_api::app::{build_router, AppState};
use lonify_api::config::{
    ApiConfig, Config, DatabaseConfig, JwtConfig, PaymentConfig, PolicyConfig,
};
use lonify_shared::auth::jwt::{create_token, Claims};
use lonify_shared::models::user::{CreateUser, Role, User};
use lonify_shared::payments::MockGateway;
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tower::Service as _;
use uuid::Uuid;

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,

    /// Unique suffix scoping this test run's data
    pub run_id: String,

    pub borrower_email: String,
    pub manager_email: String,
    pub admin_email: String,
}

impl TestContext {
    /// Creates a test context, or `None` when no database is configured
    pub async fn new() -> anyhow::Result<Option<Self>> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set; skipping integration test");
            return Ok(None);
        };

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.clone(),
                max_connections: 5,
            },
            jwt: JwtConfig {
                secret: "integration-test-secret-0123456789abcdef".to_string(),
            },
            policy: PolicyConfig { admin_email: None },
            payment: PaymentConfig {
                secret_key: "sk_test_integration".to_string(),
                api_base: None,
            },
        };

        let db = PgPool::connect(&database_url).await?;

        // Path relative to this crate's Cargo.toml
        sqlx::migrate!("../migrations").run(&db).await?;

        let state = AppState::new(db.clone(), config.clone(), Arc::new(MockGateway::new()));
        let app = build_router(state);

        let run_id = Uuid::new_v4().simple().to_string();
        let borrower_email = format!("borrower-{}@test.lonify.app", run_id);
        let manager_email = format!("manager-{}@test.lonify.app", run_id);
        let admin_email = format!("admin-{}@test.lonify.app", run_id);

        let ctx = Self {
            db,
            app,
            config,
            run_id,
            borrower_email,
            manager_email,
            admin_email,
        };

        ctx.create_user(&ctx.borrower_email, Role::Borrower).await?;
        ctx.create_user(&ctx.manager_email, Role::Manager).await?;
        ctx.create_user(&ctx.admin_email, Role::Admin).await?;

        Ok(Some(ctx))
    }

    /// Creates a user record with the given role
    pub async fn create_user(&self, email: &str, role: Role) -> anyhow::Result<User> {
        let user = User::create(
            &self.db,
            CreateUser {
                uid: format!("uid-{}", email),
                email: email.to_string(),
                name: Some("Test User".to_string()),
                photo_url: None,
            },
        )
        .await?;

        if role == Role::Borrower {
            return Ok(user);
        }

        let user = User::set_role(&self.db, email, role)
            .await?
            .expect("user just created");
        Ok(user)
    }

    /// Mints a session token the way `POST /jwt` would
    pub fn token_for(&self, email: &str, role: Role) -> String {
        let claims = Claims::new(&format!("uid-{}", email), email, role);
        create_token(&claims, &self.config.jwt.secret).expect("token creation")
    }

    /// Sends a request through the in-process router and parses the body
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");

        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = builder
            .body(match body {
                Some(value) => Body::from(value.to_string()),
                None => Body::empty(),
            })
            .expect("request build");

        let response = self
            .app
            .clone()
            .call(request)
            .await
            .expect("router call is infallible");

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body read");

        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    /// Removes the rows this run created
    ///
    /// Deleting the loans cascades to their applications.
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM loan_products WHERE created_by LIKE $1")
            .bind(format!("%{}@test.lonify.app", self.run_id))
            .execute(&self.db)
            .await?;

        sqlx::query("DELETE FROM users WHERE email LIKE $1")
            .bind(format!("%{}@test.lonify.app", self.run_id))
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

/// Creates a loan product via the API as the context's manager
pub async fn create_test_loan(ctx: &TestContext, title: &str, show_on_home: bool) -> Value {
    let token = ctx.token_for(&ctx.manager_email, Role::Manager);

    let (status, body) = ctx
        .request(
            Method::POST,
            "/loans",
            Some(&token),
            Some(serde_json::json!({
                "title": title,
                "category": "Personal",
                "interest_rate": 5.9,
                "min_limit": 100.0,
                "max_limit": 500.0,
                "description": "Integration test loan product",
                "emi_plans": [6, 12],
                "required_documents": ["National ID"],
                "show_on_home": show_on_home
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "loan creation failed: {}", body);
    body
}

/// Submits an application for the loan as the context's borrower
pub async fn submit_test_application(ctx: &TestContext, loan_id: &str) -> Value {
    let token = ctx.token_for(&ctx.borrower_email, Role::Borrower);

    let (status, body) = ctx
        .request(
            Method::POST,
            "/loan-applications",
            Some(&token),
            Some(serde_json::json!({
                "loan_id": loan_id,
                "first_name": "Rina",
                "last_name": "Akter",
                "contact_number": "+8801700000000",
                "national_id": "1234567890",
                "income_source": "Salary",
                "monthly_income": 900.0,
                "loan_amount": 250.0,
                "reason": "Working capital",
                "address": "12 Lake Road, Dhaka"
            })),
        )
        .await;

    assert_eq!(status, StatusCode::OK, "submission failed: {}", body);
    body
}
