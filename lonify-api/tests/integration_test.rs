/// Integration tests for the Lonify API
///
/// These verify the system end-to-end against a real database:
/// - The borrower scenario: submit → pay fee → approve → cancel refused
/// - Fee payment idempotency
/// - Bulk review over a mixed batch
/// - Catalog validation and visibility
/// - Role guards and role-change cache invalidation
///
/// Requires `DATABASE_URL`; each test skips quietly when it is unset.

mod common;

use axum::http::{Method, StatusCode};
use common::{create_test_loan, submit_test_application, TestContext};
use lonify_shared::models::user::Role;
use serde_json::json;

/// Full borrower scenario across the application lifecycle
#[tokio::test]
async fn test_borrower_scenario_end_to_end() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let loan = create_test_loan(&ctx, &format!("Personal Starter {}", ctx.run_id), false).await;
    let loan_id = loan["id"].as_str().unwrap().to_string();
    assert_eq!(loan["interest_rate"].as_f64().unwrap(), 5.9);

    // Submit: pending, fee unpaid
    let application = submit_test_application(&ctx, &loan_id).await;
    let app_id = application["id"].as_str().unwrap().to_string();
    assert_eq!(application["status"], "pending");
    assert_eq!(application["fee_status"], "unpaid");
    assert_eq!(application["loan_title"], loan["title"]);

    let borrower = ctx.token_for(&ctx.borrower_email, Role::Borrower);
    let manager = ctx.token_for(&ctx.manager_email, Role::Manager);

    // Payment setup returns a client secret from the (mock) processor
    let (status, intent) = ctx
        .request(
            Method::POST,
            "/create-payment-intent",
            Some(&borrower),
            Some(json!({ "application_id": app_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", intent);
    assert!(intent["client_secret"].as_str().unwrap().contains("secret"));
    assert_eq!(intent["amount"].as_i64().unwrap(), 1000);

    // Record the fee: status unchanged, fee paid
    let transaction_id = format!("pi_test_{}", ctx.run_id);
    let (status, paid) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/pay", app_id),
            Some(&borrower),
            Some(json!({ "transaction_id": transaction_id })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", paid);
    assert_eq!(paid["status"], "pending");
    assert_eq!(paid["fee_status"], "paid");
    assert_eq!(paid["transaction_id"], json!(transaction_id));
    assert!(!paid["paid_at"].is_null());

    // Replaying the recording step answers already_paid
    let (status, replay) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/pay", app_id),
            Some(&borrower),
            Some(json!({ "transaction_id": transaction_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(replay["error"], "already_paid");

    // Manager approves: approved_at is stamped
    let (status, approved) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/approve", app_id),
            Some(&manager),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", approved);
    assert_eq!(approved["status"], "approved");
    assert!(!approved["approved_at"].is_null());

    // Cancel after approval must fail: terminal state, state unchanged
    let (status, refused) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/cancel", app_id),
            Some(&borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(refused["error"], "conflict");

    let (_, listed) = ctx
        .request(
            Method::GET,
            "/loan-applications?status=approved",
            Some(&borrower),
            None,
        )
        .await;
    let items = listed["items"].as_array().unwrap();
    assert!(items.iter().any(|a| a["id"] == json!(app_id)));

    ctx.cleanup().await.unwrap();
}

/// Bulk review over a mixed batch: terminal items are skipped, not errors
#[tokio::test]
async fn test_bulk_review_mixed_batch() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let loan = create_test_loan(&ctx, &format!("Bulk Loan {}", ctx.run_id), false).await;
    let loan_id = loan["id"].as_str().unwrap().to_string();

    let mut ids = Vec::new();
    for _ in 0..5 {
        let application = submit_test_application(&ctx, &loan_id).await;
        ids.push(application["id"].as_str().unwrap().to_string());
    }

    let manager = ctx.token_for(&ctx.manager_email, Role::Manager);

    // Pre-approve two of the five
    for id in ids.iter().take(2) {
        let (status, _) = ctx
            .request(
                Method::PATCH,
                &format!("/loan-applications/{}/approve", id),
                Some(&manager),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    // Bulk-approve all five: 3 applied, 2 skipped, no batch-level error
    let (status, outcome) = ctx
        .request(
            Method::PATCH,
            "/loan-applications/bulk",
            Some(&manager),
            Some(json!({ "action": "approve", "ids": ids })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", outcome);
    assert_eq!(outcome["applied"].as_u64().unwrap(), 3);
    assert_eq!(outcome["skipped"].as_u64().unwrap(), 2);

    ctx.cleanup().await.unwrap();
}

/// Catalog validation: inverted limits are rejected with field details
#[tokio::test]
async fn test_create_loan_validation() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let manager = ctx.token_for(&ctx.manager_email, Role::Manager);

    let (status, body) = ctx
        .request(
            Method::POST,
            "/loans",
            Some(&manager),
            Some(json!({
                "title": format!("Broken Loan {}", ctx.run_id),
                "category": "Personal",
                "interest_rate": 5.9,
                "min_limit": 500.0,
                "max_limit": 100.0,
                "description": "min above max"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");

    // The ordered variant succeeds
    create_test_loan(&ctx, &format!("Valid Loan {}", ctx.run_id), false).await;

    // Borrowers cannot author loans at all
    let borrower = ctx.token_for(&ctx.borrower_email, Role::Borrower);
    let (status, body) = ctx
        .request(
            Method::POST,
            "/loans",
            Some(&borrower),
            Some(json!({
                "title": "Nope",
                "category": "Personal",
                "interest_rate": 1.0,
                "min_limit": 1.0,
                "max_limit": 2.0,
                "description": "x"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    ctx.cleanup().await.unwrap();
}

/// Public catalog only exposes promoted products
#[tokio::test]
async fn test_public_catalog_visibility() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let promoted_title = format!("Promoted {}", ctx.run_id);
    let hidden_title = format!("Hidden {}", ctx.run_id);
    create_test_loan(&ctx, &promoted_title, true).await;
    create_test_loan(&ctx, &hidden_title, false).await;

    // Public listing, scoped to this run via the search filter
    let (status, body) = ctx
        .request(
            Method::GET,
            &format!("/public/loans?search={}", ctx.run_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["title"].as_str().unwrap())
        .collect();
    assert!(titles.contains(&promoted_title.as_str()));
    assert!(!titles.contains(&hidden_title.as_str()));

    // Authenticated listing sees the full set
    let borrower = ctx.token_for(&ctx.borrower_email, Role::Borrower);
    let (status, body) = ctx
        .request(
            Method::GET,
            &format!("/loans?search={}", ctx.run_id),
            Some(&borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    ctx.cleanup().await.unwrap();
}

/// Role guards: missing token is 401, wrong role is 403, admin passes
#[tokio::test]
async fn test_role_guards_on_admin_endpoints() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let (status, _) = ctx.request(Method::GET, "/users", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let borrower = ctx.token_for(&ctx.borrower_email, Role::Borrower);
    let (status, body) = ctx.request(Method::GET, "/users", Some(&borrower), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let admin = ctx.token_for(&ctx.admin_email, Role::Admin);
    let (status, body) = ctx.request(Method::GET, "/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["items"].is_array());
    assert!(body["page_count"].as_i64().unwrap() >= 1);

    ctx.cleanup().await.unwrap();
}

/// Role change propagates: the resolver cache is invalidated and the next
/// lookup and token issuance see the new role
#[tokio::test]
async fn test_role_change_invalidates_lookup() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let email = format!("promotee-{}@test.lonify.app", ctx.run_id);
    ctx.create_user(&email, Role::Borrower).await.unwrap();

    // Warm the resolver cache through the public lookup
    let (status, body) = ctx
        .request(Method::GET, &format!("/users/{}/role", email), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "borrower");

    // Admin promotes the user
    let admin = ctx.token_for(&ctx.admin_email, Role::Admin);
    let (status, body) = ctx
        .request(
            Method::PATCH,
            &format!("/users/{}/role", email),
            Some(&admin),
            Some(json!({ "role": "manager" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    // The stale cached role must not survive the change
    let (_, body) = ctx
        .request(Method::GET, &format!("/users/{}/role", email), None, None)
        .await;
    assert_eq!(body["role"], "manager");

    // Token issuance picks up the new role too
    let (status, body) = ctx
        .request(
            Method::POST,
            "/jwt",
            None,
            Some(json!({ "email": email, "uid": "uid-promotee" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "manager");

    ctx.cleanup().await.unwrap();
}

/// Ownership: only the applicant may cancel or pay
#[tokio::test]
async fn test_cancel_requires_ownership() {
    let Some(ctx) = TestContext::new().await.unwrap() else {
        return;
    };

    let loan = create_test_loan(&ctx, &format!("Owned Loan {}", ctx.run_id), false).await;
    let loan_id = loan["id"].as_str().unwrap().to_string();
    let application = submit_test_application(&ctx, &loan_id).await;
    let app_id = application["id"].as_str().unwrap().to_string();

    let other_email = format!("other-{}@test.lonify.app", ctx.run_id);
    ctx.create_user(&other_email, Role::Borrower).await.unwrap();
    let other = ctx.token_for(&other_email, Role::Borrower);

    let (status, body) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/cancel", app_id),
            Some(&other),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/pay", app_id),
            Some(&other),
            Some(json!({ "transaction_id": "pi_stolen" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "{}", body);

    // The owner can still cancel
    let borrower = ctx.token_for(&ctx.borrower_email, Role::Borrower);
    let (status, body) = ctx
        .request(
            Method::PATCH,
            &format!("/loan-applications/{}/cancel", app_id),
            Some(&borrower),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["status"], "canceled");

    ctx.cleanup().await.unwrap();
}
