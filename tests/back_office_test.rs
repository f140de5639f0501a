mod common;

use common::*;
use reqwest::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

#[tokio::test]
async fn health_endpoint_reports_healthy() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["dependencies"]["postgres"]["status"], "healthy");
}

#[tokio::test]
async fn registration_approval_gate_and_session_refresh() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Nico New", "nico@meridian.test").await;

    // Pending customers are locked out of money-moving routes
    let res = client
        .get(format!("{}/accounts", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Pending customers still resolve their session
    let res = client
        .post(format!("{}/session/refresh", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let identity: Value = res.json().await.unwrap();
    assert_eq!(identity["approval_status"], "pending");

    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;

    let res = client
        .post(format!("{}/session/refresh", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    let identity: Value = res.json().await.unwrap();
    assert_eq!(identity["approval_status"], "approved");

    // Now account opening works; the account starts pending
    let res = client
        .post(format!("{}/accounts", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "Checking" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let account: Value = res.json().await.unwrap();
    assert_eq!(account["status"], "pending");
    assert_eq!(dec(account["balance"].as_str().unwrap()), dec("0"));

    // Logout invalidates nothing server-side beyond the cache entry; the
    // next request re-resolves and still succeeds
    let res = client
        .post(format!("{}/session/logout", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn account_lifecycle_transitions_are_enforced() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops2@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Frankie", "frankie@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;

    let (account_id, _) =
        open_active_account(&client, &app.base_url, &token, &admin_token, "Main").await;

    // Approving an already-active account is a validation error
    let res = client
        .post(format!("{}/admin/accounts/{}/approve", app.base_url, account_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // freeze -> unfreeze round trip
    let res = client
        .post(format!("{}/admin/accounts/{}/freeze", app.base_url, account_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let account: Value = res.json().await.unwrap();
    assert_eq!(account["status"], "frozen");

    let res = client
        .post(format!(
            "{}/admin/accounts/{}/unfreeze",
            app.base_url, account_id
        ))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Closing requires a zero balance
    set_balance(&app.pool, account_id, "50").await;
    let res = client
        .post(format!("{}/admin/accounts/{}/close", app.base_url, account_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    set_balance(&app.pool, account_id, "0").await;
    let res = client
        .post(format!("{}/admin/accounts/{}/close", app.base_url, account_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let account: Value = res.json().await.unwrap();
    assert_eq!(account["status"], "closed");
}

#[tokio::test]
async fn deposit_requires_back_office_validation() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops3@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Devon", "devon@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;
    let (account_id, _) =
        open_active_account(&client, &app.base_url, &token, &admin_token, "Savings").await;

    let res = client
        .post(format!("{}/deposits", app.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "account_id": account_id,
            "amount": "750.25",
            "reference": "payroll august",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let deposit: Value = res.json().await.unwrap();
    let deposit_id = deposit["id"].as_str().unwrap();
    assert_eq!(deposit["status"], "pending");

    // No balance movement until validation
    assert_eq!(balance_of(&app.pool, account_id).await, dec("0"));

    let res = client
        .post(format!("{}/admin/deposits/{}/approve", app.base_url, deposit_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(balance_of(&app.pool, account_id).await, dec("750.25"));
    let (kind, amount): (String, bigdecimal::BigDecimal) =
        sqlx::query_as("SELECT kind, amount FROM transactions WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(kind, "deposit");
    assert_eq!(amount, dec("750.25"));

    // A second approval of the same request is rejected
    let res = client
        .post(format!("{}/admin/deposits/{}/approve", app.base_url, deposit_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(balance_of(&app.pool, account_id).await, dec("750.25"));
}

#[tokio::test]
async fn loan_application_quote_and_disbursement() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops4@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Lin", "lin@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;
    let (account_id, _) =
        open_active_account(&client, &app.base_url, &token, &admin_token, "Main").await;

    let res = client
        .post(format!("{}/loans", app.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "account_id": account_id,
            "principal": "12000",
            "annual_rate_bps": 600,
            "term_months": 12,
            "purpose": "car",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let loan: Value = res.json().await.unwrap();
    let loan_id = loan["id"].as_str().unwrap();
    assert_eq!(loan["status"], "pending");
    assert_eq!(loan["monthly_payment"], "1032.80");

    let res = client
        .post(format!("{}/admin/loans/{}/approve", app.base_url, loan_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(balance_of(&app.pool, account_id).await, dec("12000"));
    let (kind, amount): (String, bigdecimal::BigDecimal) =
        sqlx::query_as("SELECT kind, amount FROM transactions WHERE account_id = $1")
            .bind(account_id)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(kind, "loan_disbursement");
    assert_eq!(amount, dec("12000"));

    // Rejections never move money
    let res = client
        .post(format!("{}/loans", app.base_url))
        .bearer_auth(&token)
        .json(&json!({
            "account_id": account_id,
            "principal": "5000",
            "annual_rate_bps": 900,
            "term_months": 24,
            "purpose": "boat",
        }))
        .send()
        .await
        .unwrap();
    let second: Value = res.json().await.unwrap();

    let res = client
        .post(format!(
            "{}/admin/loans/{}/reject",
            app.base_url,
            second["id"].as_str().unwrap()
        ))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(balance_of(&app.pool, account_id).await, dec("12000"));
}

#[tokio::test]
async fn settlement_sweep_completes_pending_external_payments() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops5@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Pat", "pat@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;
    let (account_id, _) =
        open_active_account(&client, &app.base_url, &token, &admin_token, "Main").await;
    set_balance(&app.pool, account_id, "1000").await;

    for amount in ["100", "250"] {
        let res = client
            .post(format!("{}/transfers", app.base_url))
            .bearer_auth(&token)
            .json(&json!({
                "from_account_id": account_id,
                "kind": "external",
                "to_account_number": "GB29NWBK60161331926819",
                "recipient_name": "Acme Utilities",
                "amount": amount,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .post(format!("{}/admin/settlements/run", app.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    let settlement = &body["settlement"];
    assert_eq!(settlement["tx_count"], 2);
    assert_eq!(dec(settlement["total_amount"].as_str().unwrap()), dec("350"));

    let pending: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM transactions WHERE kind = 'payment' AND status = 'pending'",
    )
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(pending, 0);

    let pending_transfers: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM transfers WHERE status = 'pending'")
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(pending_transfers, 0);

    // Nothing left to settle
    let res = client
        .post(format!("{}/admin/settlements/run", app.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let body: Value = res.json().await.unwrap();
    assert!(body["settlement"].is_null());

    // The settlement shows up in the back-office listing
    let res = client
        .get(format!("{}/admin/settlements", app.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    let settlements: Vec<Value> = res.json().await.unwrap();
    assert_eq!(settlements.len(), 1);
}

#[tokio::test]
async fn admin_routes_reject_customers_and_anonymous_callers() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops6@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Quinn", "quinn@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;

    let res = client
        .get(format!("{}/admin/customers", app.base_url))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = client
        .get(format!("{}/admin/customers", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/admin/customers", app.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn audit_trail_and_transaction_report() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops7@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (customer_id, token) =
        register(&client, &app.base_url, "Rae", "rae@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, customer_id).await;
    let (account_id, _) =
        open_active_account(&client, &app.base_url, &token, &admin_token, "Main").await;

    // creation + approval both leave audit entries for the account
    let res = client
        .get(format!("{}/admin/audit/{}", app.base_url, account_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let entries: Vec<Value> = res.json().await.unwrap();
    assert!(entries.len() >= 2);
    assert!(entries.iter().any(|e| e["action"] == "created"));
    assert!(entries.iter().any(|e| e["action"] == "updated:status"));

    // report aggregates the ledger after a deposit lands
    set_balance(&app.pool, account_id, "0").await;
    let res = client
        .post(format!("{}/deposits", app.base_url))
        .bearer_auth(&token)
        .json(&json!({ "account_id": account_id, "amount": "80" }))
        .send()
        .await
        .unwrap();
    let deposit: Value = res.json().await.unwrap();
    client
        .post(format!(
            "{}/admin/deposits/{}/approve",
            app.base_url,
            deposit["id"].as_str().unwrap()
        ))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();

    let res = client
        .get(format!("{}/admin/reports/transactions", app.base_url))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let report: Value = res.json().await.unwrap();
    assert_eq!(report["status_counts"]["completed"], 1);
    assert_eq!(
        dec(report["totals_by_kind"]["deposit"].as_str().unwrap()),
        dec("80")
    );
}

#[tokio::test]
async fn duplicate_email_registration_is_rejected() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    register(&client, &app.base_url, "Sam One", "sam@meridian.test").await;

    let res = client
        .post(format!("{}/register", app.base_url))
        .json(&json!({ "full_name": "Sam Two", "email": "sam@meridian.test" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn customer_cannot_read_foreign_account_or_transfer() {
    let app = setup_test_app().await;
    let client = reqwest::Client::new();

    let (admin_id, admin_token) =
        register(&client, &app.base_url, "Avery Ops", "ops8@meridian.test").await;
    seed_admin(&app.pool, admin_id).await;

    let (owner_id, owner_token) =
        register(&client, &app.base_url, "Owner", "owner@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, owner_id).await;
    let (account_id, _) =
        open_active_account(&client, &app.base_url, &owner_token, &admin_token, "Main").await;

    let (other_id, other_token) =
        register(&client, &app.base_url, "Other", "other@meridian.test").await;
    approve_customer(&client, &app.base_url, &admin_token, other_id).await;

    let res = client
        .get(format!("{}/accounts/{}", app.base_url, account_id))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client
        .get(format!("{}/accounts/{}", app.base_url, account_id))
        .bearer_auth(&admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(format!("{}/transfers/{}", app.base_url, Uuid::new_v4()))
        .bearer_auth(&other_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}
