//! Transaction and payment link creation against scripted gateway responses.

mod common;

use clinic_payments::error::AppError;
use clinic_payments::gateway::GatewayError;
use clinic_payments::gateway::types::GatewayStatus;
use clinic_payments::models::payment::{CreatePaymentLinkRequest, CreateTransactionRequest};
use clinic_payments::models::payment_transaction::TransactionStatus;
use clinic_payments::models::purchase::PurchaseStatus;
use clinic_payments::services::{payment_link_service, transaction_service};
use common::{TestApp, gateway_tx, validation_error};
use serde_json::json;
use uuid::Uuid;

fn request(value: serde_json::Value) -> CreateTransactionRequest {
    serde_json::from_value(value).expect("valid request json")
}

#[tokio::test]
async fn approved_transaction_completes_purchase() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Ok(gateway_tx("1234-1610641025-49201", "APPROVED")));

    let response = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .expect("transaction created");

    assert!(response.success);
    assert_eq!(response.status, GatewayStatus::Approved);
    assert_eq!(response.ledger_status, TransactionStatus::Completed);
    assert_eq!(app.gateway.transaction_calls(), 1);

    let purchase = app.ledger.purchase(response.purchase_id);
    assert_eq!(purchase.payment_status, PurchaseStatus::Completed);
    assert_eq!(purchase.customer_email, "ana@example.com");
    assert_eq!(purchase.payment_method.as_deref(), Some("CARD"));
    assert_eq!(
        purchase.transaction_reference.as_deref(),
        Some("1234-1610641025-49201")
    );
    assert!(purchase.expires_at.is_some());

    let tx = app
        .ledger
        .transaction("1234-1610641025-49201")
        .expect("transaction recorded");
    assert_eq!(tx.purchase_id, purchase.id);
    assert_eq!(tx.status, TransactionStatus::Completed);
    assert_eq!(tx.reference, response.reference);
    assert!(tx.completed_at.is_some());
}

#[tokio::test]
async fn pending_transaction_leaves_purchase_pending() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-pending", "PENDING")));

    let response = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .unwrap();

    assert_eq!(response.ledger_status, TransactionStatus::Pending);
    assert_eq!(
        app.ledger.purchase(response.purchase_id).payment_status,
        PurchaseStatus::Pending
    );
}

#[tokio::test]
async fn declined_transaction_fails_purchase() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-declined", "DECLINED")));

    let response = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .unwrap();

    assert_eq!(response.ledger_status, TransactionStatus::Failed);
    assert_eq!(
        app.ledger.purchase(response.purchase_id).payment_status,
        PurchaseStatus::Failed
    );
}

#[tokio::test]
async fn validation_failure_is_retried_once_with_new_reference() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Err(validation_error("reference", "ya fue usada")));
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-retried", "APPROVED")));

    let response = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .expect("retry succeeds");

    let references = app.gateway.references.lock().unwrap().clone();
    assert_eq!(references.len(), 2);
    assert_ne!(references[0], references[1]);
    assert_eq!(response.reference, references[1]);

    let ledger = app.ledger.snapshot();
    assert_eq!(ledger.purchases.len(), 1);
    assert_eq!(ledger.transactions.len(), 1);
    assert_eq!(ledger.transactions[0].reference, references[1]);

    // The rejected reference stays on the purchase
    let attempts = &ledger.purchases[0].payment_details["attempts"];
    assert_eq!(attempts.as_array().map(Vec::len), Some(1));
    assert_eq!(attempts[0]["reference"], json!(references[0]));
    assert_eq!(attempts[0]["outcome"], json!("validation_failed"));
}

#[tokio::test]
async fn second_validation_failure_is_final() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Err(validation_error("reference", "ya fue usada")));
    app.gateway.push_transaction(Err(validation_error(
        "customer_email",
        "formato inválido",
    )));
    // Would be returned on a third call
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-never", "APPROVED")));

    let err = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .unwrap_err();

    match err {
        AppError::GatewayValidation { errors, .. } => {
            assert_eq!(errors["customer_email"], vec!["formato inválido"]);
        }
        other => panic!("expected gateway validation error, got {other:?}"),
    }

    assert_eq!(app.gateway.transaction_calls(), 2);

    let ledger = app.ledger.snapshot();
    assert_eq!(ledger.purchases.len(), 1);
    assert_eq!(ledger.purchases[0].payment_status, PurchaseStatus::Pending);
    assert!(ledger.transactions.is_empty());
    assert_eq!(
        ledger.purchases[0].payment_details["attempts"]
            .as_array()
            .map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn transport_failure_is_not_retried() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Err(GatewayError::Transport("timed out".to_string())));
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-never", "APPROVED")));

    let err = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::Gateway(_)));
    assert_eq!(app.gateway.transaction_calls(), 1);
    assert!(app.ledger.snapshot().transactions.is_empty());
}

#[tokio::test]
async fn out_of_bounds_amount_touches_nothing() {
    let app = TestApp::new();

    let err = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(500)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, AppError::InvalidAmount(_)));
    assert_eq!(app.gateway.transaction_calls(), 0);
    assert!(app.ledger.snapshot().purchases.is_empty());
}

#[tokio::test]
async fn unsupported_payment_method_is_rejected() {
    let app = TestApp::new();
    let mut body = app.transaction_request(15_000_000);
    body["payment_method"] = json!({ "type": "BITCOIN" });

    let err = transaction_service::create_transaction(&app.state, request(body))
        .await
        .unwrap_err();

    match err {
        AppError::Validation { errors, .. } => {
            assert!(errors.contains_key("payment_method.type"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(app.ledger.snapshot().purchases.is_empty());
}

#[tokio::test]
async fn unknown_package_or_user_is_not_found() {
    let app = TestApp::new();

    let mut body = app.transaction_request(15_000_000);
    body["package_id"] = json!(Uuid::new_v4());
    let err = transaction_service::create_transaction(&app.state, request(body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("Package")));

    let mut body = app.transaction_request(15_000_000);
    body["user_id"] = json!(Uuid::new_v4());
    let err = transaction_service::create_transaction(&app.state, request(body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("User")));

    assert_eq!(app.gateway.transaction_calls(), 0);
}

#[tokio::test]
async fn temporary_customer_purchase_has_no_user() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-guest", "APPROVED")));

    let mut body = app.transaction_request(15_000_000);
    body.as_object_mut().unwrap().remove("user_id");

    let response = transaction_service::create_transaction(&app.state, request(body))
        .await
        .unwrap();

    let purchase = app.ledger.purchase(response.purchase_id);
    assert!(purchase.user_id.is_none());
    assert_eq!(purchase.payment_status, PurchaseStatus::Completed);
}

#[tokio::test]
async fn status_lookup_maps_missing_transaction_to_not_found() {
    let app = TestApp::new();
    app.gateway.push_lookup(Err(GatewayError::Rejected {
        status: 404,
        message: "NOT_FOUND_ERROR".to_string(),
    }));

    let err = transaction_service::transaction_status(&app.state, "tx-missing")
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::NotFound("Transaction")));
}

#[tokio::test]
async fn confirm_applies_status_to_recorded_transaction() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-confirm", "PENDING")));
    let created = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(15_000_000)),
    )
    .await
    .unwrap();

    app.gateway
        .push_lookup(Ok(gateway_tx("tx-confirm", "APPROVED")));
    let confirmed = transaction_service::confirm_transaction(
        &app.state,
        "tx-confirm",
        serde_json::from_value(json!({
            "payment_source_id": "3891",
            "customer_email": "ana@example.com",
            "acceptance_token": "acc_tok_test",
        }))
        .unwrap(),
    )
    .await
    .unwrap();

    assert_eq!(confirmed.status, GatewayStatus::Approved);
    assert_eq!(
        app.ledger.purchase(created.purchase_id).payment_status,
        PurchaseStatus::Completed
    );
}

#[tokio::test]
async fn payment_link_is_attached_to_purchase() {
    let app = TestApp::new();
    app.gateway.push_link(Ok(serde_json::from_value(json!({
        "id": "test_AbCdEf",
        "single_use": true,
        "active": true,
    }))
    .unwrap()));

    let request: CreatePaymentLinkRequest = serde_json::from_value(json!({
        "amount_in_cents": 15_000_000,
        "currency": "cop",
        "package_id": app.package.id,
        "customer_email": "guest@example.com",
    }))
    .unwrap();

    let response = payment_link_service::create_payment_link(&app.state, request)
        .await
        .expect("link created");

    assert_eq!(response.permalink, "https://checkout.wompi.co/l/test_AbCdEf");
    assert_eq!(response.currency, "COP");

    let purchase = app.ledger.purchase(response.purchase_id);
    assert_eq!(purchase.payment_link_id.as_deref(), Some("test_AbCdEf"));
    assert_eq!(purchase.payment_status, PurchaseStatus::Pending);

    let payloads = app.gateway.link_payloads.lock().unwrap().clone();
    assert_eq!(payloads.len(), 1);
    assert!(payloads[0].single_use);
    assert_eq!(payloads[0].sku, response.reference);
    assert_eq!(payloads[0].name, app.package.name);
}

#[tokio::test]
async fn payment_link_in_the_past_is_rejected() {
    let app = TestApp::new();
    let request: CreatePaymentLinkRequest = serde_json::from_value(json!({
        "amount_in_cents": 15_000_000,
        "currency": "COP",
        "package_id": app.package.id,
        "customer_email": "guest@example.com",
        "expires_at": "2020-01-01T00:00:00Z",
    }))
    .unwrap();

    let err = payment_link_service::create_payment_link(&app.state, request)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation { .. }));
    assert!(app.ledger.snapshot().purchases.is_empty());
}

#[tokio::test]
async fn amount_below_package_price_is_rejected() {
    let app = TestApp::new();
    app.gateway
        .push_transaction(Ok(gateway_tx("tx-cheap", "APPROVED")));

    let err = transaction_service::create_transaction(
        &app.state,
        request(app.transaction_request(10_000)),
    )
    .await
    .unwrap_err();

    match err {
        AppError::Validation { errors, .. } => {
            assert!(errors.contains_key("amount_in_cents"));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(app.gateway.transaction_calls(), 0);
    assert!(app.ledger.snapshot().purchases.is_empty());
}

#[tokio::test]
async fn currency_other_than_package_currency_is_rejected() {
    let app = TestApp::new();
    let mut body = app.transaction_request(15_000_000);
    // Within USD bounds, so only the package check can reject it
    body["currency"] = json!("USD");
    body["amount_in_cents"] = json!(50_000);
    let err = transaction_service::create_transaction(&app.state, request(body))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let link: CreatePaymentLinkRequest = serde_json::from_value(json!({
        "amount_in_cents": 20_000_000,
        "currency": "COP",
        "package_id": app.package.id,
        "customer_email": "guest@example.com",
    }))
    .unwrap();
    let err = payment_link_service::create_payment_link(&app.state, link)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert_eq!(app.gateway.transaction_calls(), 0);
    assert!(app.gateway.link_payloads.lock().unwrap().is_empty());
    assert!(app.ledger.snapshot().purchases.is_empty());
}

#[tokio::test]
async fn path_like_transaction_ids_never_reach_the_gateway() {
    let app = TestApp::new();
    app.gateway
        .push_lookup(Ok(gateway_tx("tx-unused", "APPROVED")));

    let err = transaction_service::transaction_status(&app.state, "../../merchants/pub_test_x")
        .await
        .unwrap_err();
    match err {
        AppError::Validation { errors, .. } => assert!(errors.contains_key("transaction_id")),
        other => panic!("expected validation error, got {other:?}"),
    }

    let err = transaction_service::confirm_transaction(
        &app.state,
        "abc?x=",
        serde_json::from_value(json!({
            "payment_source_id": "3891",
            "customer_email": "ana@example.com",
            "acceptance_token": "acc_tok_test",
        }))
        .unwrap(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    assert!(app.gateway.lookup_ids.lock().unwrap().is_empty());
}
