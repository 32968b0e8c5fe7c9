use super::common::*;
use axum::body::Body;
use axum::extract::State;
use axum::http::{header, Request, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::billing::domain::ComplianceStandard;
use crate::billing::store::InMemoryBillingStore;

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("json body")))
        .expect("request")
}

fn billed_ledger() -> crate::billing::Ledger {
    let mut ledger = seeded_ledger();
    insert_schedule(&mut ledger, pending("sch-1", 1, date(2025, 1, 1), dec!(1000)));
    insert_schedule(&mut ledger, pending("sch-2", 2, date(2025, 2, 1), dec!(500)));
    insert_bill(&mut ledger, "bill-1", dec!(1500), &["sch-1", "sch-2"]);
    ledger
}

#[tokio::test]
async fn missing_plan_is_not_found() {
    let router = router_with_ledger(seeded_ledger());
    let response = router
        .oneshot(
            Request::get("/billing-plans/plan-missing")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("plan-missing"));
}

#[tokio::test]
async fn generated_plan_can_be_fetched_and_simulated() {
    let (service, _) = build_service(seeded_ledger());
    let service = Arc::new(service);

    let response = crate::billing::router::generate_plan_handler::<InMemoryBillingStore>(
        State(service.clone()),
        axum::extract::Path(DEPLOYMENT.to_string()),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = read_json_body(response).await;
    let plan_id = created["plan"]["id"].as_str().expect("plan id").to_string();
    assert_eq!(created["plan"]["status"], json!("PENDING"));
    assert_eq!(created["worker"]["id"], json!(WORKER));

    let router = crate::billing::billing_router(service);
    let response = router
        .oneshot(post_json(&format!("/billing-plans/{plan_id}/simulate"), json!({})))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let report = read_json_body(response).await;
    assert_eq!(report["currentTotal"], report["suggestedTotal"]);
    assert_eq!(report["deployment"]["id"], json!(DEPLOYMENT));
    let items = report["items"].as_array().expect("items");
    assert!(!items.is_empty());
    assert!(items.iter().all(|item| item["isDifferent"] == json!(false)));
}

#[tokio::test]
async fn confirm_route_accepts_item_edits() {
    let (service, _) = build_service(seeded_ledger());
    let service = Arc::new(service);
    let detail = service
        .generate_plan(&crate::billing::DeploymentId::from(DEPLOYMENT))
        .expect("plan");
    let item = &detail.items[0];

    let router = crate::billing::billing_router(service);
    let response = router
        .oneshot(post_json(
            &format!("/billing-plans/{}/confirm", detail.plan.id),
            json!({
                "items": [{
                    "id": item.id,
                    "amount": "750",
                    "status": "MODIFIED",
                    "description": "negotiated first month"
                }]
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["plan"]["status"], json!("CONFIRMED"));
    assert_eq!(payload["plan"]["reviewStatus"], json!("NORMAL"));
    assert_eq!(payload["items"][0]["amount"], json!("750"));
}

#[tokio::test]
async fn monthly_generation_reports_counts() {
    let mut ledger = seeded_ledger();
    insert_schedule(&mut ledger, pending("sch-feb", 1, date(2025, 2, 1), dec!(1000)));
    let router = router_with_ledger(ledger);

    let response = router
        .clone()
        .oneshot(post_json(
            "/accounting/generate-monthly-fees",
            json!({ "year": 2025, "month": 2 }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["generated"], json!(1));
    assert_eq!(payload["skipped"], json!(0));
    assert!(payload["message"].as_str().is_some());

    let response = router
        .oneshot(post_json("/accounting/generate-monthly-fees", json!({ "year": 2025 })))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn pay_route_applies_the_waterfall() {
    let router = router_with_ledger(billed_ledger());

    let response = router
        .clone()
        .oneshot(post_json(
            "/accounting/bills/pay",
            json!({ "billId": "bill-1", "amount": "1200", "paymentDate": "2025-02-10" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["billId"], json!("bill-1"));
    assert_eq!(payload["newBalance"], json!("300"));
    assert_eq!(payload["status"], json!("partial"));

    let response = router
        .oneshot(
            Request::get("/accounting/bills/bill-1")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("route executes");
    let detail = read_json_body(response).await;
    let schedules = detail["schedules"].as_array().expect("schedules");
    assert_eq!(schedules.len(), 2);
    assert!(schedules
        .iter()
        .any(|s| s["id"] == json!("sch-2") && s["status"] == json!("partial")));
}

#[tokio::test]
async fn pay_route_rejects_bad_amounts_and_unknown_bills() {
    let router = router_with_ledger(billed_ledger());

    let response = router
        .clone()
        .oneshot(post_json(
            "/accounting/bills/pay",
            json!({ "billId": "bill-1", "amount": "0", "paymentDate": "2025-02-10" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(post_json(
            "/accounting/bills/pay",
            json!({ "billId": "bill-404", "amount": "10", "paymentDate": "2025-02-10" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn fixed_fee_soft_block_is_a_successful_response() {
    let ledger = ledger_with(
        worker("VN"),
        employer(ComplianceStandard::Rba80, Some(date(2024, 1, 1))),
    );
    let router = router_with_ledger(ledger);
    let body = json!({
        "workerId": WORKER,
        "feeType": "service_fee",
        "name": "招募服務費",
        "amount": "5000",
        "billDate": "2025-06-01"
    });

    let response = router
        .clone()
        .oneshot(post_json("/accounting/bills/create-fixed", body.clone()))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["requiresConfirmation"], json!(true));
    assert_eq!(payload["blockLevel"], json!("block"));
    assert!(payload["warningMessage"].as_str().is_some());

    let mut confirmed = body;
    confirmed["overrideReason"] = json!("worker reimbursed by employer");
    let response = router
        .oneshot(post_json("/accounting/bills/create-fixed", confirmed))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["requiresConfirmation"], json!(false));
    assert_eq!(payload["overrideRecorded"], json!(true));
    assert_eq!(payload["bill"]["totalAmount"], json!("5000"));
}
