//! End-to-end scenarios for the deployment billing lifecycle, driven through the
//! public service facade and HTTP router only.

mod common {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use placement_billing::billing::{
        BillingService, ComplianceStandard, Deployment, DeploymentId, Employer, EmployerId,
        InMemoryBillingStore, Ledger, LodgingAssignment, Passport, Worker, WorkerId,
    };
    use placement_billing::config::BillingConfig;

    pub(super) const DEPLOYMENT: &str = "dep-vn-001";

    pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    pub(super) fn ledger() -> Ledger {
        let mut ledger = Ledger::default();
        let worker = Worker {
            id: WorkerId::from("wkr-vn-001"),
            name: "Tran Van Minh".to_string(),
            nationality: "VN".to_string(),
            passport: Some(Passport {
                number: "B7654321".to_string(),
                expiry_date: date(2030, 1, 1),
            }),
            lodging: Some(LodgingAssignment {
                bed_code: "A1-03".to_string(),
                rent: dec!(2500),
                management_fee: dec!(500),
            }),
        };
        let employer = Employer {
            id: EmployerId::from("emp-001"),
            name: "Taoyuan Electronics".to_string(),
            compliance_standard: ComplianceStandard::Rba80,
            compliance_effective_date: Some(date(2024, 1, 1)),
        };
        let deployment = Deployment {
            id: DeploymentId::from(DEPLOYMENT),
            worker_id: worker.id.clone(),
            employer_id: employer.id.clone(),
            start_date: date(2025, 1, 16),
            end_date: Some(date(2026, 1, 15)),
            monthly_service_fee: dec!(1800),
        };
        ledger.workers.insert(worker.id.clone(), worker);
        ledger.employers.insert(employer.id.clone(), employer);
        ledger.deployments.insert(deployment.id.clone(), deployment);
        ledger
    }

    pub(super) fn service() -> Arc<BillingService<InMemoryBillingStore>> {
        let store = Arc::new(InMemoryBillingStore::with_ledger(ledger()));
        Arc::new(BillingService::new(store, BillingConfig::default()))
    }
}

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use placement_billing::billing::{
    billing_router, BillStatus, BillingStore, DeploymentId, ScheduleStatus,
};

use common::{date, service, DEPLOYMENT};

#[test]
fn confirmed_plan_flows_into_bills_and_payments() {
    let service = service();
    let deployment_id = DeploymentId::from(DEPLOYMENT);

    let plan = service.generate_plan(&deployment_id).expect("plan generated");
    service
        .confirm_plan(&plan.plan.id, &[])
        .expect("plan confirmed");
    let schedules = service
        .materialize_schedules(&plan.plan.id)
        .expect("installments created");
    assert_eq!(schedules[0].due_date, date(2025, 1, 1));
    assert_eq!(schedules[0].expected_amount, dec!(4900));
    assert_eq!(schedules[1].expected_amount, dec!(4800));

    let january = service
        .generate_monthly_bills(Some(2025), Some(1))
        .expect("january run");
    assert_eq!(january.generated, 1);

    let february = service
        .generate_monthly_bills(Some(2025), Some(2))
        .expect("february run");
    let bill_id = february.bill_ids[0].clone();
    let detail = service.bill(&bill_id).expect("bill");
    assert_eq!(detail.bill.total_amount, dec!(9700));
    assert_eq!(detail.schedules.len(), 2);

    let outcome = service
        .pay_bill(&bill_id, dec!(6000), date(2025, 2, 20))
        .expect("payment");
    assert_eq!(outcome.new_balance, dec!(3700));
    assert_eq!(outcome.status, BillStatus::Partial);

    let detail = service.bill(&bill_id).expect("bill");
    let statuses: Vec<_> = detail
        .schedules
        .iter()
        .map(|schedule| (schedule.installment_no, schedule.status, schedule.paid_amount))
        .collect();
    assert!(statuses.contains(&(1, ScheduleStatus::Paid, dec!(4900))));
    assert!(statuses.contains(&(2, ScheduleStatus::Partial, dec!(1100))));

    let payments = service
        .store()
        .read(|ledger| ledger.payments.live_count())
        .expect("ledger readable");
    assert_eq!(payments, 1);
}

#[tokio::test]
async fn regulated_fee_needs_an_override_over_http() {
    let router = billing_router(service());
    let request = |body: Value| {
        Request::post("/accounting/bills/create-fixed")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("json")))
            .expect("request")
    };
    let body = json!({
        "workerId": "wkr-vn-001",
        "feeType": "placement_fee",
        "name": "Recruitment agency fee",
        "amount": "12000",
        "billDate": "2025-03-01"
    });

    let response = router
        .clone()
        .oneshot(request(body.clone()))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload: Value = serde_json::from_slice(
        &axum::body::to_bytes(response.into_body(), 1 << 20)
            .await
            .expect("body"),
    )
    .expect("json");
    assert_eq!(payload["requiresConfirmation"], json!(true));

    let mut overridden = body;
    overridden["overrideReason"] = json!("refund agreed in writing");
    let response = router
        .oneshot(request(overridden))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
}
