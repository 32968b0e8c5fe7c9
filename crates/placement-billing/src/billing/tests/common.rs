use std::sync::Arc;

use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;

use crate::billing::domain::{
    Bill, BillId, BillStatus, ComplianceStandard, Deployment, DeploymentId, Employer, EmployerId,
    FeeCategory, FeeItem, FeeItemId, FeeSchedule, LodgingAssignment, Passport, PayerType,
    ScheduleId, ScheduleStatus, Worker, WorkerId,
};
use crate::billing::store::{BillingStore, InMemoryBillingStore, Ledger};
use crate::billing::{billing_router, BillingService, PlacementFacts};
use crate::config::BillingConfig;

pub(super) const WORKER: &str = "worker-1";
pub(super) const EMPLOYER: &str = "employer-1";
pub(super) const DEPLOYMENT: &str = "deployment-1";

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn billing_config() -> BillingConfig {
    BillingConfig::default()
}

pub(super) fn lodging() -> LodgingAssignment {
    LodgingAssignment {
        bed_code: "D2-14B".to_string(),
        rent: dec!(2500),
        management_fee: dec!(500),
    }
}

pub(super) fn facts(start: NaiveDate, end: Option<NaiveDate>) -> PlacementFacts {
    PlacementFacts {
        start_date: start,
        end_date: end,
        monthly_service_fee: dec!(1800),
        passport_expiry: None,
        lodging: None,
    }
}

pub(super) fn worker(nationality: &str) -> Worker {
    Worker {
        id: WorkerId::from(WORKER),
        name: "Nguyen Thi Lan".to_string(),
        nationality: nationality.to_string(),
        passport: Some(Passport {
            number: "C1234567".to_string(),
            expiry_date: date(2030, 1, 1),
        }),
        lodging: Some(lodging()),
    }
}

pub(super) fn employer(standard: ComplianceStandard, effective: Option<NaiveDate>) -> Employer {
    Employer {
        id: EmployerId::from(EMPLOYER),
        name: "Hsinchu Precision Components".to_string(),
        compliance_standard: standard,
        compliance_effective_date: effective,
    }
}

pub(super) fn deployment(id: &str) -> Deployment {
    Deployment {
        id: DeploymentId::from(id),
        worker_id: WorkerId::from(WORKER),
        employer_id: EmployerId::from(EMPLOYER),
        start_date: date(2025, 1, 16),
        end_date: Some(date(2026, 1, 15)),
        monthly_service_fee: dec!(1800),
    }
}

/// One Vietnamese worker placed with an unregulated employer for twelve months.
pub(super) fn seeded_ledger() -> Ledger {
    ledger_with(worker("VN"), employer(ComplianceStandard::None, None))
}

pub(super) fn ledger_with(worker: Worker, employer: Employer) -> Ledger {
    let mut ledger = Ledger::default();
    ledger.workers.insert(worker.id.clone(), worker);
    ledger.employers.insert(employer.id.clone(), employer);
    let deployment = deployment(DEPLOYMENT);
    ledger.deployments.insert(deployment.id.clone(), deployment);
    ledger.fee_items.insert(
        FeeItemId::from("fee-medical-vn"),
        FeeItem {
            id: FeeItemId::from("fee-medical-vn"),
            name: "Medical check".to_string(),
            category: FeeCategory::HealthCheckFee,
            default_amount: dec!(1800),
            nationality: Some("VN".to_string()),
            is_zero_fee_subject: false,
        },
    );
    ledger
}

/// Unpaid installment of the default deployment.
pub(super) fn pending(
    id: &str,
    installment_no: u32,
    due_date: NaiveDate,
    expected: Decimal,
) -> FeeSchedule {
    FeeSchedule {
        id: ScheduleId::from(id),
        deployment_id: DeploymentId::from(DEPLOYMENT),
        installment_no,
        due_date,
        expected_amount: expected,
        paid_amount: Decimal::ZERO,
        status: ScheduleStatus::Pending,
        bill_id: None,
    }
}

pub(super) fn insert_schedule(ledger: &mut Ledger, schedule: FeeSchedule) {
    ledger.schedules.insert(schedule.id.clone(), schedule);
}

/// Draft bill of `total` linked to the given schedules.
pub(super) fn insert_bill(ledger: &mut Ledger, id: &str, total: Decimal, schedule_ids: &[&str]) {
    let bill_id = BillId::from(id);
    ledger.bills.insert(
        bill_id.clone(),
        Bill {
            id: bill_id.clone(),
            worker_id: WorkerId::from(WORKER),
            deployment_id: Some(DeploymentId::from(DEPLOYMENT)),
            year: 2025,
            month: 2,
            bill_date: date(2025, 2, 1),
            payer_type: PayerType::Worker,
            total_amount: total,
            paid_amount: Decimal::ZERO,
            balance: total,
            status: BillStatus::Draft,
        },
    );
    for schedule_id in schedule_ids {
        if let Some(schedule) = ledger.schedules.get_mut(&ScheduleId::from(*schedule_id)) {
            schedule.bill_id = Some(bill_id.clone());
        }
    }
}

pub(super) fn build_service(
    ledger: Ledger,
) -> (
    BillingService<InMemoryBillingStore>,
    Arc<InMemoryBillingStore>,
) {
    let store = Arc::new(InMemoryBillingStore::with_ledger(ledger));
    let service = BillingService::new(store.clone(), billing_config());
    (service, store)
}

pub(super) fn snapshot(store: &InMemoryBillingStore) -> Ledger {
    store.read(Ledger::clone).expect("ledger readable")
}

pub(super) fn router_with_ledger(ledger: Ledger) -> axum::Router {
    let (service, _) = build_service(ledger);
    billing_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
