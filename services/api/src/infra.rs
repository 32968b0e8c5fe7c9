use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use placement_billing::billing::{
    BillingError, ComplianceStandard, Deployment, DeploymentId, Employer, EmployerId,
    FeeCategory, FeeItem, FeeItemId, Ledger, LodgingAssignment, Passport, Worker, WorkerId,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) const SEED_VN_DEPLOYMENT: &str = "dep-vn-001";
pub(crate) const SEED_ID_DEPLOYMENT: &str = "dep-id-001";
pub(crate) const SEED_VN_WORKER: &str = "wkr-vn-001";
pub(crate) const SEED_ID_WORKER: &str = "wkr-id-001";

/// Reference data loaded into the in-process store at startup.
pub(crate) fn seed_ledger() -> Result<Ledger, BillingError> {
    let mut ledger = Ledger::default();

    let employers = [
        Employer {
            id: EmployerId::from("emp-rba"),
            name: "Taoyuan Electronics Assembly".to_string(),
            compliance_standard: ComplianceStandard::Rba80,
            compliance_effective_date: Some(seed_date(2024, 1, 1)?),
        },
        Employer {
            id: EmployerId::from("emp-local"),
            name: "Changhua Textile Works".to_string(),
            compliance_standard: ComplianceStandard::None,
            compliance_effective_date: None,
        },
    ];
    for employer in employers {
        ledger.employers.insert(employer.id.clone(), employer);
    }

    let workers = [
        Worker {
            id: WorkerId::from(SEED_VN_WORKER),
            name: "Tran Van Minh".to_string(),
            nationality: "VN".to_string(),
            passport: Some(Passport {
                number: "B7654321".to_string(),
                expiry_date: seed_date(2026, 8, 31)?,
            }),
            lodging: Some(LodgingAssignment {
                bed_code: "A1-03".to_string(),
                rent: dec!(2500),
                management_fee: dec!(500),
            }),
        },
        Worker {
            id: WorkerId::from(SEED_ID_WORKER),
            name: "Siti Rahayu".to_string(),
            nationality: "ID".to_string(),
            passport: Some(Passport {
                number: "X1029384".to_string(),
                expiry_date: seed_date(2031, 3, 15)?,
            }),
            lodging: None,
        },
    ];
    for worker in workers {
        ledger.workers.insert(worker.id.clone(), worker);
    }

    let deployments = [
        Deployment {
            id: DeploymentId::from(SEED_VN_DEPLOYMENT),
            worker_id: WorkerId::from(SEED_VN_WORKER),
            employer_id: EmployerId::from("emp-rba"),
            start_date: seed_date(2025, 1, 16)?,
            end_date: None,
            monthly_service_fee: dec!(1800),
        },
        Deployment {
            id: DeploymentId::from(SEED_ID_DEPLOYMENT),
            worker_id: WorkerId::from(SEED_ID_WORKER),
            employer_id: EmployerId::from("emp-local"),
            start_date: seed_date(2025, 3, 1)?,
            end_date: Some(seed_date(2028, 2, 29)?),
            monthly_service_fee: dec!(1500),
        },
    ];
    for deployment in deployments {
        ledger.deployments.insert(deployment.id.clone(), deployment);
    }

    let medical = fee_item("fee-medical", "Medical check", FeeCategory::HealthCheckFee);
    let fee_items = [
        FeeItem {
            default_amount: dec!(1500),
            ..medical.clone()
        },
        FeeItem {
            id: FeeItemId::from("fee-medical-vn"),
            default_amount: dec!(1800),
            nationality: Some("VN".to_string()),
            ..medical
        },
        FeeItem {
            default_amount: dec!(12000),
            nationality: Some("ID".to_string()),
            is_zero_fee_subject: true,
            ..fee_item("fee-airfare-id", "Return airfare", FeeCategory::TravelFee)
        },
        FeeItem {
            default_amount: dec!(20000),
            is_zero_fee_subject: true,
            ..fee_item("fee-recruit", "Recruitment service fee", FeeCategory::ServiceFee)
        },
    ];
    for item in fee_items {
        ledger.fee_items.insert(item.id.clone(), item);
    }

    Ok(ledger)
}

/// Generic fee standard with no default amount yet.
fn fee_item(id: &str, name: &str, category: FeeCategory) -> FeeItem {
    FeeItem {
        id: FeeItemId::from(id),
        name: name.to_string(),
        category,
        default_amount: Decimal::ZERO,
        nationality: None,
        is_zero_fee_subject: false,
    }
}

fn seed_date(year: i32, month: u32, day: u32) -> Result<NaiveDate, BillingError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        BillingError::validation(format!("seed date {year}-{month:02}-{day:02} does not exist"))
    })
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|err| format!("failed to parse '{raw}' as an amount ({err})"))?;
    if amount.is_sign_negative() {
        return Err(format!("amount '{raw}' must not be negative"));
    }
    Ok(amount)
}
