//! One-off fixed-fee bills, gated by the employer's compliance standard.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::aggregation::insert_bill_item;
use super::compliance::{
    ComplianceContext, ComplianceDecision, ComplianceValidator, FeeDefinition, Severity,
};
use super::domain::{
    Bill, BillId, BillStatus, ComplianceOverride, ComplianceStandard, FeeCategory, OverrideId,
    PayerType, WorkerId,
};
use super::error::BillingError;
use super::store::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixedFeeRequest {
    pub worker_id: WorkerId,
    #[serde(default)]
    pub fee_type: Option<FeeCategory>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub bill_date: Option<NaiveDate>,
    #[serde(default)]
    pub override_reason: Option<String>,
    #[serde(default)]
    pub payer_type: Option<PayerType>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixedFeeOutcome {
    /// Soft block: nothing was written; resubmit with an override reason.
    RequiresConfirmation {
        warning_message: String,
        block_level: Severity,
        regulation: Option<String>,
    },
    Created {
        bill: Bill,
        compliance_warning: Option<String>,
        override_recorded: bool,
    },
}

/// Create a fixed-fee bill, or report that the caller must confirm an override.
pub fn create_fixed_fee(
    ledger: &mut Ledger,
    validator: &ComplianceValidator,
    request: &FixedFeeRequest,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<FixedFeeOutcome, BillingError> {
    let worker = ledger
        .workers
        .get(&request.worker_id)
        .ok_or_else(|| BillingError::not_found("worker", &request.worker_id))?;
    let nationality = worker.nationality.clone();

    let name = request
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .or_else(|| request.fee_type.map(|category| category.label().to_string()))
        .ok_or_else(|| BillingError::validation("either name or feeType is required"))?;

    let standard_item = ledger.fee_item_for(&name, &nationality);
    let amount = match (request.amount, standard_item) {
        (Some(amount), _) => amount,
        (None, Some(item)) => item.default_amount,
        (None, None) => {
            return Err(BillingError::validation(format!(
                "no fee standard named '{name}' for nationality {nationality}; amount is required"
            )))
        }
    };
    if amount <= Decimal::ZERO {
        return Err(BillingError::validation(format!(
            "fee amount must be positive (got {amount})"
        )));
    }

    let fee = FeeDefinition {
        category: request
            .fee_type
            .or(standard_item.map(|item| item.category))
            .unwrap_or(FeeCategory::Other),
        name: name.clone(),
        nationality: standard_item
            .and_then(|item| item.nationality.clone())
            .or(Some(nationality)),
        is_zero_fee_subject: standard_item.is_some_and(|item| item.is_zero_fee_subject),
    };

    let bill_date = request.bill_date.unwrap_or(today);
    let payer = request.payer_type.unwrap_or_default();
    let deployment = ledger.active_deployment_for(&request.worker_id, bill_date);
    let deployment_id = deployment.map(|deployment| deployment.id.clone());
    let (standard, effective_date) = deployment
        .and_then(|deployment| ledger.employers.get(&deployment.employer_id))
        .map_or((ComplianceStandard::None, None), |employer| {
            (employer.compliance_standard, employer.compliance_effective_date)
        });

    let decision = validator.evaluate(&ComplianceContext {
        standard,
        effective_date,
        fee: &fee,
        payer,
        billing_date: bill_date,
    });

    let override_reason = request
        .override_reason
        .as_deref()
        .map(str::trim)
        .filter(|reason| !reason.is_empty());

    if !decision.allowed && override_reason.is_none() {
        warn!(
            worker = %request.worker_id,
            fee = %fee.name,
            standard = standard.label(),
            "fixed fee requires compliance confirmation"
        );
        return Ok(FixedFeeOutcome::RequiresConfirmation {
            warning_message: decision.message,
            block_level: decision.severity,
            regulation: decision.regulation,
        });
    }

    let bill_id: BillId = ledger.next_id("bill");
    let bill = Bill {
        id: bill_id.clone(),
        worker_id: request.worker_id.clone(),
        deployment_id,
        year: bill_date.year(),
        month: bill_date.month(),
        bill_date,
        payer_type: payer,
        total_amount: amount,
        paid_amount: Decimal::ZERO,
        balance: amount,
        status: BillStatus::Draft,
    };
    ledger.bills.insert(bill_id.clone(), bill.clone());

    let description = request
        .description
        .clone()
        .unwrap_or_else(|| name.clone());
    insert_bill_item(ledger, &bill_id, description, amount, None);

    let override_recorded = match override_reason {
        Some(reason) if !decision.allowed => {
            record_override(ledger, &bill_id, reason, &decision, now);
            true
        }
        _ => false,
    };

    let compliance_warning =
        (decision.severity == Severity::Warning).then(|| decision.message.clone());

    info!(
        bill = %bill_id,
        worker = %request.worker_id,
        %amount,
        override_recorded,
        "fixed fee bill created"
    );

    Ok(FixedFeeOutcome::Created {
        bill,
        compliance_warning,
        override_recorded,
    })
}

fn record_override(
    ledger: &mut Ledger,
    bill_id: &BillId,
    reason: &str,
    decision: &ComplianceDecision,
    now: DateTime<Utc>,
) {
    let override_id: OverrideId = ledger.next_id("override");
    warn!(bill = %bill_id, reason, "compliance denial overridden");
    ledger.overrides.insert(
        override_id.clone(),
        ComplianceOverride {
            id: override_id,
            bill_id: bill_id.clone(),
            reason: reason.to_string(),
            message: decision.message.clone(),
            regulation: decision.regulation.clone(),
            recorded_at: now,
        },
    );
}
