//! Periodic billing: one consolidated bill per deployment per month, carrying
//! any unpaid arrears forward.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{
    checked_total, Bill, BillId, BillItem, BillItemId, BillStatus, BillingMonth, DeploymentId,
    FeeSchedule, PayerType, ScheduleId, ScheduleStatus,
};
use super::error::BillingError;
use super::store::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSummary {
    pub period: BillingMonth,
    pub generated: usize,
    pub skipped: usize,
    pub bill_ids: Vec<BillId>,
}

impl AggregationSummary {
    pub fn message(&self) -> String {
        format!(
            "generated {} bill(s) for {} ({} skipped)",
            self.generated, self.period, self.skipped
        )
    }
}

/// Validate the requested period before any transaction opens.
pub fn billing_period(year: Option<i32>, month: Option<u32>) -> Result<BillingMonth, BillingError> {
    let (Some(year), Some(month)) = (year, month) else {
        return Err(BillingError::validation("year and month are required"));
    };
    BillingMonth::new(year, month)
        .ok_or_else(|| BillingError::validation(format!("{year}-{month} is not a valid month")))
}

/// Bill every deployment with a pending installment due in `period`.
///
/// Runs against one transaction's ledger; any error aborts the whole batch.
pub fn generate_period_bills(
    ledger: &mut Ledger,
    period: BillingMonth,
) -> Result<AggregationSummary, BillingError> {
    let mut due: BTreeMap<DeploymentId, Vec<FeeSchedule>> = BTreeMap::new();
    for schedule in ledger.schedules.live().filter(|schedule| {
        schedule.status == ScheduleStatus::Pending && period.contains(schedule.due_date)
    }) {
        due.entry(schedule.deployment_id.clone())
            .or_default()
            .push(schedule.clone());
    }

    let mut summary = AggregationSummary {
        period,
        generated: 0,
        skipped: 0,
        bill_ids: Vec::new(),
    };

    for (deployment_id, mut current) in due {
        current.sort_by_key(|schedule| (schedule.due_date, schedule.installment_no));
        let out_of_range = || {
            BillingError::validation(format!(
                "bill total for deployment {deployment_id} is out of range"
            ))
        };
        let current_amount = checked_total(current.iter().map(|s| s.expected_amount))
            .ok_or_else(out_of_range)?;

        let arrears: Vec<(ScheduleId, Decimal)> = ledger
            .schedules_for(&deployment_id)
            .into_iter()
            .filter(|schedule| {
                schedule.due_date < period.first_day()
                    && schedule.status != ScheduleStatus::Paid
                    && schedule.outstanding() > Decimal::ZERO
            })
            .map(|schedule| (schedule.id.clone(), schedule.outstanding()))
            .collect();
        let arrears_amount =
            checked_total(arrears.iter().map(|(_, amount)| *amount)).ok_or_else(out_of_range)?;

        let total = current_amount
            .checked_add(arrears_amount)
            .ok_or_else(out_of_range)?;
        if total <= Decimal::ZERO {
            debug!(deployment = %deployment_id, %period, "nothing to bill, skipped");
            summary.skipped += 1;
            continue;
        }

        let worker_id = ledger
            .deployments
            .get(&deployment_id)
            .map(|deployment| deployment.worker_id.clone())
            .ok_or_else(|| BillingError::not_found("deployment", &deployment_id))?;

        let bill_id: BillId = ledger.next_id("bill");
        ledger.bills.insert(
            bill_id.clone(),
            Bill {
                id: bill_id.clone(),
                worker_id,
                deployment_id: Some(deployment_id.clone()),
                year: period.year(),
                month: period.month(),
                bill_date: period.first_day(),
                payer_type: PayerType::Worker,
                total_amount: total,
                paid_amount: Decimal::ZERO,
                balance: total,
                status: BillStatus::Draft,
            },
        );

        for schedule in &current {
            insert_bill_item(
                ledger,
                &bill_id,
                format!("Installment {} due {}", schedule.installment_no, schedule.due_date),
                schedule.expected_amount,
                Some(schedule.id.clone()),
            );
        }
        if arrears_amount > Decimal::ZERO {
            insert_bill_item(
                ledger,
                &bill_id,
                format!("Arrears carried forward ({} installment(s))", arrears.len()),
                arrears_amount,
                None,
            );
        }

        // Last writer wins: a schedule already claimed by an older bill moves here.
        let linked = current
            .iter()
            .map(|schedule| schedule.id.clone())
            .chain(arrears.iter().map(|(id, _)| id.clone()));
        for schedule_id in linked {
            if let Some(schedule) = ledger.schedules.get_mut(&schedule_id) {
                schedule.bill_id = Some(bill_id.clone());
            }
        }

        debug!(
            deployment = %deployment_id,
            bill = %bill_id,
            current = %current_amount,
            arrears = %arrears_amount,
            "periodic bill created"
        );
        summary.generated += 1;
        summary.bill_ids.push(bill_id);
    }

    info!(
        %period,
        generated = summary.generated,
        skipped = summary.skipped,
        "periodic billing run complete"
    );
    Ok(summary)
}

pub(crate) fn insert_bill_item(
    ledger: &mut Ledger,
    bill_id: &BillId,
    description: String,
    amount: Decimal,
    schedule_id: Option<ScheduleId>,
) -> BillItemId {
    let item_id: BillItemId = ledger.next_id("bill-item");
    ledger.bill_items.insert(
        item_id.clone(),
        BillItem {
            id: item_id.clone(),
            bill_id: bill_id.clone(),
            description,
            amount,
            schedule_id,
        },
    );
    item_id
}

