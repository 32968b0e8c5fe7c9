//! Payment waterfall: oldest installment first, recomputed from the bill's
//! cumulative paid amount on every payment.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{BillId, BillStatus, FeeSchedule, Payment, PaymentId, ScheduleStatus};
use super::error::BillingError;
use super::store::Ledger;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    pub bill_id: BillId,
    pub new_balance: Decimal,
    pub status: BillStatus,
    pub message: String,
}

/// Reject non-positive payments before any transaction opens.
pub fn validate_payment(amount: Decimal) -> Result<(), BillingError> {
    if amount <= Decimal::ZERO {
        return Err(BillingError::validation(format!(
            "payment amount must be positive (got {amount})"
        )));
    }
    Ok(())
}

/// Apply `amount` to the bill and redistribute its cumulative paid amount over
/// the linked installments.
pub fn apply_payment(
    ledger: &mut Ledger,
    bill_id: &BillId,
    amount: Decimal,
    payment_date: NaiveDate,
) -> Result<PaymentOutcome, BillingError> {
    validate_payment(amount)?;

    let bill = ledger
        .bills
        .get_mut(bill_id)
        .ok_or_else(|| BillingError::not_found("bill", bill_id))?;
    if bill.status == BillStatus::Cancelled {
        return Err(BillingError::Conflict(format!(
            "bill {bill_id} is cancelled and cannot take payments"
        )));
    }

    let new_paid = bill
        .paid_amount
        .checked_add(amount)
        .ok_or_else(|| BillingError::validation("payment amount out of range"))?;
    bill.record_paid(new_paid)?;
    let new_balance = bill.balance;
    let status = bill.status;

    let payment_id: PaymentId = ledger.next_id("payment");
    ledger.payments.insert(
        payment_id.clone(),
        Payment {
            id: payment_id,
            bill_id: bill_id.clone(),
            amount,
            payment_date,
        },
    );

    let mut linked: Vec<&mut FeeSchedule> = ledger
        .schedules
        .live_mut()
        .filter(|schedule| schedule.bill_id.as_ref() == Some(bill_id))
        .collect();
    linked.sort_by_key(|schedule| (schedule.due_date, schedule.installment_no));
    let unallocated = allocate_waterfall(&mut linked, new_paid);

    info!(
        bill = %bill_id,
        %amount,
        paid = %new_paid,
        balance = %new_balance,
        installments = linked.len(),
        %unallocated,
        "payment allocated"
    );

    let message = if new_balance > Decimal::ZERO {
        format!("payment recorded; remaining balance {new_balance}")
    } else {
        "payment recorded; bill fully paid".to_string()
    };

    Ok(PaymentOutcome {
        bill_id: bill_id.clone(),
        new_balance,
        status,
        message,
    })
}

/// Spread `total_paid` over installments already sorted oldest first. Each
/// installment takes at most its expected amount. Returns what is left over.
pub fn allocate_waterfall(schedules: &mut [&mut FeeSchedule], total_paid: Decimal) -> Decimal {
    let mut remaining = total_paid.max(Decimal::ZERO);
    for schedule in schedules.iter_mut() {
        let allocation = remaining.min(schedule.expected_amount).max(Decimal::ZERO);
        schedule.paid_amount = allocation;
        schedule.status = if allocation >= schedule.expected_amount {
            ScheduleStatus::Paid
        } else if allocation > Decimal::ZERO {
            ScheduleStatus::Partial
        } else {
            ScheduleStatus::Pending
        };
        remaining -= allocation;
    }
    remaining
}
