use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::generator::{PlacementFacts, PlanGenerator, PlanProjection};
use crate::billing::domain::{
    checked_total, BillingMonth, BillingPlan, BillingPlanItem, DeploymentId, FeeSchedule,
    PlanId, PlanItemCategory, PlanItemId, PlanItemStatus, PlanStatus, ReviewStatus, ScheduleId,
    ScheduleStatus,
};
use crate::billing::error::BillingError;
use crate::billing::store::Ledger;

/// Per-line edit submitted when a reviewer confirms a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmItem {
    #[serde(default)]
    pub id: Option<PlanItemId>,
    pub amount: Decimal,
    pub status: PlanItemStatus,
    pub description: String,
    /// Required for new lines (no `id`).
    #[serde(default)]
    pub billing_month: Option<BillingMonth>,
    #[serde(default)]
    pub category: Option<PlanItemCategory>,
}

impl ConfirmItem {
    pub(crate) fn validate(&self) -> Result<(), BillingError> {
        if self.amount < Decimal::ZERO {
            return Err(BillingError::validation(format!(
                "plan item amount must not be negative (got {})",
                self.amount
            )));
        }
        if self.id.is_none() && (self.billing_month.is_none() || self.category.is_none()) {
            return Err(BillingError::validation(
                "new plan items require billingMonth and category",
            ));
        }
        Ok(())
    }
}

/// Resolve the generator inputs for a deployment from current records.
pub fn placement_facts(
    ledger: &Ledger,
    deployment_id: &DeploymentId,
) -> Result<PlacementFacts, BillingError> {
    let deployment = ledger
        .deployments
        .get(deployment_id)
        .ok_or_else(|| BillingError::not_found("deployment", deployment_id))?;
    let worker = ledger
        .workers
        .get(&deployment.worker_id)
        .ok_or_else(|| BillingError::not_found("worker", &deployment.worker_id))?;

    Ok(PlacementFacts {
        start_date: deployment.start_date,
        end_date: deployment.end_date,
        monthly_service_fee: deployment.monthly_service_fee,
        passport_expiry: worker.passport.as_ref().map(|passport| passport.expiry_date),
        lodging: worker.lodging.clone(),
    })
}

/// Replace the deployment's pending plans with a freshly projected one.
pub fn regenerate_plan(
    ledger: &mut Ledger,
    generator: &PlanGenerator,
    deployment_id: &DeploymentId,
    now: DateTime<Utc>,
) -> Result<PlanId, BillingError> {
    let facts = placement_facts(ledger, deployment_id)?;
    let projection = generator.project(&facts)?;

    let stale = ledger.pending_plan_ids(deployment_id);
    for plan_id in &stale {
        ledger.delete_plan(plan_id);
    }

    let plan_id = insert_plan(ledger, deployment_id, &projection, now);
    info!(
        deployment = %deployment_id,
        plan = %plan_id,
        replaced = stale.len(),
        items = projection.items.len(),
        total = %projection.total(),
        "billing plan generated"
    );
    Ok(plan_id)
}

fn insert_plan(
    ledger: &mut Ledger,
    deployment_id: &DeploymentId,
    projection: &PlanProjection,
    now: DateTime<Utc>,
) -> PlanId {
    let plan_id: PlanId = ledger.next_id("plan");
    ledger.plans.insert(
        plan_id.clone(),
        BillingPlan {
            id: plan_id.clone(),
            deployment_id: deployment_id.clone(),
            total_amount: projection.total(),
            status: PlanStatus::Pending,
            review_status: ReviewStatus::Normal,
            review_reason: None,
            created_at: now,
            confirmed_at: None,
        },
    );

    for projected in &projection.items {
        let item_id: PlanItemId = ledger.next_id("plan-item");
        ledger.plan_items.insert(
            item_id.clone(),
            BillingPlanItem {
                id: item_id,
                plan_id: plan_id.clone(),
                billing_month: projected.billing_month,
                amount: projected.amount,
                category: projected.category,
                status: PlanItemStatus::Generated,
                is_prorated: projected.is_prorated,
                description: projected.description.clone(),
            },
        );
    }

    plan_id
}

/// Apply reviewer edits, then mark the plan confirmed and clear its review flag.
pub fn confirm_plan(
    ledger: &mut Ledger,
    plan_id: &PlanId,
    updates: &[ConfirmItem],
    now: DateTime<Utc>,
) -> Result<(), BillingError> {
    if ledger.plans.get(plan_id).is_none() {
        return Err(BillingError::not_found("billing plan", plan_id));
    }

    for update in updates {
        match &update.id {
            Some(item_id) => {
                let item = ledger
                    .plan_items
                    .get_mut(item_id)
                    .ok_or_else(|| BillingError::not_found("billing plan item", item_id))?;
                if &item.plan_id != plan_id {
                    return Err(BillingError::Conflict(format!(
                        "plan item {item_id} belongs to plan {}",
                        item.plan_id
                    )));
                }
                item.amount = update.amount;
                item.status = update.status;
                item.description = update.description.clone();
            }
            None => {
                let (Some(billing_month), Some(category)) = (update.billing_month, update.category)
                else {
                    return Err(BillingError::validation(
                        "new plan items require billingMonth and category",
                    ));
                };
                let item_id: PlanItemId = ledger.next_id("plan-item");
                debug!(
                    plan = %plan_id,
                    item = %item_id,
                    %billing_month,
                    "plan item added on confirm"
                );
                ledger.plan_items.insert(
                    item_id.clone(),
                    BillingPlanItem {
                        id: item_id,
                        plan_id: plan_id.clone(),
                        billing_month,
                        amount: update.amount,
                        category,
                        status: update.status,
                        is_prorated: false,
                        description: update.description.clone(),
                    },
                );
            }
        }
    }

    let total = chargeable_total(ledger, plan_id)?;
    let plan = ledger
        .plans
        .get_mut(plan_id)
        .ok_or_else(|| BillingError::not_found("billing plan", plan_id))?;
    plan.total_amount = total;
    plan.status = PlanStatus::Confirmed;
    plan.review_status = ReviewStatus::Normal;
    plan.review_reason = None;
    plan.confirmed_at = Some(now);

    info!(plan = %plan_id, edits = updates.len(), %total, "billing plan confirmed");
    Ok(())
}

/// Live, non-cancelled items of a plan.
pub fn chargeable_items<'a>(ledger: &'a Ledger, plan_id: &PlanId) -> Vec<&'a BillingPlanItem> {
    ledger
        .plan_items_for(plan_id)
        .into_iter()
        .filter(|item| item.status != PlanItemStatus::Cancelled)
        .collect()
}

fn chargeable_total(ledger: &Ledger, plan_id: &PlanId) -> Result<Decimal, BillingError> {
    checked_total(chargeable_items(ledger, plan_id).iter().map(|item| item.amount))
        .ok_or_else(|| BillingError::validation(format!("plan {plan_id} total is out of range")))
}

/// Flag every live plan of the deployment for review. Confirmed lines stay as they are.
pub fn flag_for_review(
    ledger: &mut Ledger,
    deployment_id: &DeploymentId,
    reason: &str,
) -> Result<usize, BillingError> {
    if ledger.deployments.get(deployment_id).is_none() {
        return Err(BillingError::not_found("deployment", deployment_id));
    }

    let mut flagged = 0;
    for plan in ledger
        .plans
        .live_mut()
        .filter(|plan| &plan.deployment_id == deployment_id)
    {
        plan.review_status = ReviewStatus::NeedsReview;
        plan.review_reason = Some(reason.to_string());
        flagged += 1;
    }

    info!(deployment = %deployment_id, flagged, reason, "billing plans flagged for review");
    Ok(flagged)
}

/// Turn a confirmed plan into one payable installment per billing month.
///
/// Installments nobody has touched yet (pending, unpaid, unbilled) are replaced;
/// months still covered by touched installments are left alone.
pub fn materialize_schedules(
    ledger: &mut Ledger,
    plan_id: &PlanId,
) -> Result<Vec<ScheduleId>, BillingError> {
    let plan = ledger
        .plans
        .get(plan_id)
        .ok_or_else(|| BillingError::not_found("billing plan", plan_id))?;
    if plan.status != PlanStatus::Confirmed {
        return Err(BillingError::Conflict(format!(
            "plan {plan_id} must be confirmed before installments are created"
        )));
    }
    let deployment_id = plan.deployment_id.clone();

    let mut monthly: BTreeMap<BillingMonth, Decimal> = BTreeMap::new();
    for item in chargeable_items(ledger, plan_id) {
        let slot = monthly.entry(item.billing_month).or_default();
        *slot = slot.checked_add(item.amount).ok_or_else(|| {
            BillingError::validation(format!(
                "plan {plan_id} amount for {} is out of range",
                item.billing_month
            ))
        })?;
    }

    let untouched: Vec<ScheduleId> = ledger
        .schedules_for(&deployment_id)
        .into_iter()
        .filter(|schedule| {
            schedule.status == ScheduleStatus::Pending
                && schedule.paid_amount.is_zero()
                && schedule.bill_id.is_none()
        })
        .map(|schedule| schedule.id.clone())
        .collect();
    for schedule_id in &untouched {
        ledger.schedules.soft_delete(schedule_id);
    }

    let covered: BTreeSet<BillingMonth> = ledger
        .schedules_for(&deployment_id)
        .into_iter()
        .map(|schedule| BillingMonth::of(schedule.due_date))
        .collect();
    let mut installment_no = ledger
        .schedules
        .including_deleted()
        .filter(|(schedule, _)| schedule.deployment_id == deployment_id)
        .map(|(schedule, _)| schedule.installment_no)
        .max()
        .unwrap_or(0);

    let mut created = Vec::new();
    for (month, expected) in monthly {
        if covered.contains(&month) || expected <= Decimal::ZERO {
            continue;
        }
        installment_no += 1;
        let schedule_id: ScheduleId = ledger.next_id("schedule");
        ledger.schedules.insert(
            schedule_id.clone(),
            FeeSchedule {
                id: schedule_id.clone(),
                deployment_id: deployment_id.clone(),
                installment_no,
                due_date: month.first_day(),
                expected_amount: expected,
                paid_amount: Decimal::ZERO,
                status: ScheduleStatus::Pending,
                bill_id: None,
            },
        );
        created.push(schedule_id);
    }

    info!(
        plan = %plan_id,
        deployment = %deployment_id,
        replaced = untouched.len(),
        created = created.len(),
        "installments materialized"
    );
    Ok(created)
}
