use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::aggregation::{billing_period, generate_period_bills, AggregationSummary};
use super::allocation::{apply_payment, validate_payment, PaymentOutcome};
use super::compliance::ComplianceValidator;
use super::domain::{
    Bill, BillId, BillItem, BillingPlan, BillingPlanItem, Deployment, DeploymentId, Employer,
    FeeSchedule, PlanId, Worker,
};
use super::error::BillingError;
use super::fixed_fee::{create_fixed_fee, FixedFeeOutcome, FixedFeeRequest};
use super::plan::{
    chargeable_items, confirm_plan, diff_against, flag_for_review, materialize_schedules,
    placement_facts, regenerate_plan, ConfirmItem, PlanDiff, PlanGenerator,
};
use super::store::{BillingStore, Ledger};
use crate::config::BillingConfig;

/// Plan with its ordered items and owning parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanDetail {
    pub plan: BillingPlan,
    pub items: Vec<BillingPlanItem>,
    pub deployment: Deployment,
    pub employer: Employer,
    pub worker: Worker,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub deployment: Deployment,
    #[serde(flatten)]
    pub diff: PlanDiff,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillDetail {
    pub bill: Bill,
    pub items: Vec<BillItem>,
    pub schedules: Vec<FeeSchedule>,
}

/// Facade composing the store with the plan generator, aggregator, allocator
/// and compliance validator.
pub struct BillingService<S> {
    store: Arc<S>,
    generator: PlanGenerator,
    validator: ComplianceValidator,
}

impl<S> BillingService<S>
where
    S: BillingStore + 'static,
{
    pub fn new(store: Arc<S>, config: BillingConfig) -> Self {
        Self::with_validator(store, config, ComplianceValidator::default())
    }

    pub fn with_validator(
        store: Arc<S>,
        config: BillingConfig,
        validator: ComplianceValidator,
    ) -> Self {
        Self {
            store,
            generator: PlanGenerator::new(config),
            validator,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn generator(&self) -> &PlanGenerator {
        &self.generator
    }

    pub fn plan(&self, plan_id: &PlanId) -> Result<PlanDetail, BillingError> {
        self.store.read(|ledger| plan_detail(ledger, plan_id))?
    }

    /// Project a fresh plan for the deployment, replacing its pending plans.
    pub fn generate_plan(&self, deployment_id: &DeploymentId) -> Result<PlanDetail, BillingError> {
        let now = Utc::now();
        self.store.transaction(|ledger| {
            let plan_id = regenerate_plan(ledger, &self.generator, deployment_id, now)?;
            plan_detail(ledger, &plan_id)
        })
    }

    /// Re-project the plan's deployment from current facts and diff it. No writes.
    pub fn simulate(&self, plan_id: &PlanId) -> Result<SimulationReport, BillingError> {
        let (deployment, existing, facts) = self.store.read(|ledger| {
            let plan = ledger
                .plans
                .get(plan_id)
                .ok_or_else(|| BillingError::not_found("billing plan", plan_id))?;
            let deployment = ledger
                .deployments
                .get(&plan.deployment_id)
                .cloned()
                .ok_or_else(|| BillingError::not_found("deployment", &plan.deployment_id))?;
            let existing: Vec<BillingPlanItem> = chargeable_items(ledger, plan_id)
                .into_iter()
                .cloned()
                .collect();
            let facts = placement_facts(ledger, &plan.deployment_id)?;
            Ok::<_, BillingError>((deployment, existing, facts))
        })??;

        let projection = self.generator.project(&facts)?;
        let existing_refs: Vec<&BillingPlanItem> = existing.iter().collect();
        Ok(SimulationReport {
            deployment,
            diff: diff_against(&existing_refs, &projection),
        })
    }

    pub fn confirm_plan(
        &self,
        plan_id: &PlanId,
        items: &[ConfirmItem],
    ) -> Result<PlanDetail, BillingError> {
        for item in items {
            item.validate()?;
        }
        let now = Utc::now();
        self.store.transaction(|ledger| {
            confirm_plan(ledger, plan_id, items, now)?;
            plan_detail(ledger, plan_id)
        })
    }

    pub fn flag_for_review(
        &self,
        deployment_id: &DeploymentId,
        reason: &str,
    ) -> Result<usize, BillingError> {
        if reason.trim().is_empty() {
            return Err(BillingError::validation("a review reason is required"));
        }
        self.store
            .transaction(|ledger| flag_for_review(ledger, deployment_id, reason.trim()))
    }

    pub fn materialize_schedules(
        &self,
        plan_id: &PlanId,
    ) -> Result<Vec<FeeSchedule>, BillingError> {
        self.store.transaction(|ledger| {
            let created = materialize_schedules(ledger, plan_id)?;
            Ok(created
                .iter()
                .filter_map(|id| ledger.schedules.get(id).cloned())
                .collect())
        })
    }

    pub fn generate_monthly_bills(
        &self,
        year: Option<i32>,
        month: Option<u32>,
    ) -> Result<AggregationSummary, BillingError> {
        let period = billing_period(year, month)?;
        self.store
            .transaction(|ledger| generate_period_bills(ledger, period))
    }

    pub fn pay_bill(
        &self,
        bill_id: &BillId,
        amount: Decimal,
        payment_date: NaiveDate,
    ) -> Result<PaymentOutcome, BillingError> {
        validate_payment(amount)?;
        self.store
            .transaction(|ledger| apply_payment(ledger, bill_id, amount, payment_date))
    }

    pub fn create_fixed_fee(
        &self,
        request: &FixedFeeRequest,
    ) -> Result<FixedFeeOutcome, BillingError> {
        let now = Utc::now();
        let today = now.date_naive();
        self.store.transaction(|ledger| {
            create_fixed_fee(ledger, &self.validator, request, today, now)
        })
    }

    pub fn bill(&self, bill_id: &BillId) -> Result<BillDetail, BillingError> {
        self.store.read(|ledger| {
            let bill = ledger
                .bills
                .get(bill_id)
                .cloned()
                .ok_or_else(|| BillingError::not_found("bill", bill_id))?;
            let items = ledger.bill_items_for(bill_id).into_iter().cloned().collect();
            let schedules = ledger
                .schedules
                .live()
                .filter(|schedule| schedule.bill_id.as_ref() == Some(bill_id))
                .cloned()
                .collect();
            Ok(BillDetail {
                bill,
                items,
                schedules,
            })
        })?
    }
}

fn plan_detail(ledger: &Ledger, plan_id: &PlanId) -> Result<PlanDetail, BillingError> {
    let plan = ledger
        .plans
        .get(plan_id)
        .cloned()
        .ok_or_else(|| BillingError::not_found("billing plan", plan_id))?;
    let deployment = ledger
        .deployments
        .get(&plan.deployment_id)
        .cloned()
        .ok_or_else(|| BillingError::not_found("deployment", &plan.deployment_id))?;
    let employer = ledger
        .employers
        .get(&deployment.employer_id)
        .cloned()
        .ok_or_else(|| BillingError::not_found("employer", &deployment.employer_id))?;
    let worker = ledger
        .workers
        .get(&deployment.worker_id)
        .cloned()
        .ok_or_else(|| BillingError::not_found("worker", &deployment.worker_id))?;
    let items = ledger
        .plan_items_for(plan_id)
        .into_iter()
        .cloned()
        .collect();

    Ok(PlanDetail {
        plan,
        items,
        deployment,
        employer,
        worker,
    })
}
