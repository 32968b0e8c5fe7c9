//! Relational-store abstraction for the billing engine.
//!
//! Every table is wrapped in [`Table`], which keeps soft-deleted rows around but
//! hides them from the default queries. Callers say explicitly when they want
//! history (`including_deleted`) instead of relying on an implicit data-access
//! hook.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use tracing::warn;

use super::domain::{
    Bill, BillId, BillItem, BillItemId, BillingPlan, BillingPlanItem, ComplianceOverride,
    Deployment, DeploymentId, Employer, EmployerId, FeeItem, FeeItemId, FeeSchedule, OverrideId,
    Payment, PaymentId, PlanId, PlanItemId, PlanStatus, ScheduleId, Worker, WorkerId,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

#[derive(Debug, Clone)]
struct Row<V> {
    value: V,
    deleted: bool,
}

/// Keyed table with soft-delete semantics.
#[derive(Debug, Clone)]
pub struct Table<K, V> {
    rows: BTreeMap<K, Row<V>>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, V> Table<K, V> {
    pub fn insert(&mut self, key: K, value: V) {
        self.rows.insert(
            key,
            Row {
                value,
                deleted: false,
            },
        );
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows
            .get(key)
            .filter(|row| !row.deleted)
            .map(|row| &row.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.rows
            .get_mut(key)
            .filter(|row| !row.deleted)
            .map(|row| &mut row.value)
    }

    pub fn live(&self) -> impl Iterator<Item = &V> {
        self.rows
            .values()
            .filter(|row| !row.deleted)
            .map(|row| &row.value)
    }

    pub fn live_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.rows
            .values_mut()
            .filter(|row| !row.deleted)
            .map(|row| &mut row.value)
    }

    /// Every row with its deletion flag, for audits.
    pub fn including_deleted(&self) -> impl Iterator<Item = (&V, bool)> {
        self.rows.values().map(|row| (&row.value, row.deleted))
    }

    /// Marks the row deleted. Returns false when it was missing or already deleted.
    pub fn soft_delete(&mut self, key: &K) -> bool {
        match self.rows.get_mut(key) {
            Some(row) if !row.deleted => {
                row.deleted = true;
                true
            }
            _ => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live().count()
    }
}

/// All persisted billing state. Mutated only inside [`BillingStore::transaction`].
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub workers: Table<WorkerId, Worker>,
    pub employers: Table<EmployerId, Employer>,
    pub deployments: Table<DeploymentId, Deployment>,
    pub fee_items: Table<FeeItemId, FeeItem>,
    pub plans: Table<PlanId, BillingPlan>,
    pub plan_items: Table<PlanItemId, BillingPlanItem>,
    pub schedules: Table<ScheduleId, FeeSchedule>,
    pub bills: Table<BillId, Bill>,
    pub bill_items: Table<BillItemId, BillItem>,
    pub payments: Table<PaymentId, Payment>,
    pub overrides: Table<OverrideId, ComplianceOverride>,
    sequence: u64,
}

impl Ledger {
    /// Allocates the next row identifier, e.g. `plan-000007`.
    pub fn next_id<T: From<String>>(&mut self, prefix: &str) -> T {
        self.sequence += 1;
        T::from(format!("{prefix}-{:06}", self.sequence))
    }

    /// Live items of a plan ordered by billing month, then category.
    pub fn plan_items_for(&self, plan_id: &PlanId) -> Vec<&BillingPlanItem> {
        let mut items: Vec<&BillingPlanItem> = self
            .plan_items
            .live()
            .filter(|item| &item.plan_id == plan_id)
            .collect();
        items.sort_by_key(|item| (item.billing_month, item.category));
        items
    }

    pub fn plans_for(&self, deployment_id: &DeploymentId) -> Vec<&BillingPlan> {
        self.plans
            .live()
            .filter(|plan| &plan.deployment_id == deployment_id)
            .collect()
    }

    pub fn pending_plan_ids(&self, deployment_id: &DeploymentId) -> Vec<PlanId> {
        self.plans_for(deployment_id)
            .into_iter()
            .filter(|plan| plan.status == PlanStatus::Pending)
            .map(|plan| plan.id.clone())
            .collect()
    }

    /// Soft-deletes a plan together with its items.
    pub fn delete_plan(&mut self, plan_id: &PlanId) {
        let item_ids: Vec<PlanItemId> = self
            .plan_items
            .live()
            .filter(|item| &item.plan_id == plan_id)
            .map(|item| item.id.clone())
            .collect();
        for item_id in &item_ids {
            self.plan_items.soft_delete(item_id);
        }
        self.plans.soft_delete(plan_id);
    }

    pub fn schedules_for(&self, deployment_id: &DeploymentId) -> Vec<&FeeSchedule> {
        let mut schedules: Vec<&FeeSchedule> = self
            .schedules
            .live()
            .filter(|schedule| &schedule.deployment_id == deployment_id)
            .collect();
        schedules.sort_by_key(|schedule| (schedule.due_date, schedule.installment_no));
        schedules
    }

    pub fn schedule_ids_linked_to(&self, bill_id: &BillId) -> Vec<ScheduleId> {
        self.schedules
            .live()
            .filter(|schedule| schedule.bill_id.as_ref() == Some(bill_id))
            .map(|schedule| schedule.id.clone())
            .collect()
    }

    pub fn bill_items_for(&self, bill_id: &BillId) -> Vec<&BillItem> {
        self.bill_items
            .live()
            .filter(|item| &item.bill_id == bill_id)
            .collect()
    }

    /// The worker's placement active on `date`, latest start first.
    pub fn active_deployment_for(
        &self,
        worker_id: &WorkerId,
        date: NaiveDate,
    ) -> Option<&Deployment> {
        self.deployments
            .live()
            .filter(|deployment| {
                &deployment.worker_id == worker_id && deployment.is_active_on(date)
            })
            .max_by_key(|deployment| deployment.start_date)
    }

    /// Fee standard by name, preferring the nationality-specific variant.
    pub fn fee_item_for(&self, name: &str, nationality: &str) -> Option<&FeeItem> {
        let mut generic = None;
        for item in self.fee_items.live().filter(|item| item.name == name) {
            match item.nationality.as_deref() {
                Some(code) if code.eq_ignore_ascii_case(nationality) => return Some(item),
                None if generic.is_none() => generic = Some(item),
                _ => {}
            }
        }
        generic
    }
}

/// Storage abstraction so the billing service can be exercised in isolation.
///
/// `transaction` is all-or-nothing: when the closure returns `Err`, none of its
/// writes become visible.
pub trait BillingStore: Send + Sync {
    fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Ledger) -> T;

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<StoreError>;
}

/// Process-local store; transactions run against a working copy that replaces
/// the committed ledger only on success.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBillingStore {
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryBillingStore {
    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(Mutex::new(ledger)),
        }
    }

    /// A panicking transaction only ever touched its working copy, so the
    /// committed ledger behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(|poisoned: PoisonError<_>| {
            warn!("recovering ledger lock after a panicked transaction");
            self.ledger.clear_poison();
            poisoned.into_inner()
        })
    }
}

impl BillingStore for InMemoryBillingStore {
    fn read<T, F>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Ledger) -> T,
    {
        let guard = self.lock();
        Ok(query(&guard))
    }

    fn transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Ledger) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut guard = self.lock();
        let mut working = guard.clone();
        let value = work(&mut working)?;
        *guard = working;
        Ok(value)
    }
}
