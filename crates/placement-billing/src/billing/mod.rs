//! Deployment billing engine: fee-plan projection and review, periodic bill
//! aggregation, waterfall payment allocation, and the fee compliance gate.
//!
//! Every multi-row mutation runs inside one [`BillingStore::transaction`], so a
//! failed regeneration, aggregation run or payment leaves no partial rows.

pub mod aggregation;
pub mod allocation;
pub mod compliance;
pub mod domain;
pub mod error;
pub mod fixed_fee;
pub mod plan;
pub mod router;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use aggregation::{billing_period, generate_period_bills, AggregationSummary};
pub use allocation::{allocate_waterfall, apply_payment, validate_payment, PaymentOutcome};
pub use compliance::{
    ComplianceContext, ComplianceDecision, CompliancePolicy, ComplianceValidator, FeeDefinition,
    Severity,
};
pub use domain::{
    checked_total, round_amount, Bill, BillId, BillItem, BillItemId, BillStatus, BillingMonth,
    BillingMonthParseError, BillingPlan, BillingPlanItem, ComplianceOverride, ComplianceStandard,
    Deployment, DeploymentId, Employer, EmployerId, FeeCategory, FeeItem, FeeItemId, FeeSchedule,
    LodgingAssignment, OverrideId, Passport, PayerType, Payment, PaymentId, PlanId,
    PlanItemCategory, PlanItemId, PlanItemStatus, PlanStatus, ReviewStatus, ScheduleId,
    ScheduleStatus, Worker, WorkerId,
};
pub use error::BillingError;
pub use fixed_fee::{FixedFeeOutcome, FixedFeeRequest};
pub use plan::{
    write_plan_csv, ConfirmItem, DiffedItem, PlacementFacts, PlanDiff, PlanGenerator,
    PlanProjection, ProjectedItem,
};
pub use router::billing_router;
pub use service::{BillDetail, BillingService, PlanDetail, SimulationReport};
pub use store::{BillingStore, InMemoryBillingStore, Ledger, StoreError, Table};
