//! Fee-plan projection, regeneration, review and confirmation.

mod export;
mod generator;
mod lifecycle;
mod simulator;

pub use export::write_plan_csv;
pub use generator::{
    months_between, prorate, PlacementFacts, PlanGenerator, PlanProjection, ProjectedItem,
};
pub use lifecycle::{
    chargeable_items, confirm_plan, flag_for_review, materialize_schedules, placement_facts,
    regenerate_plan, ConfirmItem,
};
pub use simulator::{diff_against, DiffedItem, PlanDiff};
