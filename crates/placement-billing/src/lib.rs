//! Deployment billing engine for a labor-placement agency.
//!
//! The [`billing`] module projects fee plans for worker placements, diffs them
//! against confirmed plans, aggregates installments into bills, allocates
//! payments across linked installments and gates one-off fees under third-party
//! labor standards. [`config`], [`telemetry`] and [`error`] carry the service
//! plumbing shared with the `placement-billing-api` binary.

pub mod billing;
pub mod config;
pub mod error;
pub mod telemetry;
