//! Planning module for reconciliation passes.
//!
//! This module holds the attribute diff engine, the update execution
//! primitives used by resource adapters, and the deployment plan derived
//! from a hydrated tree.

mod diff;
mod executor;
mod plan;

pub use diff::{AttributeChange, apply_changes, diff, flatten_entries, is_truthy, serialize_value};
pub use executor::{SerialQueue, UpdateOrdering, run_concurrently};
pub use plan::{ActionType, DeploymentPlan, Orphan, PlannedAction};
