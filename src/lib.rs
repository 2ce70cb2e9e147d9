// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Canopy
//!
//! A declarative reconciliation engine for trees of cloud resources.
//!
//! ## Overview
//!
//! A stack file declares a root component. Canopy expands it into a tree,
//! correlates every node with what was deployed on the previous pass and
//! changes only what differs:
//!
//! - Hydrate the declared tree concurrently against the previous snapshot
//! - Decide per node whether to create, update in place, replace or leave it
//! - Send the minimal set of attribute writes, throttled where the provider
//!   demands it
//! - Remove resources that are no longer declared
//!
//! ## Modules
//!
//! - [`component`]: Component model, lifecycle traits and tree hydration
//! - [`planner`]: Attribute diffing, update execution and deployment plans
//! - [`resources`]: Built-in resource types
//! - [`provider`]: Provider transports used by resource types
//! - [`reconciler`]: The reconciliation driver
//! - [`state`]: Snapshot persistence and locking
//! - [`config`]: Stack file parsing and validation
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: shop
//!   environment: prod
//!
//! provider:
//!   kind: http
//!   endpoint: https://gateway.internal
//!
//! root:
//!   type: group
//!   components:
//!     orders:
//!       type: topic
//!       topicName: orders
//!       displayName: Orders
//!       deliveryStatus:
//!         - protocol: lambda
//!           successFeedbackSampleRate: 50
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod component;
pub mod config;
pub mod error;
pub mod planner;
pub mod provider;
pub mod reconciler;
pub mod resources;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use component::{Component, ComponentTree, Context, InstanceId, Reconcilable, Registry, Resource, hydrate};
pub use config::{ConfigHasher, ConfigParser, ConfigValidator, StackConfig};
pub use error::{CanopyError, Result};
pub use planner::{DeploymentPlan, SerialQueue, diff};
pub use reconciler::{NodeInfo, ReconciliationResult, Reconciler};
pub use resources::builtin_registry;
pub use state::{LocalStateStore, StateSnapshot, StateStore};
