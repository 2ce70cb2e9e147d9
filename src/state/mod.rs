//! State management module.
//!
//! This module persists the previous-state snapshot between reconciliation
//! passes, together with a short history and the state lock.

mod local;
mod lock;
mod store;
mod types;

pub use local::{LocalStateStore, STATE_DIR};
pub use lock::{LOCK_EXPIRY_SECS, LockInfo, generate_holder_id};
pub use store::StateStore;
pub use types::{HistoryEntry, Operation, STATE_VERSION, StateNode, StateSnapshot};
