//! State store trait definition.

use async_trait::async_trait;

use crate::error::Result;

use super::lock::LockInfo;
use super::types::StateSnapshot;

/// Trait for state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the snapshot.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<StateSnapshot>>;

    /// Saves the snapshot.
    async fn save(&self, state: &StateSnapshot) -> Result<()>;

    /// Deletes the snapshot and any lock.
    async fn delete(&self) -> Result<()>;

    /// Checks if state exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires the state lock.
    ///
    /// An empty `holder` is replaced by a generated identifier.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Releases the lock if it is still held under `lock_id`.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the state is locked by a live lock.
    async fn is_locked(&self) -> Result<bool>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
