//! Persistence port.
//!
//! The state manager snapshots into [`PersistedState`]; this trait is how
//! a snapshot reaches durable storage. A missing store on first run is
//! `Ok(None)` -- the caller initializes empty state, there is no
//! exception-driven "file not found" control flow.

use std::future::Future;

use samovar_types::error::PersistenceError;
use samovar_types::persist::PersistedState;

/// Trait for the durable state store.
///
/// Implementations live in samovar-infra (e.g. `JsonStateStore`).
pub trait StateStore: Send + Sync {
    /// Load the persisted state, if any exists.
    ///
    /// Returns `Ok(None)` when nothing has been saved yet; errors are
    /// reserved for stores that exist but cannot be read.
    fn try_load(
        &self,
    ) -> impl Future<Output = Result<Option<PersistedState>, PersistenceError>> + Send;

    /// Write the full state snapshot.
    ///
    /// Failures are logged by callers and retried on the next periodic
    /// save; they never stop the running process.
    fn save(
        &self,
        state: &PersistedState,
    ) -> impl Future<Output = Result<(), PersistenceError>> + Send;
}
