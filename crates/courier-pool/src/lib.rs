//! Phone number inventory, leasing, and cooldown tracking.
//!
//! The pool owns per-country number inventories loaded once at startup
//! and leases numbers to users. The one must-hold invariant lives here:
//! no two active leases ever share a number, enforced by a storage-level
//! conditional write rather than in-memory bookkeeping, so concurrent
//! lease requests and process restarts cannot violate it.

pub mod inventory;
pub mod pool;
pub mod store;

pub use inventory::load_inventories;
pub use pool::{normalize_number, NumberPool, NumberPoolConfig};
pub use store::{Lease, LeaseStore};

use thiserror::Error;

/// Result type for pool and store operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors surfaced by the number pool.
///
/// `NoAvailableNumber` is an expected business outcome, not a fault: the
/// caller shows a "try another country" response and moves on.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no available number for country '{0}'")]
    NoAvailableNumber(String),
    #[error("unknown country '{0}'")]
    UnknownCountry(String),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
