//! Foundational utilities shared across courier crates.
//!
//! Provides unix-time helpers, message fingerprinting, and the bounded
//! deduplication ledger used by the polling loop.

pub mod dedup_ledger;
pub mod fingerprint;
pub mod time_utils;

pub use dedup_ledger::DedupLedger;
pub use fingerprint::MessageFingerprint;
pub use time_utils::{current_unix_timestamp, unix_deadline_after};
