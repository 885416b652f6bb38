//! Unix-time helpers for lease and cooldown bookkeeping.

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns the Unix deadline `secs` from now, saturating on overflow.
pub fn unix_deadline_after(secs: u64) -> u64 {
    current_unix_timestamp().saturating_add(secs)
}
