//! OTP notification routing.
//!
//! Matches extracted OTP records to active leases and pushes Telegram
//! notifications: a direct message to the lease holder plus a masked
//! broadcast to the announcement channel. Delivery failures never stall
//! the scan loop; the router degrades formatting before giving up, and
//! giving up is logged, not propagated.

pub mod format;
pub mod router;
pub mod telegram;

pub use router::{NotificationRouter, RoutingOutcome};
pub use telegram::{TelegramNotifier, TelegramNotifierConfig};

use thiserror::Error;

/// Errors surfaced by the notification layer.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("telegram api rejected message: {0}")]
    Rejected(String),
    #[error("telegram request failed: {0}")]
    Network(String),
    #[error(transparent)]
    Pool(#[from] courier_pool::PoolError),
}

impl From<reqwest::Error> for RouterError {
    fn from(error: reqwest::Error) -> Self {
        RouterError::Network(error.to_string())
    }
}
