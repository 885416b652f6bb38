//! Upstream provider access: credentialed session management and SMS
//! record scanning.
//!
//! The provider is a plain HTTP site with a form login gated by an
//! arithmetic captcha. Sessions expire silently, so every authenticated
//! fetch watches for a login bounce and re-authenticates transparently
//! before surfacing failure.

pub mod scan;
pub mod session;

pub use scan::{parse_data_endpoint_rows, parse_html_table_rows, scan};
pub use session::{UpstreamConfig, UpstreamSession};

use thiserror::Error;

/// Errors surfaced by the upstream session and scanner.
///
/// Only `InvalidCredentials` is fatal; everything else is counted by the
/// recovery supervisor and retried on the next cycle.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream rejected credentials")]
    InvalidCredentials,
    #[error("captcha challenge failed: {0}")]
    CaptchaFailed(String),
    #[error("upstream request timed out: {0}")]
    Timeout(String),
    #[error("upstream network failure: {0}")]
    Network(String),
    #[error("unexpected upstream response shape: {0}")]
    Format(String),
}

impl UpstreamError {
    /// Fatal errors halt the polling loop for operator intervention.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidCredentials)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
