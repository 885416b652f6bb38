/// One scraped SMS record, normalized from either upstream strategy.
/// Ephemeral; produced per poll cycle and dropped after routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Upstream-formatted timestamp, typically `YYYY-MM-DD HH:MM:SS`.
    pub timestamp: String,
    /// Destination number the SMS arrived on.
    pub source_number: String,
    /// Upstream-provided sender/service label (CLI column).
    pub service_label: String,
    /// Full message body.
    pub body: String,
}

/// A structured one-time-passcode derived from a [`RawMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    /// Canonical digits with hyphen/space separators stripped.
    pub otp_code: String,
    /// Canonicalized service name, `"Unknown"` when undetectable.
    pub service: String,
    /// Destination number, as scraped.
    pub number: String,
    /// Full message body.
    pub message_body: String,
    /// Upstream timestamp string.
    pub timestamp: String,
    /// Display-only country metadata derived from the number prefix.
    pub country_name: String,
    pub country_flag: String,
}
