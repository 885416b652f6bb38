//! Ordered extraction rules, first match wins.
//!
//! The order matters: keyword-anchored patterns beat bare digit runs so a
//! body like "Your WhatsApp code 752-637. Don't share 2FA codes" yields
//! the hyphenated code and not a stray digit run. Rule 5 is the
//! unconditional fallback.

use std::sync::LazyLock;

use regex::Regex;

use crate::country_codes::country_for_number;
use crate::records::{OtpRecord, RawMessage};
use crate::service_labels::canonical_service;

static OTP_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // 1. keyword + hyphen/space-split short code: "code: 752-637"
        r"(?i)(?:code|otp|pin|verification)[:\s]*(\d{2,3}[-\s]\d{2,3})",
        // 2. keyword + plain digit run: "verification 4821"
        r"(?i)(?:code|otp|pin|verification)[:\s]*(\d{4,8})",
        // 3. standalone hyphenated short code anywhere
        r"(\d{2,3}[-\s]\d{2,3})",
        // 4. digit run directly followed by an "is your ... code" phrase
        r"(?i)\b(\d{4,8})\s+is\s+your",
        // 5. fallback: first standalone 4-8 digit run
        r"\b(\d{4,8})\b",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("otp rule pattern"))
    .collect()
});

/// Applies the ordered rule list to one scraped record.
///
/// Returns `None` when no rule matches; that is a normal skip for
/// non-OTP traffic, not an error.
pub fn extract(raw: &RawMessage) -> Option<OtpRecord> {
    let code = first_matching_code(&raw.body)?;
    let (country_name, country_flag) = country_for_number(&raw.source_number);
    Some(OtpRecord {
        otp_code: code,
        service: canonical_service(&raw.service_label, &raw.body),
        number: raw.source_number.clone(),
        message_body: raw.body.clone(),
        timestamp: raw.timestamp.clone(),
        country_name: country_name.to_string(),
        country_flag: country_flag.to_string(),
    })
}

fn first_matching_code(body: &str) -> Option<String> {
    for rule in OTP_RULES.iter() {
        if let Some(capture) = rule.captures(body).and_then(|c| c.get(1)) {
            let digits: String = capture
                .as_str()
                .chars()
                .filter(|c| c.is_ascii_digit())
                .collect();
            if !digits.is_empty() {
                return Some(digits);
            }
        }
    }
    None
}
