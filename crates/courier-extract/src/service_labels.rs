//! Service label canonicalization.

const KNOWN_SERVICES: &[(&str, &str)] = &[
    ("whatsapp", "WhatsApp"),
    ("telegram", "Telegram"),
    ("facebook", "Facebook"),
    ("instagram", "Instagram"),
    ("google", "Google"),
    ("twitter", "Twitter"),
    ("linkedin", "LinkedIn"),
    ("uber", "Uber"),
    ("netflix", "Netflix"),
];

const UNKNOWN_SERVICE: &str = "Unknown";

/// Resolves the canonical service name for a record.
///
/// The upstream-provided label wins when it names a known service; the
/// message body is consulted as a fallback because the CLI column is
/// often a bare shortcode. Defaults to `"Unknown"`.
pub fn canonical_service(label: &str, body: &str) -> String {
    let label_lower = label.trim().to_lowercase();
    for (needle, canonical) in KNOWN_SERVICES {
        if label_lower.contains(needle) {
            return (*canonical).to_string();
        }
    }
    let body_lower = body.to_lowercase();
    for (needle, canonical) in KNOWN_SERVICES {
        if body_lower.contains(needle) {
            return (*canonical).to_string();
        }
    }
    let trimmed = label.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("unknown") {
        UNKNOWN_SERVICE.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_case_normalized() {
        assert_eq!(canonical_service("TELEGRAM", ""), "Telegram");
        assert_eq!(canonical_service("whatsapp verify", ""), "WhatsApp");
    }

    #[test]
    fn body_fallback_when_label_is_shortcode() {
        assert_eq!(
            canonical_service("54321", "Your WhatsApp code is 123-456"),
            "WhatsApp"
        );
    }

    #[test]
    fn unrecognized_label_passes_through() {
        assert_eq!(canonical_service("AcmeBank", "code 1122"), "AcmeBank");
    }

    #[test]
    fn empty_label_and_body_default_to_unknown() {
        assert_eq!(canonical_service("", "code 1122"), "Unknown");
    }
}
