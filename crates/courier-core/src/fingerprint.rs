//! Stable fingerprints for inbound SMS records.
//!
//! Two canonical identities are supported: body-only, and
//! timestamp+number+truncated-body for extra precision when the upstream
//! repeats identical bodies across numbers.

use sha2::{Digest, Sha256};

const FINGERPRINT_HEX_CHARS: usize = 16;
const BODY_PREFIX_CHARS: usize = 50;

/// Short stable hash identifying one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageFingerprint(String);

impl MessageFingerprint {
    /// Fingerprints a message by body alone.
    pub fn of_body(body: &str) -> Self {
        Self(short_hex_digest(body.trim().as_bytes()))
    }

    /// Fingerprints a message by timestamp, number, and truncated body.
    pub fn of_record(timestamp: &str, number: &str, body: &str) -> Self {
        let prefix: String = body.trim().chars().take(BODY_PREFIX_CHARS).collect();
        let canonical = format!("{}|{}|{}", timestamp.trim(), number.trim(), prefix);
        Self(short_hex_digest(canonical.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn short_hex_digest(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    let mut hex = String::with_capacity(FINGERPRINT_HEX_CHARS);
    for byte in digest.iter() {
        if hex.len() >= FINGERPRINT_HEX_CHARS {
            break;
        }
        hex.push_str(&format!("{byte:02x}"));
    }
    hex.truncate(FINGERPRINT_HEX_CHARS);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_fingerprint_is_stable_and_trimmed() {
        let a = MessageFingerprint::of_body("Your code is 752-637");
        let b = MessageFingerprint::of_body("  Your code is 752-637  ");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn record_fingerprint_varies_by_number() {
        let a = MessageFingerprint::of_record("2025-01-01 10:00:00", "21612345678", "code 1234");
        let b = MessageFingerprint::of_record("2025-01-01 10:00:00", "21687654321", "code 1234");
        assert_ne!(a, b);
    }

    #[test]
    fn record_fingerprint_ignores_long_body_tail() {
        let tail_a = "x".repeat(200);
        let tail_b = "y".repeat(200);
        let head = "z".repeat(50);
        let a = MessageFingerprint::of_record("t", "n", &format!("{head}{tail_a}"));
        let b = MessageFingerprint::of_record("t", "n", &format!("{head}{tail_b}"));
        assert_eq!(a, b);
    }
}
