//! Bounded ledger of already-processed message fingerprints.
//!
//! The polling loop is serialized, so no interior locking is needed. When
//! the ledger exceeds its cap it drops the oldest half in one pass rather
//! than maintaining strict LRU; message volume is low enough that the
//! approximation never matters.

use std::collections::HashSet;
use std::collections::VecDeque;

use crate::fingerprint::MessageFingerprint;

pub const DEFAULT_LEDGER_CAPACITY: usize = 1_000;

#[derive(Debug)]
pub struct DedupLedger {
    max_entries: usize,
    order: VecDeque<MessageFingerprint>,
    seen: HashSet<MessageFingerprint>,
}

impl DedupLedger {
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(2),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    pub fn is_duplicate(&self, fingerprint: &MessageFingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    /// Records a fingerprint, trimming the oldest half once over capacity.
    /// Returns false when the fingerprint was already present.
    pub fn record(&mut self, fingerprint: MessageFingerprint) -> bool {
        if !self.seen.insert(fingerprint.clone()) {
            return false;
        }
        self.order.push_back(fingerprint);
        if self.order.len() > self.max_entries {
            let drop_count = self.order.len() / 2;
            for _ in 0..drop_count {
                if let Some(old) = self.order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(n: usize) -> MessageFingerprint {
        MessageFingerprint::of_body(&format!("message-{n}"))
    }

    #[test]
    fn record_then_duplicate() {
        let mut ledger = DedupLedger::new(10);
        assert!(!ledger.is_duplicate(&fp(1)));
        assert!(ledger.record(fp(1)));
        assert!(ledger.is_duplicate(&fp(1)));
        assert!(!ledger.record(fp(1)));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn trims_oldest_half_when_over_capacity() {
        let mut ledger = DedupLedger::new(10);
        for n in 0..11 {
            ledger.record(fp(n));
        }
        // 11 entries trimmed back down to 6: the first five are evicted.
        assert_eq!(ledger.len(), 6);
        assert!(!ledger.is_duplicate(&fp(0)));
        assert!(!ledger.is_duplicate(&fp(4)));
        assert!(ledger.is_duplicate(&fp(5)));
        assert!(ledger.is_duplicate(&fp(10)));
    }

    #[test]
    fn evicted_entries_can_be_recorded_again() {
        let mut ledger = DedupLedger::new(4);
        for n in 0..5 {
            ledger.record(fp(n));
        }
        assert!(!ledger.is_duplicate(&fp(0)));
        assert!(ledger.record(fp(0)));
        assert!(ledger.is_duplicate(&fp(0)));
    }
}
