//! Number pool allocation over the durable lease store.

use std::collections::BTreeMap;
use std::path::Path;

use rand::seq::SliceRandom;
use rand::thread_rng;

use courier_core::time_utils::{current_unix_timestamp, unix_deadline_after};

use crate::inventory::load_inventories;
use crate::store::{Lease, LeaseStore};
use crate::{PoolError, PoolResult};

/// Default time a number rests after delivering an OTP.
pub const DEFAULT_COOLDOWN_SECS: u64 = 48 * 60 * 60;

#[derive(Debug, Clone)]
pub struct NumberPoolConfig {
    /// Seconds a number stays unavailable after an OTP is delivered
    /// through it.
    pub cooldown_secs: u64,
}

impl Default for NumberPoolConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: DEFAULT_COOLDOWN_SECS,
        }
    }
}

/// Leases numbers out of static per-country inventories.
///
/// All mutable state lives in the [`LeaseStore`]; the pool itself only
/// holds the immutable inventories and the cooldown policy, so any
/// number of handles can allocate concurrently.
#[derive(Debug, Clone)]
pub struct NumberPool {
    inventories: BTreeMap<String, Vec<String>>,
    store: LeaseStore,
    config: NumberPoolConfig,
}

impl NumberPool {
    pub fn new(
        inventories: BTreeMap<String, Vec<String>>,
        store: LeaseStore,
        config: NumberPoolConfig,
    ) -> Self {
        Self {
            inventories,
            store,
            config,
        }
    }

    /// Builds a pool by loading every country inventory under `dir`.
    pub fn from_inventory_dir(
        dir: &Path,
        store: LeaseStore,
        config: NumberPoolConfig,
    ) -> PoolResult<Self> {
        let inventories = load_inventories(dir)?;
        Ok(Self::new(inventories, store, config))
    }

    /// Countries with at least one number on file.
    pub fn countries(&self) -> Vec<&str> {
        self.inventories
            .iter()
            .filter(|(_, numbers)| !numbers.is_empty())
            .map(|(country, _)| country.as_str())
            .collect()
    }

    /// Leases a number from `country` to `user_id`, superseding any
    /// lease the user already holds.
    ///
    /// Candidates are shuffled so load spreads across the inventory, and
    /// the actual claim is the store's conditional write; losing a race
    /// for one candidate just moves on to the next. When every number is
    /// leased or cooling down this returns [`PoolError::NoAvailableNumber`].
    pub fn lease(&self, country: &str, user_id: &str) -> PoolResult<Lease> {
        let inventory = self
            .inventories
            .get(country)
            .ok_or_else(|| PoolError::UnknownCountry(country.to_string()))?;

        let now = current_unix_timestamp();
        self.store.purge_expired_cooldowns(now)?;
        let leased = self.store.active_numbers()?;
        let cooling = self.store.unexpired_cooldowns(now)?;

        let mut candidates: Vec<&String> = inventory
            .iter()
            .filter(|number| !leased.contains(*number) && !cooling.contains(*number))
            .collect();
        candidates.shuffle(&mut thread_rng());

        for number in candidates {
            if self.store.try_assign(user_id, number, country, now)? {
                tracing::info!(user_id, number, country, "leased number");
                return Ok(Lease {
                    user_id: user_id.to_string(),
                    number: number.clone(),
                    country: country.to_string(),
                    assigned_at_unix: now,
                    waiting_for_otp: true,
                });
            }
        }
        tracing::warn!(country, user_id, "country inventory exhausted");
        Err(PoolError::NoAvailableNumber(country.to_string()))
    }

    /// Releases the user's active lease, if any, and returns it.
    pub fn release(&self, user_id: &str) -> PoolResult<Option<Lease>> {
        let released = self.store.release_active_lease(user_id)?;
        if let Some(lease) = &released {
            tracing::info!(user_id, number = %lease.number, "released lease");
        }
        Ok(released)
    }

    /// Finds the active lease for a source number, matching the exact
    /// string first and the digit-normalized forms second.
    pub fn find_active_lease(&self, source_number: &str) -> PoolResult<Option<Lease>> {
        let leases = self.store.active_leases()?;
        if let Some(lease) = leases.iter().find(|l| l.number == source_number) {
            return Ok(Some(lease.clone()));
        }
        let normalized = normalize_number(source_number);
        Ok(leases
            .iter()
            .find(|l| normalize_number(&l.number) == normalized)
            .cloned())
    }

    /// Records a delivered OTP: history row plus a fresh cooldown for
    /// the number. The lease stays active and keeps receiving follow-up
    /// OTPs until the user releases it.
    pub fn record_delivery(
        &self,
        lease: &Lease,
        otp_code: &str,
        service: &str,
    ) -> PoolResult<()> {
        self.store.insert_otp_history(
            &lease.user_id,
            &lease.number,
            otp_code,
            service,
            current_unix_timestamp(),
        )?;
        self.store
            .upsert_cooldown(&lease.number, unix_deadline_after(self.config.cooldown_secs))?;
        Ok(())
    }

    pub fn store(&self) -> &LeaseStore {
        &self.store
    }
}

/// Normalizes a phone number to bare digits for matching, so
/// "+216 12 345 678" and "21612345678" compare equal.
pub fn normalize_number(number: &str) -> String {
    number.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_with(numbers: &[&str], cooldown_secs: u64) -> (tempfile::TempDir, NumberPool) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LeaseStore::new(dir.path().join("courier.db")).expect("store");
        let mut inventories = BTreeMap::new();
        inventories.insert(
            "Testland".to_string(),
            numbers.iter().map(|n| n.to_string()).collect(),
        );
        let pool = NumberPool::new(inventories, store, NumberPoolConfig { cooldown_secs });
        (dir, pool)
    }

    #[test]
    fn two_number_inventory_exhausts_on_third_user() {
        let (_dir, pool) = pool_with(&["21611111111", "21622222222"], 60);
        let lease_a = pool.lease("Testland", "user-a").expect("lease a");
        let lease_b = pool.lease("Testland", "user-b").expect("lease b");
        assert_ne!(lease_a.number, lease_b.number);
        assert!(matches!(
            pool.lease("Testland", "user-c"),
            Err(PoolError::NoAvailableNumber(_))
        ));
        // Releasing one lease frees capacity again.
        pool.release("user-a").expect("release");
        let lease_c = pool.lease("Testland", "user-c").expect("lease c");
        assert_eq!(lease_c.number, lease_a.number);
    }

    #[test]
    fn unknown_country_is_rejected() {
        let (_dir, pool) = pool_with(&["21611111111"], 60);
        assert!(matches!(
            pool.lease("Atlantis", "user-a"),
            Err(PoolError::UnknownCountry(_))
        ));
    }

    #[test]
    fn delivered_otp_puts_number_on_cooldown() {
        let (_dir, pool) = pool_with(&["21611111111"], 3_600);
        let lease = pool.lease("Testland", "user-a").expect("lease");
        pool.record_delivery(&lease, "752637", "WhatsApp").expect("record");
        pool.release("user-a").expect("release");
        // The only number is cooling down, so nobody can lease it.
        assert!(matches!(
            pool.lease("Testland", "user-b"),
            Err(PoolError::NoAvailableNumber(_))
        ));
    }

    #[test]
    fn expired_cooldown_frees_the_number() {
        let (_dir, pool) = pool_with(&["21611111111"], 0);
        let lease = pool.lease("Testland", "user-a").expect("lease");
        pool.record_delivery(&lease, "752637", "WhatsApp").expect("record");
        pool.release("user-a").expect("release");
        pool.lease("Testland", "user-b").expect("lease after cooldown");
    }

    #[test]
    fn lease_lookup_matches_normalized_numbers() {
        let (_dir, pool) = pool_with(&["21612345678"], 60);
        pool.lease("Testland", "user-a").expect("lease");
        let hit = pool
            .find_active_lease("+21612345678")
            .expect("lookup")
            .expect("lease");
        assert_eq!(hit.user_id, "user-a");
        assert!(pool.find_active_lease("99900001111").expect("lookup").is_none());
    }

    #[test]
    fn lease_state_survives_restart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("courier.db");
        let mut inventories = BTreeMap::new();
        inventories.insert("Testland".to_string(), vec!["21611111111".to_string()]);
        {
            let store = LeaseStore::new(&path).expect("store");
            let pool = NumberPool::new(
                inventories.clone(),
                store,
                NumberPoolConfig::default(),
            );
            pool.lease("Testland", "user-a").expect("lease");
        }
        let store = LeaseStore::new(&path).expect("store");
        let pool = NumberPool::new(inventories, store, NumberPoolConfig::default());
        // The number is still held after the process restart.
        assert!(matches!(
            pool.lease("Testland", "user-b"),
            Err(PoolError::NoAvailableNumber(_))
        ));
        let lease = pool
            .find_active_lease("21611111111")
            .expect("lookup")
            .expect("lease");
        assert_eq!(lease.user_id, "user-a");
    }
}
