//! SQLite-backed lease, cooldown, and OTP history store.
//!
//! Leases are superseded, never deleted: releasing marks the row
//! inactive so history survives and active state can be rebuilt after a
//! restart. Assignment is a conditional write guarded by partial unique
//! indexes, which is what makes concurrent lease requests safe.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, TransactionBehavior};

use crate::PoolResult;

/// One binding of a phone number to a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub user_id: String,
    pub number: String,
    pub country: String,
    pub assigned_at_unix: u64,
    pub waiting_for_otp: bool,
}

/// Durable store for leases, cooldown entries, and per-user OTP history.
#[derive(Debug, Clone)]
pub struct LeaseStore {
    db_path: PathBuf,
}

impl LeaseStore {
    /// Opens (or creates) the store at `path`, creating schema if needed.
    pub fn new(path: impl AsRef<Path>) -> PoolResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let store = Self { db_path };
        let connection = store.open_connection()?;
        store.initialize_schema(&connection)?;
        Ok(store)
    }

    fn open_connection(&self) -> PoolResult<Connection> {
        let connection = Connection::open(&self.db_path)?;
        connection.busy_timeout(Duration::from_secs(5))?;
        connection.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            "#,
        )?;
        Ok(connection)
    }

    fn initialize_schema(&self, connection: &Connection) -> PoolResult<()> {
        connection.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS leases (
                lease_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                number TEXT NOT NULL,
                country TEXT NOT NULL,
                assigned_at_unix INTEGER NOT NULL,
                waiting_for_otp INTEGER NOT NULL,
                active INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_leases_active_number
                ON leases (number) WHERE active = 1;
            CREATE UNIQUE INDEX IF NOT EXISTS idx_leases_active_user
                ON leases (user_id) WHERE active = 1;

            CREATE TABLE IF NOT EXISTS cooldowns (
                number TEXT PRIMARY KEY,
                cooldown_until_unix INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS otp_history (
                history_id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                number TEXT NOT NULL,
                otp_code TEXT NOT NULL,
                service TEXT NOT NULL,
                received_at_unix INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_otp_history_user
                ON otp_history (user_id, received_at_unix);
            "#,
        )?;
        Ok(())
    }

    /// Atomically assigns `number` to `user_id`, superseding the user's
    /// previous lease in the same transaction.
    ///
    /// Returns `Ok(false)` when the number was claimed by a concurrent
    /// request between the availability check and the insert; the caller
    /// moves on to its next candidate.
    pub fn try_assign(
        &self,
        user_id: &str,
        number: &str,
        country: &str,
        now_unix: u64,
    ) -> PoolResult<bool> {
        let mut connection = self.open_connection()?;
        let tx = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "UPDATE leases SET active = 0, waiting_for_otp = 0 WHERE user_id = ?1 AND active = 1",
            params![user_id],
        )?;
        let inserted = tx.execute(
            "INSERT INTO leases (user_id, number, country, assigned_at_unix, waiting_for_otp, active)
             VALUES (?1, ?2, ?3, ?4, 1, 1)",
            params![user_id, number, country, now_unix],
        );
        match inserted {
            Ok(_) => {
                tx.commit()?;
                Ok(true)
            }
            Err(rusqlite::Error::SqliteFailure(error, _))
                if error.code == ErrorCode::ConstraintViolation =>
            {
                // Lost the race for this number; the rollback also
                // restores the superseded lease.
                Ok(false)
            }
            Err(error) => Err(error.into()),
        }
    }

    /// Marks the user's active lease inactive and returns it.
    pub fn release_active_lease(&self, user_id: &str) -> PoolResult<Option<Lease>> {
        let connection = self.open_connection()?;
        let lease = self.query_active_lease_for_user(&connection, user_id)?;
        if lease.is_some() {
            connection.execute(
                "UPDATE leases SET active = 0, waiting_for_otp = 0 WHERE user_id = ?1 AND active = 1",
                params![user_id],
            )?;
        }
        Ok(lease)
    }

    pub fn active_lease_for_user(&self, user_id: &str) -> PoolResult<Option<Lease>> {
        let connection = self.open_connection()?;
        self.query_active_lease_for_user(&connection, user_id)
    }

    fn query_active_lease_for_user(
        &self,
        connection: &Connection,
        user_id: &str,
    ) -> PoolResult<Option<Lease>> {
        let lease = connection
            .query_row(
                "SELECT user_id, number, country, assigned_at_unix, waiting_for_otp
                 FROM leases WHERE user_id = ?1 AND active = 1",
                params![user_id],
                row_to_lease,
            )
            .optional()?;
        Ok(lease)
    }

    /// All active leases, for router matching and restart rebuilds.
    pub fn active_leases(&self) -> PoolResult<Vec<Lease>> {
        let connection = self.open_connection()?;
        let mut statement = connection.prepare(
            "SELECT user_id, number, country, assigned_at_unix, waiting_for_otp
             FROM leases WHERE active = 1 ORDER BY assigned_at_unix",
        )?;
        let leases = statement
            .query_map([], row_to_lease)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(leases)
    }

    pub fn active_numbers(&self) -> PoolResult<HashSet<String>> {
        let connection = self.open_connection()?;
        let mut statement =
            connection.prepare("SELECT number FROM leases WHERE active = 1")?;
        let numbers = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(numbers)
    }

    /// Upserts a cooldown entry, overriding any prior entry for the
    /// number.
    pub fn upsert_cooldown(&self, number: &str, cooldown_until_unix: u64) -> PoolResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "INSERT INTO cooldowns (number, cooldown_until_unix) VALUES (?1, ?2)
             ON CONFLICT(number) DO UPDATE SET cooldown_until_unix = excluded.cooldown_until_unix",
            params![number, cooldown_until_unix],
        )?;
        Ok(())
    }

    /// Numbers whose cooldown has not yet expired.
    pub fn unexpired_cooldowns(&self, now_unix: u64) -> PoolResult<HashSet<String>> {
        let connection = self.open_connection()?;
        let mut statement = connection
            .prepare("SELECT number FROM cooldowns WHERE cooldown_until_unix > ?1")?;
        let numbers = statement
            .query_map(params![now_unix], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(numbers)
    }

    /// Deletes expired cooldown entries; returns how many were removed.
    pub fn purge_expired_cooldowns(&self, now_unix: u64) -> PoolResult<usize> {
        let connection = self.open_connection()?;
        let removed = connection.execute(
            "DELETE FROM cooldowns WHERE cooldown_until_unix <= ?1",
            params![now_unix],
        )?;
        Ok(removed)
    }

    pub fn insert_otp_history(
        &self,
        user_id: &str,
        number: &str,
        otp_code: &str,
        service: &str,
        received_at_unix: u64,
    ) -> PoolResult<()> {
        let connection = self.open_connection()?;
        connection.execute(
            "INSERT INTO otp_history (user_id, number, otp_code, service, received_at_unix)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, number, otp_code, service, received_at_unix],
        )?;
        Ok(())
    }

    pub fn otp_history_count(&self, user_id: &str) -> PoolResult<u64> {
        let connection = self.open_connection()?;
        let count: u64 = connection.query_row(
            "SELECT COUNT(*) FROM otp_history WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_lease(row: &rusqlite::Row<'_>) -> rusqlite::Result<Lease> {
    Ok(Lease {
        user_id: row.get(0)?,
        number: row.get(1)?,
        country: row.get(2)?,
        assigned_at_unix: row.get(3)?,
        waiting_for_otp: row.get::<_, i64>(4)? != 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, LeaseStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LeaseStore::new(dir.path().join("courier.db")).expect("store");
        (dir, store)
    }

    #[test]
    fn assign_release_round_trip() {
        let (_dir, store) = store();
        assert!(store.try_assign("user-1", "21611111111", "Testland", 100).expect("assign"));
        let lease = store
            .active_lease_for_user("user-1")
            .expect("query")
            .expect("lease");
        assert_eq!(lease.number, "21611111111");
        assert!(lease.waiting_for_otp);

        let released = store.release_active_lease("user-1").expect("release");
        assert_eq!(released.map(|l| l.number), Some("21611111111".to_string()));
        assert!(store.active_lease_for_user("user-1").expect("query").is_none());
    }

    #[test]
    fn conditional_insert_rejects_double_assignment() {
        let (_dir, store) = store();
        assert!(store.try_assign("user-1", "21611111111", "Testland", 100).expect("assign"));
        assert!(!store.try_assign("user-2", "21611111111", "Testland", 101).expect("assign"));
        assert!(store.active_lease_for_user("user-2").expect("query").is_none());
    }

    #[test]
    fn new_lease_supersedes_previous_for_same_user() {
        let (_dir, store) = store();
        assert!(store.try_assign("user-1", "21611111111", "Testland", 100).expect("assign"));
        assert!(store.try_assign("user-1", "21622222222", "Testland", 200).expect("assign"));
        let lease = store
            .active_lease_for_user("user-1")
            .expect("query")
            .expect("lease");
        assert_eq!(lease.number, "21622222222");
        // The old number is free for someone else now.
        assert!(store.try_assign("user-2", "21611111111", "Testland", 300).expect("assign"));
    }

    #[test]
    fn failed_assignment_keeps_previous_lease() {
        let (_dir, store) = store();
        assert!(store.try_assign("user-1", "21611111111", "Testland", 100).expect("assign"));
        assert!(store.try_assign("user-2", "21622222222", "Testland", 100).expect("assign"));
        // user-2 tries to grab user-1's number; the rollback must leave
        // user-2 holding their original lease.
        assert!(!store.try_assign("user-2", "21611111111", "Testland", 200).expect("assign"));
        let lease = store
            .active_lease_for_user("user-2")
            .expect("query")
            .expect("lease");
        assert_eq!(lease.number, "21622222222");
    }

    #[test]
    fn cooldowns_upsert_and_expire() {
        let (_dir, store) = store();
        store.upsert_cooldown("21611111111", 500).expect("upsert");
        store.upsert_cooldown("21611111111", 900).expect("upsert");
        assert!(store.unexpired_cooldowns(800).expect("query").contains("21611111111"));
        assert!(store.unexpired_cooldowns(900).expect("query").is_empty());
        assert_eq!(store.purge_expired_cooldowns(900).expect("purge"), 1);
    }

    #[test]
    fn leases_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("courier.db");
        {
            let store = LeaseStore::new(&path).expect("store");
            assert!(store.try_assign("user-1", "21611111111", "Testland", 100).expect("assign"));
        }
        let reopened = LeaseStore::new(&path).expect("store");
        let leases = reopened.active_leases().expect("leases");
        assert_eq!(leases.len(), 1);
        assert_eq!(leases[0].user_id, "user-1");
    }

    #[test]
    fn otp_history_counts_per_user() {
        let (_dir, store) = store();
        store
            .insert_otp_history("user-1", "21611111111", "752637", "WhatsApp", 100)
            .expect("insert");
        store
            .insert_otp_history("user-1", "21611111111", "4821", "Telegram", 200)
            .expect("insert");
        assert_eq!(store.otp_history_count("user-1").expect("count"), 2);
        assert_eq!(store.otp_history_count("user-2").expect("count"), 0);
    }
}
