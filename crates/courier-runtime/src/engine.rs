//! The scan/extract/route poll loop.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Local;

use courier_core::{DedupLedger, MessageFingerprint};
use courier_extract::extract;
use courier_router::{NotificationRouter, RoutingOutcome};
use courier_upstream::{scan, UpstreamError, UpstreamSession};

use crate::supervisor::{CycleOutcome, RecoverySupervisor, SupervisorAction};

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cadence while recent cycles delivered OTPs.
    pub fast_poll_interval: Duration,
    /// Cadence while nothing is moving.
    pub idle_poll_interval: Duration,
    /// Bound on the dedup ledger before the oldest half is evicted.
    pub ledger_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fast_poll_interval: Duration::from_secs(5),
            idle_poll_interval: Duration::from_secs(30),
            ledger_capacity: courier_core::dedup_ledger::DEFAULT_LEDGER_CAPACITY,
        }
    }
}

/// What one poll cycle saw and did.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub outcome: CycleOutcome,
    /// Records returned by the scan.
    pub scanned: usize,
    /// Records not seen before this cycle. Drives the poll cadence:
    /// broadcast-only traffic counts as activity even when no lease
    /// matched.
    pub fresh: usize,
    /// Records delivered to a lease holder.
    pub routed: usize,
}

/// Owns the session, router, dedup ledger, and supervisor for one
/// upstream provider and drives them in a single sequential loop.
pub struct CourierEngine {
    session: UpstreamSession,
    router: NotificationRouter,
    supervisor: RecoverySupervisor,
    ledger: DedupLedger,
    config: EngineConfig,
    cycles: u64,
    delivered_total: u64,
}

impl CourierEngine {
    pub fn new(
        session: UpstreamSession,
        router: NotificationRouter,
        supervisor: RecoverySupervisor,
        config: EngineConfig,
    ) -> Self {
        let ledger = DedupLedger::new(config.ledger_capacity);
        Self {
            session,
            router,
            supervisor,
            ledger,
            config,
            cycles: 0,
            delivered_total: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn delivered_total(&self) -> u64 {
        self.delivered_total
    }

    /// Runs the poll loop until a fatal upstream failure.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            let report = self.run_cycle().await;
            match self.supervisor.observe(report.outcome) {
                SupervisorAction::Continue => {
                    tokio::time::sleep(self.poll_interval(&report)).await;
                }
                SupervisorAction::Restart => self.restart_session().await?,
                SupervisorAction::Halt => {
                    bail!("upstream rejected the configured credentials")
                }
            }
        }
    }

    /// One scan cycle: fetch fresh records, drop duplicates, extract
    /// OTPs, route what remains.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycles += 1;
        let now = Local::now().naive_local();
        let raw_messages = match scan(&mut self.session, now).await {
            Ok(messages) => messages,
            Err(error) => {
                let outcome = classify_scan_error(&error);
                tracing::warn!(%error, ?outcome, "scan cycle failed");
                return CycleReport {
                    outcome,
                    scanned: 0,
                    fresh: 0,
                    routed: 0,
                };
            }
        };

        let scanned = raw_messages.len();
        let mut routed = 0;
        let mut duplicates = 0;
        let mut skipped = 0;
        for raw in raw_messages {
            let fingerprint =
                MessageFingerprint::of_record(&raw.timestamp, &raw.source_number, &raw.body);
            if !self.ledger.record(fingerprint) {
                duplicates += 1;
                continue;
            }
            let Some(record) = extract(&raw) else {
                tracing::debug!(number = %raw.source_number, "no OTP in message, skipping");
                skipped += 1;
                continue;
            };
            match self.router.route(&record).await {
                Ok(RoutingOutcome::Delivered { .. }) => routed += 1,
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(number = %record.number, %error, "routing failed");
                }
            }
        }

        self.delivered_total += routed as u64;
        if scanned > 0 {
            tracing::info!(
                cycle = self.cycles,
                scanned,
                routed,
                duplicates,
                skipped,
                ledger = self.ledger.len(),
                "scan cycle complete"
            );
        }
        CycleReport {
            outcome: CycleOutcome::Progress,
            scanned,
            fresh: scanned - duplicates,
            routed,
        }
    }

    /// Tightens the cadence after any cycle that saw fresh traffic, not
    /// just cycles that reached a lease holder.
    fn poll_interval(&self, report: &CycleReport) -> Duration {
        if report.fresh > 0 {
            self.config.fast_poll_interval
        } else {
            self.config.idle_poll_interval
        }
    }

    /// Tears the session down and logs in fresh. A failed re-login backs
    /// off and returns to polling; bad credentials end the run.
    async fn restart_session(&mut self) -> Result<()> {
        self.session
            .teardown()
            .context("failed to rebuild upstream client")?;
        match self.session.login().await {
            Ok(()) => {
                self.supervisor.on_restart_succeeded();
                Ok(())
            }
            Err(error) if error.is_fatal() => {
                bail!("upstream rejected the configured credentials during restart")
            }
            Err(error) => {
                tracing::warn!(%error, "session restart failed, backing off");
                self.supervisor.on_restart_failed();
                tokio::time::sleep(self.supervisor.restart_backoff()).await;
                Ok(())
            }
        }
    }
}

fn classify_scan_error(error: &UpstreamError) -> CycleOutcome {
    if error.is_fatal() {
        CycleOutcome::Fatal
    } else if error.is_timeout() {
        CycleOutcome::Timeout
    } else {
        CycleOutcome::HardError
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use httpmock::prelude::*;

    use courier_pool::{LeaseStore, NumberPool, NumberPoolConfig};
    use courier_router::{TelegramNotifier, TelegramNotifierConfig};
    use courier_upstream::UpstreamConfig;

    const LOGIN_PAGE: &str = r#"
        <html><head><title>SMS Panel Login</title></head><body>
        <form method="post">
            <label for="capt">What is 2 + 3 = ?</label>
            <input type="number" name="capt" value="">
        </form></body></html>"#;

    fn engine(upstream: &MockServer, telegram: &MockServer, dir: &tempfile::TempDir) -> CourierEngine {
        let session = UpstreamSession::new(UpstreamConfig {
            base_url: upstream.base_url(),
            username: "operator".to_string(),
            password: "secret".to_string(),
            ..UpstreamConfig::default()
        })
        .expect("session");

        let store = LeaseStore::new(dir.path().join("courier.db")).expect("store");
        let mut inventories = BTreeMap::new();
        inventories.insert("Tunisia".to_string(), vec!["21612345678".to_string()]);
        let pool = NumberPool::new(inventories, store, NumberPoolConfig::default());
        pool.lease("Tunisia", "42").expect("lease");

        let notifier = TelegramNotifier::new(TelegramNotifierConfig {
            api_base: telegram.base_url(),
            bot_token: "test-token".to_string(),
            broadcast_chat_id: None,
            http_timeout: Duration::from_secs(2),
        })
        .expect("notifier");

        CourierEngine::new(
            session,
            NotificationRouter::new(pool, notifier),
            RecoverySupervisor::default(),
            EngineConfig::default(),
        )
    }

    fn mock_login(server: &MockServer) {
        server.mock(|when, then| {
            when.method(GET).path("/ints/login");
            then.status(200).body(LOGIN_PAGE);
        });
        server.mock(|when, then| {
            when.method(POST).path("/ints/login").body_includes("capt=5");
            then.status(200).body("<html>Dashboard - Logout</html>");
        });
    }

    #[tokio::test]
    async fn cycle_routes_fresh_records_and_dedups_replays() {
        let upstream = MockServer::start_async().await;
        let telegram = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");

        mock_login(&upstream);
        let now = Local::now().naive_local().format("%Y-%m-%d %H:%M:%S");
        let payload = serde_json::json!({
            "aaData": [[
                now.to_string(), "rng", "21612345678", "WhatsApp", "Your code is 752-637"
            ]]
        });
        upstream.mock(|when, then| {
            when.method(GET).path("/ints/client/SMSCDRStats");
            then.status(200).json_body(payload);
        });
        let sent = telegram.mock(|when, then| {
            when.method(POST)
                .path("/bottest-token/sendMessage")
                .body_includes("752637");
            then.status(200).json_body(serde_json::json!({"ok": true}));
        });

        let mut engine = engine(&upstream, &telegram, &dir);
        let first = engine.run_cycle().await;
        assert_eq!(first.outcome, CycleOutcome::Progress);
        assert_eq!(first.scanned, 1);
        assert_eq!(first.routed, 1);

        // Same table row on the next cycle is a replay: scanned but not
        // routed again, and no second Telegram call.
        let second = engine.run_cycle().await;
        assert_eq!(second.outcome, CycleOutcome::Progress);
        assert_eq!(second.scanned, 1);
        assert_eq!(second.fresh, 0);
        assert_eq!(second.routed, 0);
        sent.assert_calls(1);
        assert_eq!(engine.delivered_total(), 1);
    }

    #[tokio::test]
    async fn unmatched_traffic_still_tightens_the_cadence() {
        let upstream = MockServer::start_async().await;
        let telegram = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");

        mock_login(&upstream);
        let now = Local::now().naive_local().format("%Y-%m-%d %H:%M:%S");
        // Number not held by any lease: the record routes as
        // broadcast-only, yet the panel is clearly busy.
        let payload = serde_json::json!({
            "aaData": [[
                now.to_string(), "rng", "99900001111", "WhatsApp", "Your code is 664-910"
            ]]
        });
        upstream.mock(|when, then| {
            when.method(GET).path("/ints/client/SMSCDRStats");
            then.status(200).json_body(payload);
        });

        let mut engine = engine(&upstream, &telegram, &dir);
        let first = engine.run_cycle().await;
        assert_eq!(first.routed, 0);
        assert_eq!(first.fresh, 1);
        assert_eq!(
            engine.poll_interval(&first),
            engine.config.fast_poll_interval
        );

        // The replayed row is all duplicates, so the loop relaxes.
        let second = engine.run_cycle().await;
        assert_eq!(second.fresh, 0);
        assert_eq!(
            engine.poll_interval(&second),
            engine.config.idle_poll_interval
        );
    }

    #[tokio::test]
    async fn bad_credentials_classify_as_fatal() {
        let upstream = MockServer::start_async().await;
        let telegram = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");

        upstream.mock(|when, then| {
            when.method(GET).path("/ints/login");
            then.status(200).body(LOGIN_PAGE);
        });
        upstream.mock(|when, then| {
            when.method(POST).path("/ints/login");
            then.status(200).body("Username/Password Invalid");
        });

        let mut engine = engine(&upstream, &telegram, &dir);
        let report = engine.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Fatal);
    }

    #[tokio::test]
    async fn non_otp_rows_are_skipped_without_routing() {
        let upstream = MockServer::start_async().await;
        let telegram = MockServer::start_async().await;
        let dir = tempfile::tempdir().expect("tempdir");

        mock_login(&upstream);
        let now = Local::now().naive_local().format("%Y-%m-%d %H:%M:%S");
        let payload = serde_json::json!({
            "aaData": [[
                now.to_string(), "rng", "21612345678", "Promo",
                "Welcome to the service, reply STOP to opt out"
            ]]
        });
        upstream.mock(|when, then| {
            when.method(GET).path("/ints/client/SMSCDRStats");
            then.status(200).json_body(payload);
        });

        let mut engine = engine(&upstream, &telegram, &dir);
        let report = engine.run_cycle().await;
        assert_eq!(report.outcome, CycleOutcome::Progress);
        assert_eq!(report.scanned, 1);
        assert_eq!(report.routed, 0);
    }
}
