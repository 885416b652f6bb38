//! Lease matching and notification fan-out.

use courier_extract::OtpRecord;
use courier_pool::NumberPool;

use crate::format;
use crate::telegram::TelegramNotifier;
use crate::RouterError;

/// What happened to one extracted OTP record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// A lease holder got a direct notification.
    Delivered { user_id: String },
    /// No lease matched; only the broadcast channel saw the record.
    BroadcastOnly,
    /// No lease matched and no broadcast channel is configured.
    NoMatch,
}

/// Routes OTP records to lease holders and the broadcast channel.
///
/// Storage faults propagate; notification faults do not. A user who
/// blocked the bot or a flaky Telegram edge must not prevent the
/// cooldown bookkeeping or the rest of the batch.
#[derive(Debug, Clone)]
pub struct NotificationRouter {
    pool: NumberPool,
    notifier: TelegramNotifier,
}

impl NotificationRouter {
    pub fn new(pool: NumberPool, notifier: TelegramNotifier) -> Self {
        Self { pool, notifier }
    }

    pub fn pool(&self) -> &NumberPool {
        &self.pool
    }

    pub async fn route(&self, record: &OtpRecord) -> Result<RoutingOutcome, RouterError> {
        let lease = self.pool.find_active_lease(&record.number)?;

        let outcome = match lease {
            Some(lease) => {
                self.pool
                    .record_delivery(&lease, &record.otp_code, &record.service)?;
                let markdown = format::direct_notification(record);
                let plain = format::plain_notification(record);
                if let Err(error) = self
                    .notifier
                    .send_with_fallback(&lease.user_id, &markdown, &plain)
                    .await
                {
                    tracing::warn!(
                        user_id = %lease.user_id,
                        number = %record.number,
                        %error,
                        "direct OTP notification failed"
                    );
                }
                tracing::info!(
                    user_id = %lease.user_id,
                    service = %record.service,
                    number = %record.number,
                    "routed OTP to lease holder"
                );
                RoutingOutcome::Delivered {
                    user_id: lease.user_id,
                }
            }
            None => {
                tracing::debug!(number = %record.number, "no active lease for OTP record");
                if self.notifier.broadcast_chat_id().is_some() {
                    RoutingOutcome::BroadcastOnly
                } else {
                    RoutingOutcome::NoMatch
                }
            }
        };

        if let Some(chat_id) = self.notifier.broadcast_chat_id() {
            let markdown = format::broadcast_notification(record);
            let plain = format::plain_notification(record);
            if let Err(error) = self
                .notifier
                .send_with_fallback(chat_id, &markdown, &plain)
                .await
            {
                tracing::warn!(chat_id, %error, "broadcast notification failed");
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use httpmock::prelude::*;

    use courier_pool::{LeaseStore, NumberPoolConfig, PoolError};

    use crate::telegram::TelegramNotifierConfig;

    fn pool(dir: &tempfile::TempDir) -> NumberPool {
        let store = LeaseStore::new(dir.path().join("courier.db")).expect("store");
        let mut inventories = BTreeMap::new();
        inventories.insert("Tunisia".to_string(), vec!["21612345678".to_string()]);
        NumberPool::new(inventories, store, NumberPoolConfig::default())
    }

    fn notifier(server: &MockServer, broadcast: Option<&str>) -> TelegramNotifier {
        TelegramNotifier::new(TelegramNotifierConfig {
            api_base: server.base_url(),
            bot_token: "test-token".to_string(),
            broadcast_chat_id: broadcast.map(str::to_string),
            http_timeout: Duration::from_secs(2),
        })
        .expect("notifier")
    }

    fn record(number: &str) -> OtpRecord {
        OtpRecord {
            otp_code: "752637".to_string(),
            service: "WhatsApp".to_string(),
            number: number.to_string(),
            message_body: "Your code is 752-637".to_string(),
            timestamp: "2025-03-01 10:15:00".to_string(),
            country_name: "Tunisia".to_string(),
            country_flag: "\u{1F1F9}\u{1F1F3}".to_string(),
        }
    }

    #[tokio::test]
    async fn matched_record_notifies_holder_and_broadcast() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = pool(&dir);
        pool.lease("Tunisia", "42").expect("lease");

        let server = MockServer::start_async().await;
        let direct = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bottest-token/sendMessage")
                    .body_includes("\"chat_id\":\"42\"");
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;
        let broadcast = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bottest-token/sendMessage")
                    .body_includes("\"chat_id\":\"-1001\"");
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;

        let router = NotificationRouter::new(pool, notifier(&server, Some("-1001")));
        // "+" prefix on the wire still matches the leased digits.
        let outcome = router.route(&record("+21612345678")).await.expect("route");
        assert_eq!(
            outcome,
            RoutingOutcome::Delivered {
                user_id: "42".to_string()
            }
        );
        direct.assert_calls(1);
        broadcast.assert_calls(1);
    }

    #[tokio::test]
    async fn unmatched_record_is_broadcast_only() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start_async().await;
        let broadcast = server
            .mock_async(|when, then| {
                when.method(POST).path("/bottest-token/sendMessage");
                then.status(200).json_body(serde_json::json!({"ok": true}));
            })
            .await;

        let router = NotificationRouter::new(pool(&dir), notifier(&server, Some("-1001")));
        let outcome = router.route(&record("99900001111")).await.expect("route");
        assert_eq!(outcome, RoutingOutcome::BroadcastOnly);
        broadcast.assert_calls(1);
    }

    #[tokio::test]
    async fn delivery_failure_still_records_the_cooldown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pool = pool(&dir);
        pool.lease("Tunisia", "42").expect("lease");

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bottest-token/sendMessage");
                then.status(403).json_body(
                    serde_json::json!({"ok": false, "description": "bot was blocked"}),
                );
            })
            .await;

        let router = NotificationRouter::new(pool.clone(), notifier(&server, None));
        let outcome = router.route(&record("21612345678")).await.expect("route");
        assert_eq!(
            outcome,
            RoutingOutcome::Delivered {
                user_id: "42".to_string()
            }
        );
        // The number went on cooldown even though delivery failed, so a
        // release does not put it straight back into rotation.
        pool.release("42").expect("release");
        assert!(matches!(
            pool.lease("Tunisia", "43"),
            Err(PoolError::NoAvailableNumber(_))
        ));
    }

    #[tokio::test]
    async fn no_broadcast_channel_yields_no_match() {
        let dir = tempfile::tempdir().expect("tempdir");
        let server = MockServer::start_async().await;
        let router = NotificationRouter::new(pool(&dir), notifier(&server, None));
        let outcome = router.route(&record("99900001111")).await.expect("route");
        assert_eq!(outcome, RoutingOutcome::NoMatch);
    }
}
