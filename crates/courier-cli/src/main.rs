//! The `courier` binary: wires config into the polling engine.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use courier_pool::{LeaseStore, NumberPool, NumberPoolConfig};
use courier_router::{NotificationRouter, TelegramNotifier, TelegramNotifierConfig};
use courier_runtime::{
    CourierEngine, EngineConfig, RecoverySupervisor, SupervisorConfig,
};
use courier_upstream::{UpstreamConfig, UpstreamSession};

fn parse_positive_u64(value: &str) -> Result<u64, String> {
    let parsed = value
        .parse::<u64>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

fn parse_positive_u32(value: &str) -> Result<u32, String> {
    let parsed = value
        .parse::<u32>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

#[derive(Debug, Parser)]
#[command(
    name = "courier",
    about = "Scrapes an upstream SMS panel and routes OTPs to leased numbers",
    version
)]
struct Cli {
    #[arg(
        long,
        env = "COURIER_UPSTREAM_BASE_URL",
        help = "Upstream panel root, e.g. http://198.51.100.7"
    )]
    upstream_base_url: String,

    #[arg(
        long,
        env = "COURIER_UPSTREAM_LOGIN_PATH",
        default_value = "/ints/login",
        help = "Login form path on the upstream panel"
    )]
    upstream_login_path: String,

    #[arg(
        long,
        env = "COURIER_UPSTREAM_DATA_PATH",
        default_value = "/ints/client/SMSCDRStats",
        help = "SMS records path (HTML page and data endpoint)"
    )]
    upstream_data_path: String,

    #[arg(long, env = "COURIER_UPSTREAM_USERNAME")]
    upstream_username: String,

    #[arg(long, env = "COURIER_UPSTREAM_PASSWORD", hide_env_values = true)]
    upstream_password: String,

    #[arg(long, env = "COURIER_TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    telegram_bot_token: String,

    #[arg(
        long,
        env = "COURIER_BROADCAST_CHAT_ID",
        help = "Optional channel receiving the masked broadcast copy of every OTP"
    )]
    broadcast_chat_id: Option<String>,

    #[arg(
        long,
        env = "COURIER_INVENTORY_DIR",
        default_value = "inventories",
        help = "Directory of per-country CSV number inventories"
    )]
    inventory_dir: PathBuf,

    #[arg(
        long,
        env = "COURIER_STATE_DIR",
        default_value = ".courier",
        help = "Directory holding the lease database"
    )]
    state_dir: PathBuf,

    #[arg(
        long,
        env = "COURIER_COOLDOWN_SECS",
        default_value_t = 172_800,
        value_parser = parse_positive_u64,
        help = "Seconds a number rests after delivering an OTP"
    )]
    cooldown_secs: u64,

    #[arg(
        long,
        env = "COURIER_FAST_POLL_SECS",
        default_value_t = 5,
        value_parser = parse_positive_u64
    )]
    fast_poll_secs: u64,

    #[arg(
        long,
        env = "COURIER_IDLE_POLL_SECS",
        default_value_t = 30,
        value_parser = parse_positive_u64
    )]
    idle_poll_secs: u64,

    #[arg(
        long,
        env = "COURIER_HTTP_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = parse_positive_u64
    )]
    http_timeout_secs: u64,

    #[arg(
        long,
        env = "COURIER_SCAN_ROW_CAP",
        default_value_t = 20,
        help = "Maximum table rows consumed per scan cycle"
    )]
    scan_row_cap: usize,

    #[arg(
        long,
        env = "COURIER_FRESHNESS_WINDOW_SECS",
        default_value_t = 1_800,
        help = "Records older than this many seconds are dropped as stale"
    )]
    freshness_window_secs: i64,

    #[arg(
        long,
        env = "COURIER_LEDGER_CAPACITY",
        default_value_t = 1_000,
        help = "Dedup ledger bound; the oldest half is evicted past this"
    )]
    ledger_capacity: usize,

    #[arg(
        long,
        env = "COURIER_HARD_ERROR_THRESHOLD",
        default_value_t = 5,
        value_parser = parse_positive_u32
    )]
    hard_error_threshold: u32,

    #[arg(
        long,
        env = "COURIER_TIMEOUT_THRESHOLD",
        default_value_t = 20,
        value_parser = parse_positive_u32
    )]
    timeout_threshold: u32,

    #[arg(
        long,
        env = "COURIER_RESTART_BACKOFF_SECS",
        default_value_t = 60,
        value_parser = parse_positive_u64
    )]
    restart_backoff_secs: u64,
}

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let store = LeaseStore::new(cli.state_dir.join("courier.db"))
        .context("failed to open lease database")?;
    let pool = NumberPool::from_inventory_dir(
        &cli.inventory_dir,
        store,
        NumberPoolConfig {
            cooldown_secs: cli.cooldown_secs,
        },
    )
    .with_context(|| {
        format!(
            "failed to load number inventories from {}",
            cli.inventory_dir.display()
        )
    })?;
    let countries = pool.countries();
    if countries.is_empty() {
        tracing::warn!(
            dir = %cli.inventory_dir.display(),
            "no country inventories loaded, every lease request will fail"
        );
    } else {
        tracing::info!(countries = countries.len(), "number pool ready");
    }

    let notifier = TelegramNotifier::new(TelegramNotifierConfig {
        bot_token: cli.telegram_bot_token.clone(),
        broadcast_chat_id: cli.broadcast_chat_id.clone(),
        ..TelegramNotifierConfig::default()
    })
    .context("failed to build telegram client")?;
    let router = NotificationRouter::new(pool, notifier);

    let session = UpstreamSession::new(UpstreamConfig {
        base_url: cli.upstream_base_url.clone(),
        login_path: cli.upstream_login_path.clone(),
        data_path: cli.upstream_data_path.clone(),
        username: cli.upstream_username.clone(),
        password: cli.upstream_password.clone(),
        http_timeout: Duration::from_secs(cli.http_timeout_secs),
        scan_row_cap: cli.scan_row_cap,
        freshness_window_secs: cli.freshness_window_secs,
    })
    .context("failed to build upstream client")?;

    let supervisor = RecoverySupervisor::new(SupervisorConfig {
        hard_error_threshold: cli.hard_error_threshold,
        timeout_threshold: cli.timeout_threshold,
        restart_backoff: Duration::from_secs(cli.restart_backoff_secs),
    });

    let mut engine = CourierEngine::new(
        session,
        router,
        supervisor,
        EngineConfig {
            fast_poll_interval: Duration::from_secs(cli.fast_poll_secs),
            idle_poll_interval: Duration::from_secs(cli.idle_poll_secs),
            ledger_capacity: cli.ledger_capacity,
        },
    );

    tracing::info!(upstream = %cli.upstream_base_url, "courier engine starting");
    tokio::select! {
        result = engine.run() => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested");
            Ok(())
        }
    }
}
