// Leaguekeeper calendar sync service.
//
// Startup sequence:
// 1. Initialize tracing (log to file)
// 2. Load config
// 3. Open database
// 4. Build the calendar client from credentials
// 5. Run the sync loop until Ctrl+C

use std::sync::Arc;

use anyhow::Context;
use leaguekeeper_app::calendar_http::CalendarClient;
use leaguekeeper_app::runner;
use leaguekeeper_core::config;
use leaguekeeper_core::db::Database;
use leaguekeeper_core::sync::SyncLedger;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing
    init_tracing()?;
    info!("Leaguekeeper starting up");

    // 2. Load config
    let config = config::load_config().context("failed to load configuration")?;
    info!(
        "Config loaded: sync every {}s, {}-day window, {} attempts per pass",
        config.sync.interval_secs, config.sync.window_days, config.sync.max_attempts
    );

    // 3. Open database
    let db_path = config.db_path().context("failed to resolve database path")?;
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db_path = db_path.to_string_lossy().into_owned();
    let db = Arc::new(Database::open(&db_path).context("failed to open database")?);
    info!("Database opened at {}", db_path);

    // 4. Calendar client
    let Some(backend) = CalendarClient::from_config(&config).into_backend() else {
        info!("Calendar sync disabled (no [calendar] credentials); nothing to do");
        return Ok(());
    };
    info!("Calendar client initialized");
    let ledger = Arc::new(SyncLedger::new(db, backend, config.sync.window_days));

    // 5. Sync loop
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
    };
    let passes = runner::run(ledger, config.retry_policy(), config.sync_interval(), shutdown).await;

    info!("Leaguekeeper shut down cleanly after {} sync passes", passes);
    Ok(())
}

/// Initialize tracing to log to `logs/leaguekeeper.log`.
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("leaguekeeper.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("leaguekeeper=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
