// Periodic calendar sync.
//
// Each tick runs one `sync_window` pass for today's date, retried with the
// configured backoff. A pass that still fails is logged and picked up again
// on the next tick; nothing here ever stops the loop except shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use leaguekeeper_core::calendar::{CalendarDate, CalendarError};
use leaguekeeper_core::sync::{RetryPolicy, SyncError, SyncLedger, SyncOutcome};
use tracing::{debug, error, info};

/// One retried sync pass.
pub async fn run_once(
    ledger: &SyncLedger,
    policy: &RetryPolicy,
    today: CalendarDate,
) -> Result<SyncOutcome, SyncError> {
    policy
        .run("calendar sync pass", move || ledger.sync_window(today))
        .await
}

fn today() -> Result<CalendarDate, CalendarError> {
    CalendarDate::try_from(chrono::Local::now().date_naive())
}

/// Sync every `interval` until `shutdown` resolves. Returns the number of
/// passes that ran.
pub async fn run<F>(
    ledger: Arc<SyncLedger>,
    policy: RetryPolicy,
    interval: Duration,
    shutdown: F,
) -> usize
where
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut passes = 0;
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Sync runner stopping after {} passes", passes);
                return passes;
            }
            _ = ticker.tick() => {
                passes += 1;
                let today = match today() {
                    Ok(today) => today,
                    Err(e) => {
                        error!("Sync pass {} skipped: {}", passes, e);
                        continue;
                    }
                };
                match run_once(&ledger, &policy, today).await {
                    Ok(SyncOutcome::Synced(n)) => info!("Sync pass {}: pushed {} fixtures", passes, n),
                    Ok(SyncOutcome::NothingToDo) => debug!("Sync pass {}: nothing to do", passes),
                    Err(e) => error!("Sync pass {} failed: {}", passes, e),
                }
            }
        }
    }
}
