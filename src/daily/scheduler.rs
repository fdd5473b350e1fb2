use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::clock::Clock;
use crate::daily::{curate, CuratorConfig};

/// Spawn the calendar-triggered curation loop: sleep until the next UTC
/// midnight, curate that date's lineup, repeat. A failed run is logged and
/// swallowed so it never blocks the next trigger; duplicate triggers across
/// instances are harmless because curation is check-before-generate.
pub fn spawn_daily_curation(
    pool: PgPool,
    clock: Arc<dyn Clock>,
    config: CuratorConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = clock.now();
            let wait = until_next_midnight(now);
            info!(wait_secs = wait.as_secs(), "Daily curation sleeping until next run");
            tokio::time::sleep(wait).await;

            let date = clock.today();
            match curate(&pool, clock.as_ref(), &config, date, false).await {
                Ok(pick) => {
                    info!(%date, picks = pick.puzzle_ids.0.len(), "Scheduled curation complete")
                }
                Err(e) => error!(%date, "Scheduled curation failed: {}", e),
            }
        }
    })
}

fn until_next_midnight(now: DateTime<Utc>) -> Duration {
    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc());

    match next {
        Some(next) => (next - now)
            .to_std()
            .unwrap_or(Duration::from_secs(60)),
        // Unreachable in practice (calendar overflow); retry in a day.
        None => ChronoDuration::days(1)
            .to_std()
            .unwrap_or(Duration::from_secs(86_400)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn sleeps_until_utc_midnight() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 23, 59, 0).unwrap();
        assert_eq!(until_next_midnight(now), Duration::from_secs(60));

        let noon = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        assert_eq!(until_next_midnight(noon), Duration::from_secs(12 * 3600));
    }
}
