//! Nightly trigger for the school sync.

use chrono::{DateTime, Duration as ChronoDuration, NaiveTime, Utc};

use crate::config::SyncSchedule;
use crate::sync::SchoolUpdater;

/// Next run at `hour:00` UTC strictly after `now`.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Run the sync forever on `schedule`. Failures are logged and the loop continues.
pub async fn run(updater: SchoolUpdater, schedule: SyncSchedule) {
    loop {
        let wait = match schedule {
            SyncSchedule::Every(interval) => interval,
            SyncSchedule::Daily { hour } => {
                let now = Utc::now();
                let next = next_run_after(now, hour);
                tracing::info!("Next school sync at {}", next.to_rfc3339());
                (next - now).to_std().unwrap_or_default()
            }
        };
        tokio::time::sleep(wait).await;

        if let Err(e) = updater.sync_all().await {
            tracing::error!("Error while processing the school documents: {}", e);
        }
    }
}
