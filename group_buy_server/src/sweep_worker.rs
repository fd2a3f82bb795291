use chrono::{Duration, Utc};
use group_buy_engine::{events::EventProducers, GroupFlowApi, SqliteDatabase};
use log::*;
use tokio::task::JoinHandle;

/// Starts the expiration sweep worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_sweep_worker(db: SqliteDatabase, producers: EventProducers, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = interval.to_std().unwrap_or_else(|_| std::time::Duration::from_secs(60));
        let mut timer = tokio::time::interval(period);
        let api = GroupFlowApi::new(db, producers);
        info!("🕰️ Expiration sweep worker started (every {}s)", period.as_secs());
        loop {
            timer.tick().await;
            debug!("🕰️ Running expiration sweep");
            match api.sweep(Utc::now()).await {
                Ok(report) => {
                    if report.processed_count() > 0 {
                        info!(
                            "🕰️ Sweep expired {} group(s) and issued {} refund(s)",
                            report.processed_count(),
                            report.refund_count()
                        );
                        debug!("🕰️ Expired groups: {}", group_list(&report.expired_groups));
                    }
                    if !report.is_clean() {
                        warn!(
                            "🕰️ Sweep could not process {} group(s): {}. They will be retried on the next pass.",
                            report.failures.len(),
                            group_list(&report.failures)
                        );
                    }
                },
                Err(e) => {
                    error!("🕰️ Error running expiration sweep: {e}");
                },
            }
        }
    })
}

fn group_list(ids: &[i64]) -> String {
    ids.iter().map(|id| format!("#{id}")).collect::<Vec<String>>().join(", ")
}
