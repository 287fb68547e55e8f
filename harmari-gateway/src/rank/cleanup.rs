//! Periodic request-store garbage collection.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{MissedTickBehavior, interval};
use tracing::warn;

use harmari_db::RankRequestRepository;

use crate::state::AppState;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Run one cleanup pass immediately (startup reconciliation of rows left
/// behind by a crash), then keep sweeping every minute.
pub fn spawn_cleanup_task(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = interval(CLEANUP_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = RankRequestRepository::cleanup_old_requests(state.db.pool()).await {
                warn!("Request cleanup pass failed: {}", e);
            }
        }
    });
}
