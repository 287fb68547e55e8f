//! Shared application state.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::rank::client::RankApiClient;
use harmari_db::DbPool;

/// Shared application state
///
/// The request store in the database is the source of truth for coordination
/// (it survives restarts); the task registry here only tracks the poll tasks
/// this process actually spawned, so they can be observed and are not
/// double-spawned within one process.
pub struct AppState {
    /// Database pool (request store + ranking cache replica)
    pub db: DbPool,
    /// Remote ranking job API client
    pub rank_api: RankApiClient,
    /// Live background poll tasks keyed by search key
    poll_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl AppState {
    pub fn new(db: DbPool, rank_api: RankApiClient) -> Self {
        Self {
            db,
            rank_api,
            poll_tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Register a spawned poll task for a search key. A finished handle left
    /// behind by a completed poll is replaced.
    pub async fn register_poll_task(&self, search_key: &str, handle: JoinHandle<()>) {
        let mut tasks = self.poll_tasks.lock().await;
        if let Some(old) = tasks.insert(search_key.to_string(), handle)
            && !old.is_finished()
        {
            // The DB lease should make this unreachable; abort the orphan
            // rather than leaking two polls for one query.
            tracing::warn!("Replacing a live poll task for {}", search_key);
            old.abort();
        }
    }

    /// Drop the registry entry once a poll task has finished.
    pub async fn clear_poll_task(&self, search_key: &str) {
        self.poll_tasks.lock().await.remove(search_key);
    }

    /// Whether this process currently runs a poll for the search key.
    pub async fn has_poll_task(&self, search_key: &str) -> bool {
        self.poll_tasks
            .lock()
            .await
            .get(search_key)
            .is_some_and(|h| !h.is_finished())
    }
}
