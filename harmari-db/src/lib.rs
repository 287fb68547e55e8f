//! harmari-db: SQLite persistence for the ranking bot.
//!
//! This crate provides database operations for:
//! - The request store of in-flight ranking lookups (dedup, single-flight
//!   promotion, bulk finalization, garbage collection)
//! - Read-only access to the replicated ranking snapshot table (fast path)

pub mod db;
pub mod error;
pub mod rank_requests;
pub mod rankings;
mod sqlite_runtime;

// Re-export commonly used types
pub use db::DbPool;
pub use error::{DbError, DbResult};
pub use rank_requests::{NewRankRequest, RankRequest, RankRequestRepository, RequestStatus};
pub use rankings::{CachedRankRow, RankingRepository};

// Re-export test helpers when running tests or when test-helpers feature is enabled
#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
