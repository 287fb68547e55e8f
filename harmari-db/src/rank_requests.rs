//! Request store for in-flight ranking lookups.
//!
//! Each row represents one user waiting on one (server, character) query.
//! Rows double as the cross-restart coordination state: the partial unique
//! index on `user_key` enforces per-user dedup, and the `processing` status
//! acts as a lease so that at most one background poll runs per `search_key`
//! even across process restarts.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};

/// In-flight rows older than this are failed by cleanup (stuck requests).
const STALE_INFLIGHT_SECS: i64 = 60;
/// All rows older than this are deleted by cleanup regardless of status.
const RETENTION_SECS: i64 = 60 * 60;

/// Lifecycle status of a ranking lookup request.
///
/// Transitions are monotone: waiting -> processing -> {completed | failed}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Waiting,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Waiting => write!(f, "waiting"),
            RequestStatus::Processing => write!(f, "processing"),
            RequestStatus::Completed => write!(f, "completed"),
            RequestStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RequestStatus {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "waiting" => Ok(RequestStatus::Waiting),
            "processing" => Ok(RequestStatus::Processing),
            "completed" => Ok(RequestStatus::Completed),
            "failed" => Ok(RequestStatus::Failed),
            _ => Err(DbError::Serialization(format!("invalid status: {s}"))),
        }
    }
}

/// A persisted lookup request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankRequest {
    pub id: i64,
    pub search_key: String,
    pub user_key: String,
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub server_name: String,
    pub character_name: String,
    pub loading_message_id: Option<String>,
    pub status: RequestStatus,
    pub job_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields needed to create a request row.
#[derive(Debug, Clone)]
pub struct NewRankRequest<'a> {
    pub user_id: &'a str,
    pub channel_id: &'a str,
    pub guild_id: Option<&'a str>,
    pub server_name: &'a str,
    pub character_name: &'a str,
}

impl NewRankRequest<'_> {
    pub fn search_key(&self) -> String {
        format!("{}-{}", self.server_name, self.character_name)
    }

    pub fn user_key(&self) -> String {
        format!("{}-{}-{}", self.user_id, self.server_name, self.character_name)
    }
}

/// Counts reported by [`RankRequestRepository::cleanup_old_requests`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupStats {
    /// In-flight rows marked failed because they exceeded the stale window.
    pub failed: u64,
    /// Rows deleted because they exceeded the retention window.
    pub deleted: u64,
}

/// Repository for rank_requests table operations.
pub struct RankRequestRepository;

impl RankRequestRepository {
    /// Atomically create a request row, or return `None` when an in-flight
    /// row already exists for the same user key (the unique index decides,
    /// so two racing submissions cannot both win).
    pub async fn create_if_absent(
        pool: &SqlitePool,
        new: &NewRankRequest<'_>,
    ) -> DbResult<Option<RankRequest>> {
        let now = Utc::now().timestamp();
        let search_key = new.search_key();
        let user_key = new.user_key();

        let result = sqlx::query(
            "INSERT INTO rank_requests
                 (search_key, user_key, user_id, channel_id, guild_id,
                  server_name, character_name, status, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'waiting', ?, ?)",
        )
        .bind(&search_key)
        .bind(&user_key)
        .bind(new.user_id)
        .bind(new.channel_id)
        .bind(new.guild_id)
        .bind(new.server_name)
        .bind(new.character_name)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await;

        let result = match result {
            Ok(r) => r,
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!("Duplicate in-flight request for user key {}", user_key);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let id = result.last_insert_rowid();
        let request = Self::get_by_id(pool, id)
            .await?
            .ok_or(DbError::RequestNotFound(id))?;
        info!("Created rank request {} ({})", id, search_key);
        Ok(Some(request))
    }

    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> DbResult<Option<RankRequest>> {
        let row = sqlx::query_as::<_, RankRequestRow>(
            "SELECT * FROM rank_requests WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(RankRequest::try_from).transpose()
    }

    /// The user's in-flight request for a query, if any.
    pub async fn find_in_flight_by_user_key(
        pool: &SqlitePool,
        user_key: &str,
    ) -> DbResult<Option<RankRequest>> {
        let row = sqlx::query_as::<_, RankRequestRow>(
            "SELECT * FROM rank_requests
             WHERE user_key = ? AND status IN ('waiting', 'processing')",
        )
        .bind(user_key)
        .fetch_optional(pool)
        .await?;

        row.map(RankRequest::try_from).transpose()
    }

    /// All in-flight requests sharing a search key, oldest first. This is
    /// the waiter set a fan-out delivers to.
    pub async fn find_in_flight_by_search_key(
        pool: &SqlitePool,
        search_key: &str,
    ) -> DbResult<Vec<RankRequest>> {
        let rows = sqlx::query_as::<_, RankRequestRow>(
            "SELECT * FROM rank_requests
             WHERE search_key = ? AND status IN ('waiting', 'processing')
             ORDER BY created_at ASC",
        )
        .bind(search_key)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(RankRequest::try_from).collect()
    }

    /// All requests for a search key regardless of status. The failure path
    /// falls back to this when the in-flight set is already empty, so a
    /// legitimate failure notice is not silently dropped after a race.
    pub async fn find_all_by_search_key(
        pool: &SqlitePool,
        search_key: &str,
    ) -> DbResult<Vec<RankRequest>> {
        let rows = sqlx::query_as::<_, RankRequestRow>(
            "SELECT * FROM rank_requests
             WHERE search_key = ?
             ORDER BY created_at ASC",
        )
        .bind(search_key)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(RankRequest::try_from).collect()
    }

    /// Promote a waiting row to `processing`, but only while no sibling row
    /// for the same search key already holds the lease. Returns whether the
    /// promotion won; losers stay `waiting` and join the fan-out set.
    pub async fn promote_to_processing(
        pool: &SqlitePool,
        id: i64,
        search_key: &str,
    ) -> DbResult<bool> {
        let now = Utc::now().timestamp();
        let result = sqlx::query(
            "UPDATE rank_requests
             SET status = 'processing', updated_at = ?
             WHERE id = ? AND status = 'waiting'
               AND NOT EXISTS (
                   SELECT 1 FROM rank_requests
                   WHERE search_key = ? AND status = 'processing'
               )",
        )
        .bind(now)
        .bind(id)
        .bind(search_key)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Record the transient "searching" message so fan-out can delete it.
    pub async fn set_loading_message(
        pool: &SqlitePool,
        id: i64,
        message_id: &str,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE rank_requests SET loading_message_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(message_id)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Record the remote job id on every in-flight row of a search.
    pub async fn set_job_id(pool: &SqlitePool, search_key: &str, job_id: &str) -> DbResult<()> {
        sqlx::query(
            "UPDATE rank_requests
             SET job_id = ?, updated_at = ?
             WHERE search_key = ? AND status IN ('waiting', 'processing')",
        )
        .bind(job_id)
        .bind(Utc::now().timestamp())
        .bind(search_key)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Bulk-transition every in-flight row of a search to a terminal status.
    /// Returns the number of rows finalized.
    pub async fn finalize_search(
        pool: &SqlitePool,
        search_key: &str,
        status: RequestStatus,
    ) -> DbResult<u64> {
        debug_assert!(status.is_terminal());
        let result = sqlx::query(
            "UPDATE rank_requests
             SET status = ?, updated_at = ?
             WHERE search_key = ? AND status IN ('waiting', 'processing')",
        )
        .bind(status.to_string())
        .bind(Utc::now().timestamp())
        .bind(search_key)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Best-effort removal of a partially-created row (submission failed
    /// after the insert).
    pub async fn delete(pool: &SqlitePool, id: i64) -> DbResult<()> {
        sqlx::query("DELETE FROM rank_requests WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Garbage collection, run at startup and on a timer:
    /// - in-flight rows older than 60 s are marked failed (covers crashes
    ///   that orphaned a `processing` lease)
    /// - any row older than 1 hour is deleted
    pub async fn cleanup_old_requests(pool: &SqlitePool) -> DbResult<CleanupStats> {
        let now = Utc::now().timestamp();

        let failed = sqlx::query(
            "UPDATE rank_requests
             SET status = 'failed', updated_at = ?
             WHERE status IN ('waiting', 'processing') AND created_at < ?",
        )
        .bind(now)
        .bind(now - STALE_INFLIGHT_SECS)
        .execute(pool)
        .await?
        .rows_affected();

        let deleted = sqlx::query("DELETE FROM rank_requests WHERE created_at < ?")
            .bind(now - RETENTION_SECS)
            .execute(pool)
            .await?
            .rows_affected();

        if failed > 0 || deleted > 0 {
            info!(
                "Request cleanup: {} stale rows failed, {} old rows deleted",
                failed, deleted
            );
        }

        Ok(CleanupStats { failed, deleted })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RankRequestRow {
    id: i64,
    search_key: String,
    user_key: String,
    user_id: String,
    channel_id: String,
    guild_id: Option<String>,
    server_name: String,
    character_name: String,
    loading_message_id: Option<String>,
    status: String,
    job_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<RankRequestRow> for RankRequest {
    type Error = DbError;

    fn try_from(row: RankRequestRow) -> Result<Self, Self::Error> {
        let status: RequestStatus = row.status.parse()?;

        Ok(RankRequest {
            id: row.id,
            search_key: row.search_key,
            user_key: row.user_key,
            user_id: row.user_id,
            channel_id: row.channel_id,
            guild_id: row.guild_id,
            server_name: row.server_name,
            character_name: row.character_name,
            loading_message_id: row.loading_message_id,
            status,
            job_id: row.job_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
