//! Request coordinator: fast-path vs. slow-path decision, per-user dedup,
//! single-flight background polling, and hand-off to fan-out.
//!
//! Coordination state lives in the request store, not in memory: the
//! `processing` status is the lease that guarantees one background poll per
//! distinct query even across restarts, and the waiter rows are the fan-out
//! set. The in-process task registry only mirrors what this process spawned.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serenity::http::Http;
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::time::Instant;
use tracing::{info, warn};

use harmari_core::{GAME_SERVERS, RankingCard, is_known_server};
use harmari_db::{DbError, NewRankRequest, RankRequestRepository};

use super::cache;
use super::client::{JobStatus, RankApiError};
use super::notify;
use crate::state::AppState;

/// Hard ceiling on the total time spent polling one job.
const POLL_CEILING: Duration = Duration::from_secs(10 * 60);

/// Upstream error text that really means "no such character".
const UPSTREAM_UNKNOWN_ERROR: &str = "Unknown search error";

pub const MSG_NOT_FOUND: &str = "해당 서버에서 캐릭터를 찾을 수 없습니다.";
pub const MSG_RETRY_LATER: &str = "랭킹 조회 시간이 초과되었습니다. 잠시 후 다시 시도해주세요.";
pub const MSG_ACCESS_DENIED: &str = "랭킹 API 접근이 거부되었습니다. 관리자에게 문의해주세요.";
pub const MSG_BAD_REQUEST: &str = "랭킹 조회 요청이 올바르지 않습니다.";
pub const MSG_JOB_VANISHED: &str = "검색 작업을 찾을 수 없습니다. 다시 시도해주세요.";
pub const MSG_GENERIC_FAILURE: &str = "랭킹 조회 중 오류가 발생했습니다. 잠시 후 다시 시도해주세요.";
pub const MSG_ALREADY_IN_FLIGHT: &str = "이미 조회가 진행 중입니다. 잠시만 기다려주세요.";

/// The Discord identity behind a lookup.
#[derive(Debug, Clone)]
pub struct Requester {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
}

/// How a submission was resolved.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Served from fresh replicated rows; no request row was created.
    Cached(RankingCard),
    /// Persisted as a waiter; the outcome arrives via fan-out.
    Queued,
}

/// Submission rejections and failures.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("unknown server: {0}")]
    UnknownServer(String),
    #[error("a lookup for this character is already in progress")]
    AlreadyInFlight,
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("discord error: {0}")]
    Discord(#[from] serenity::Error),
}

impl SubmitError {
    /// The message shown to the requester. Internal error text stays out of
    /// user-facing replies.
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::UnknownServer(server) => format!(
                "알 수 없는 서버입니다: `{}`\n사용 가능한 서버: {}",
                server,
                GAME_SERVERS.join(", ")
            ),
            SubmitError::AlreadyInFlight => MSG_ALREADY_IN_FLIGHT.to_string(),
            SubmitError::Db(_) | SubmitError::Discord(_) => MSG_GENERIC_FAILURE.to_string(),
        }
    }
}

/// Handle one ranking lookup after modal input collection.
///
/// This is the single integration point the Discord layer calls. Validation
/// and dedup rejections surface as [`SubmitError`]; a cache hit returns the
/// card directly; everything else becomes a persisted waiter and, for the
/// first request of a query, a background poll.
pub async fn submit(
    state: &Arc<AppState>,
    http: &Arc<Http>,
    requester: &Requester,
    server: &str,
    character: &str,
) -> Result<SubmitOutcome, SubmitError> {
    if !is_known_server(server) {
        return Err(SubmitError::UnknownServer(server.to_string()));
    }

    let pool = state.db.pool();
    let user_id = requester.user_id.to_string();
    let channel_id = requester.channel_id.to_string();
    let guild_id = requester.guild_id.map(|g| g.to_string());
    let new = NewRankRequest {
        user_id: &user_id,
        channel_id: &channel_id,
        guild_id: guild_id.as_deref(),
        server_name: server,
        character_name: character,
    };

    if RankRequestRepository::find_in_flight_by_user_key(pool, &new.user_key())
        .await?
        .is_some()
    {
        return Err(SubmitError::AlreadyInFlight);
    }

    if let Some(card) = cache::fresh_lookup(pool, server, character, Utc::now().timestamp()).await {
        info!("Fast-path hit for {}", new.search_key());
        return Ok(SubmitOutcome::Cached(card));
    }

    // Atomic create; losing the insert race is the same as the dedup check
    let Some(row) = RankRequestRepository::create_if_absent(pool, &new).await? else {
        return Err(SubmitError::AlreadyInFlight);
    };

    // Everything past the insert must clean up the row on failure, so a
    // broken submission does not leave a phantom waiter behind.
    if let Err(e) = start_lookup(state, http, requester, &row.search_key, row.id, server, character)
        .await
    {
        let _ = RankRequestRepository::delete(pool, row.id).await;
        return Err(e);
    }

    Ok(SubmitOutcome::Queued)
}

/// Post the transient notice, then try to claim the processing lease and
/// spawn the background poll. Losing the lease is not an error: the row
/// simply waits for the winner's fan-out.
async fn start_lookup(
    state: &Arc<AppState>,
    http: &Arc<Http>,
    requester: &Requester,
    search_key: &str,
    row_id: i64,
    server: &str,
    character: &str,
) -> Result<(), SubmitError> {
    let pool = state.db.pool();

    let notice = requester
        .channel_id
        .say(
            http,
            format!(
                "🔍 `{}` 서버 `{}` 랭킹 정보를 검색 중입니다. 잠시만 기다려주세요...",
                server, character
            ),
        )
        .await?;
    RankRequestRepository::set_loading_message(pool, row_id, &notice.id.to_string()).await?;

    let promoted = RankRequestRepository::promote_to_processing(pool, row_id, search_key).await?;
    if !promoted {
        info!("Joining in-flight search {}", search_key);
        return Ok(());
    }

    if state.has_poll_task(search_key).await {
        // Should not happen while the DB lease is respected
        warn!("Poll task for {} already live in this process", search_key);
        return Ok(());
    }

    info!("Starting background poll for {}", search_key);
    let handle = tokio::spawn(poll_and_resolve(
        Arc::clone(state),
        Arc::clone(http),
        search_key.to_string(),
        server.to_string(),
        character.to_string(),
    ));
    state.register_poll_task(search_key, handle).await;

    Ok(())
}

enum PollOutcome {
    Success(RankingCard),
    Failure(String),
}

/// Background task: run the remote job to a terminal state, then fan the
/// outcome out to every waiter. One live instance per search key.
pub async fn poll_and_resolve(
    state: Arc<AppState>,
    http: Arc<Http>,
    search_key: String,
    server: String,
    character: String,
) {
    let outcome = run_poll(&state, &search_key, &server, &character).await;

    match outcome {
        PollOutcome::Success(card) => {
            notify::notify_success(&state, &http, &search_key, &card).await;
        }
        PollOutcome::Failure(message) => {
            notify::notify_failure(&state, &http, &search_key, &message).await;
        }
    }

    state.clear_poll_task(&search_key).await;
}

async fn run_poll(
    state: &AppState,
    search_key: &str,
    server: &str,
    character: &str,
) -> PollOutcome {
    // Submission has no retry: any failure here resolves the whole query
    let job_id = match state.rank_api.submit_search(server, character).await {
        Ok(id) => id,
        Err(e) => {
            warn!("Search submission for {} failed: {}", search_key, e);
            return PollOutcome::Failure(failure_message(&e));
        }
    };

    if let Err(e) =
        RankRequestRepository::set_job_id(state.db.pool(), search_key, &job_id).await
    {
        // Informational only; the poll can proceed without it
        warn!("Could not record job id for {}: {}", search_key, e);
    }

    let started = Instant::now();
    loop {
        let elapsed = started.elapsed();
        if elapsed >= POLL_CEILING {
            warn!("Poll ceiling reached for {} (job {})", search_key, job_id);
            return PollOutcome::Failure(MSG_RETRY_LATER.to_string());
        }
        tokio::time::sleep(poll_delay(elapsed)).await;

        let status = match state.rank_api.job_status(&job_id).await {
            Ok(status) => status,
            Err(RankApiError::JobNotFound) => {
                warn!("Job {} for {} vanished upstream", job_id, search_key);
                return PollOutcome::Failure(MSG_JOB_VANISHED.to_string());
            }
            Err(e) if e.is_transient() => {
                warn!("Status poll for {} failed, retrying: {}", search_key, e);
                continue;
            }
            Err(e) => {
                warn!("Status poll for {} failed permanently: {}", search_key, e);
                return PollOutcome::Failure(failure_message(&e));
            }
        };

        match status.status {
            JobStatus::Completed => {
                if status.success.unwrap_or(false) {
                    if let Some(character) = status.character {
                        return PollOutcome::Success(character.into_card());
                    }
                    warn!("Job {} completed without a payload", job_id);
                    return PollOutcome::Failure(MSG_NOT_FOUND.to_string());
                }
                let message = status
                    .message
                    .or(status.error)
                    .map(|m| rewrite_remote_error(&m))
                    .unwrap_or_else(|| MSG_NOT_FOUND.to_string());
                return PollOutcome::Failure(message);
            }
            JobStatus::Failed => {
                let message = status
                    .error
                    .or(status.message)
                    .map(|m| rewrite_remote_error(&m))
                    .unwrap_or_else(|| MSG_GENERIC_FAILURE.to_string());
                return PollOutcome::Failure(message);
            }
            JobStatus::Timeout => {
                return PollOutcome::Failure(MSG_RETRY_LATER.to_string());
            }
            JobStatus::Pending | JobStatus::Processing | JobStatus::Unknown => {}
        }
    }
}

/// Poll interval schedule: 2 s for the first 30 s, 3 s until two minutes,
/// 5 s afterwards.
fn poll_delay(elapsed: Duration) -> Duration {
    if elapsed < Duration::from_secs(30) {
        Duration::from_secs(2)
    } else if elapsed < Duration::from_secs(120) {
        Duration::from_secs(3)
    } else {
        Duration::from_secs(5)
    }
}

/// Map a permanent client error to its user-facing failure text.
fn failure_message(error: &RankApiError) -> String {
    match error {
        RankApiError::AccessDenied => MSG_ACCESS_DENIED.to_string(),
        RankApiError::BadRequest => MSG_BAD_REQUEST.to_string(),
        RankApiError::JobNotFound => MSG_JOB_VANISHED.to_string(),
        RankApiError::Rejected { message } => message.clone(),
        RankApiError::Transport(_) | RankApiError::Payload(_) => MSG_GENERIC_FAILURE.to_string(),
    }
}

/// Rewrite known-bad upstream error text into something users can act on;
/// anything else passes through as supplied.
fn rewrite_remote_error(raw: &str) -> String {
    if raw == UPSTREAM_UNKNOWN_ERROR {
        MSG_NOT_FOUND.to_string()
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_delay_bands() {
        assert_eq!(poll_delay(Duration::from_secs(0)), Duration::from_secs(2));
        assert_eq!(poll_delay(Duration::from_secs(29)), Duration::from_secs(2));
        assert_eq!(poll_delay(Duration::from_secs(30)), Duration::from_secs(3));
        assert_eq!(poll_delay(Duration::from_secs(119)), Duration::from_secs(3));
        assert_eq!(poll_delay(Duration::from_secs(120)), Duration::from_secs(5));
        assert_eq!(poll_delay(Duration::from_secs(500)), Duration::from_secs(5));
    }

    #[test]
    fn known_bad_upstream_error_is_rewritten() {
        assert_eq!(rewrite_remote_error("Unknown search error"), MSG_NOT_FOUND);
        assert_eq!(
            rewrite_remote_error("점검 중입니다"),
            "점검 중입니다"
        );
    }

    #[test]
    fn permanent_errors_map_to_fixed_messages() {
        assert_eq!(failure_message(&RankApiError::AccessDenied), MSG_ACCESS_DENIED);
        assert_eq!(failure_message(&RankApiError::BadRequest), MSG_BAD_REQUEST);
        assert_eq!(failure_message(&RankApiError::JobNotFound), MSG_JOB_VANISHED);
        assert_eq!(
            failure_message(&RankApiError::Rejected {
                message: "서버 점검 중".to_string()
            }),
            "서버 점검 중"
        );
        assert_eq!(
            failure_message(&RankApiError::Payload("bad".to_string())),
            MSG_GENERIC_FAILURE
        );
    }

    #[test]
    fn unknown_server_message_lists_servers() {
        let err = SubmitError::UnknownServer("InvalidServer".to_string());
        let msg = err.user_message();
        assert!(msg.contains("InvalidServer"));
        assert!(msg.contains("데이안"));
    }
}
