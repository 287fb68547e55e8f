//! Result fan-out: deliver one resolved outcome to every waiter of a query.

use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};
use tracing::{info, warn};

use harmari_core::RankingCard;
use harmari_db::{RankRequest, RankRequestRepository, RequestStatus};

use super::card::format_ranking_card;
use crate::state::AppState;

/// Best-effort removal of the transient "searching" notice. The message may
/// already be gone; that is not an error.
async fn delete_loading_message(http: &Http, row: &RankRequest) {
    let Some(message_id) = &row.loading_message_id else {
        return;
    };
    let (Ok(channel), Ok(message)) = (row.channel_id.parse::<u64>(), message_id.parse::<u64>())
    else {
        warn!("Request {} carries unparsable ids, skipping delete", row.id);
        return;
    };
    if let Err(e) = ChannelId::new(channel)
        .delete_message(http, MessageId::new(message))
        .await
    {
        warn!("Could not delete loading message for request {}: {}", row.id, e);
    }
}

/// Deliver one message to a waiter's channel. Failures are logged and do not
/// abort the remaining waiters.
async fn deliver(http: &Http, row: &RankRequest, content: &str) {
    let Ok(channel) = row.channel_id.parse::<u64>() else {
        warn!("Request {} has an unparsable channel id", row.id);
        return;
    };
    if let Err(e) = ChannelId::new(channel).say(http, content).await {
        warn!(
            "Could not deliver rank result to user {} in channel {}: {}",
            row.user_id, row.channel_id, e
        );
    }
}

/// Fan a successful lookup out to every in-flight waiter of the search key,
/// then finalize their rows as completed.
pub async fn notify_success(state: &AppState, http: &Http, search_key: &str, card: &RankingCard) {
    let pool = state.db.pool();
    let rows = match RankRequestRepository::find_in_flight_by_search_key(pool, search_key).await {
        Ok(rows) => rows,
        Err(e) => {
            warn!("Could not load waiters for {}: {}", search_key, e);
            return;
        }
    };

    let rendered = format_ranking_card(card);
    for row in &rows {
        delete_loading_message(http, row).await;
        let content = format!("<@{}>\n{}", row.user_id, rendered);
        deliver(http, row, &content).await;
    }

    match RankRequestRepository::finalize_search(pool, search_key, RequestStatus::Completed).await {
        Ok(count) => info!("Search {} completed, {} waiters notified", search_key, count),
        Err(e) => warn!("Could not finalize {} as completed: {}", search_key, e),
    }
}

/// Fan a failure out to every waiter of the search key.
///
/// When no in-flight rows remain (a race already finalized them) the lookup
/// falls back to every status, so a legitimate failure notice is still
/// delivered instead of silently dropped.
pub async fn notify_failure(state: &AppState, http: &Http, search_key: &str, message: &str) {
    let pool = state.db.pool();
    let rows = match RankRequestRepository::find_in_flight_by_search_key(pool, search_key).await {
        Ok(rows) if rows.is_empty() => {
            match RankRequestRepository::find_all_by_search_key(pool, search_key).await {
                Ok(rows) => rows,
                Err(e) => {
                    warn!("Could not load waiters for {}: {}", search_key, e);
                    return;
                }
            }
        }
        Ok(rows) => rows,
        Err(e) => {
            warn!("Could not load waiters for {}: {}", search_key, e);
            return;
        }
    };

    for row in &rows {
        delete_loading_message(http, row).await;
        let content = format!("<@{}> {}", row.user_id, message);
        deliver(http, row, &content).await;
    }

    match RankRequestRepository::finalize_search(pool, search_key, RequestStatus::Failed).await {
        Ok(count) => info!("Search {} failed, {} waiters notified", search_key, count),
        Err(e) => warn!("Could not finalize {} as failed: {}", search_key, e),
    }
}
