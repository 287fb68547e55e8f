//! Fast-path lookup against the replicated ranking table.

use sqlx::SqlitePool;
use tracing::warn;

use harmari_core::{RankScore, RankingCard, UNKNOWN};
use harmari_db::{
    CachedRankRow, RankingRepository,
    rankings::{DIV_CHARM, DIV_COMBAT, DIV_LIFE},
};

/// Snapshots older than this are treated as absent.
pub const FRESHNESS_WINDOW_SECS: i64 = 15 * 60;

fn score_from_row(row: &CachedRankRow) -> RankScore {
    RankScore::normalize(
        row.rank_position.map(|n| n.to_string()).as_deref(),
        row.power_value.map(|n| n.to_string()).as_deref(),
        Some(&row.change_amount.to_string()),
        row.change_type.as_deref(),
    )
}

/// Try to satisfy a lookup from fresh replicated rows.
///
/// A hit requires all three category snapshots to be present and inside the
/// freshness window; a single stale or missing category forces the slow path
/// so all categories get refreshed together instead of mixing ages. Storage
/// errors degrade to a miss rather than failing the user's request.
pub async fn fresh_lookup(
    pool: &SqlitePool,
    server: &str,
    character: &str,
    now: i64,
) -> Option<RankingCard> {
    let mut rows = Vec::with_capacity(3);
    for div in [DIV_COMBAT, DIV_CHARM, DIV_LIFE] {
        match RankingRepository::latest_within(
            pool,
            server,
            character,
            div,
            now,
            FRESHNESS_WINDOW_SECS,
        )
        .await
        {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => return None,
            Err(e) => {
                warn!("Ranking cache lookup failed, falling back to API: {}", e);
                return None;
            }
        }
    }

    let [combat, charm, life]: [CachedRankRow; 3] = rows.try_into().ok()?;

    Some(RankingCard {
        character: combat.character_name.clone(),
        server: combat.server_name.clone(),
        class: combat
            .class_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        combat: score_from_row(&combat),
        charm: score_from_row(&charm),
        life: score_from_row(&life),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use harmari_db::test_helpers::{create_test_pool, insert_ranking_row};

    #[tokio::test]
    async fn all_three_fresh_categories_are_a_hit() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let now = Utc::now().timestamp();

        for div in [DIV_COMBAT, DIV_CHARM, DIV_LIFE] {
            insert_ranking_row(pool, "데이안", "Foo", div, Some(100 * div), Some(1000), now - 60)
                .await;
        }

        let card = fresh_lookup(pool, "데이안", "Foo", now).await.unwrap();
        assert_eq!(card.character, "Foo");
        assert_eq!(card.server, "데이안");
        assert_eq!(card.combat.rank, "100위");
        assert_eq!(card.charm.rank, "200위");
        assert_eq!(card.life.rank, "300위");
    }

    #[tokio::test]
    async fn one_stale_category_is_a_miss() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let now = Utc::now().timestamp();

        insert_ranking_row(pool, "데이안", "Foo", DIV_COMBAT, Some(1), Some(1000), now - 60).await;
        insert_ranking_row(pool, "데이안", "Foo", DIV_CHARM, Some(2), Some(1000), now - 60).await;
        // Life snapshot is 20 minutes old
        insert_ranking_row(pool, "데이안", "Foo", DIV_LIFE, Some(3), Some(1000), now - 20 * 60)
            .await;

        assert!(fresh_lookup(pool, "데이안", "Foo", now).await.is_none());
    }

    #[tokio::test]
    async fn missing_category_is_a_miss() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let now = Utc::now().timestamp();

        insert_ranking_row(pool, "데이안", "Foo", DIV_COMBAT, Some(1), Some(1000), now - 60).await;

        assert!(fresh_lookup(pool, "데이안", "Foo", now).await.is_none());
    }
}
