//! Read-only access to the replicated ranking snapshot table.
//!
//! An external replication job keeps `character_rankings` populated; the bot
//! only ever reads the newest row per category and treats anything older
//! than the freshness window as absent.

use sqlx::SqlitePool;

use crate::error::DbResult;

/// Ranking category divisions, matching the replicated table.
pub const DIV_COMBAT: i64 = 1;
pub const DIV_CHARM: i64 = 2;
pub const DIV_LIFE: i64 = 3;

/// One replicated ranking row (newest snapshot for a category).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedRankRow {
    pub server_name: String,
    pub character_name: String,
    pub class_name: Option<String>,
    pub div: i64,
    pub rank_position: Option<i64>,
    pub power_value: Option<i64>,
    pub change_amount: i64,
    pub change_type: Option<String>,
    pub retrieved_at: i64,
}

/// Repository for character_rankings reads.
pub struct RankingRepository;

impl RankingRepository {
    /// The newest snapshot for one category, but only when it was retrieved
    /// within `window_secs` of `now`. Stale rows are reported as absent so
    /// the caller falls through to the slow path.
    pub async fn latest_within(
        pool: &SqlitePool,
        server: &str,
        character: &str,
        div: i64,
        now: i64,
        window_secs: i64,
    ) -> DbResult<Option<CachedRankRow>> {
        let row = sqlx::query_as::<_, CachedRankRow>(
            "SELECT server_name, character_name, class_name, div,
                    rank_position, power_value, change_amount, change_type, retrieved_at
             FROM character_rankings
             WHERE server_name = ? AND character_name = ? AND div = ?
               AND retrieved_at >= ?
             ORDER BY retrieved_at DESC
             LIMIT 1",
        )
        .bind(server)
        .bind(character)
        .bind(div)
        .bind(now - window_secs)
        .fetch_optional(pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{create_test_pool, insert_ranking_row};
    use chrono::Utc;

    #[tokio::test]
    async fn latest_within_returns_fresh_rows_only() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let now = Utc::now().timestamp();

        insert_ranking_row(pool, "데이안", "Foo", DIV_COMBAT, Some(10), Some(5000), now - 60)
            .await;
        insert_ranking_row(
            pool,
            "데이안",
            "Foo",
            DIV_CHARM,
            Some(20),
            Some(4000),
            now - 20 * 60,
        )
        .await;

        let combat =
            RankingRepository::latest_within(pool, "데이안", "Foo", DIV_COMBAT, now, 15 * 60)
                .await
                .unwrap();
        assert!(combat.is_some());
        assert_eq!(combat.unwrap().rank_position, Some(10));

        // Retrieved 20 minutes ago: outside the freshness window
        let charm =
            RankingRepository::latest_within(pool, "데이안", "Foo", DIV_CHARM, now, 15 * 60)
                .await
                .unwrap();
        assert!(charm.is_none());
    }

    #[tokio::test]
    async fn latest_within_prefers_the_newest_snapshot() {
        let db = create_test_pool().await.unwrap();
        let pool = db.pool();
        let now = Utc::now().timestamp();

        insert_ranking_row(pool, "데이안", "Foo", DIV_COMBAT, Some(30), Some(1000), now - 600)
            .await;
        insert_ranking_row(pool, "데이안", "Foo", DIV_COMBAT, Some(25), Some(1100), now - 60)
            .await;

        let row = RankingRepository::latest_within(pool, "데이안", "Foo", DIV_COMBAT, now, 15 * 60)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.rank_position, Some(25));
    }
}
