//! Test helpers for the harmari database.

use sqlx::SqlitePool;

use crate::{
    db::DbPool,
    error::{DbError, DbResult},
    sqlite_runtime::create_in_memory_pool,
};

/// Create an in-memory database for testing
pub async fn create_test_pool() -> DbResult<DbPool> {
    let pool = create_in_memory_pool(1).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| DbError::Migration(e.to_string()))?;

    Ok(DbPool::from_pool(pool))
}

/// Insert one replicated ranking snapshot row.
#[allow(clippy::too_many_arguments)]
pub async fn insert_ranking_row(
    pool: &SqlitePool,
    server: &str,
    character: &str,
    div: i64,
    rank_position: Option<i64>,
    power_value: Option<i64>,
    retrieved_at: i64,
) {
    sqlx::query(
        "INSERT INTO character_rankings
             (server_name, character_name, class_name, div,
              rank_position, power_value, change_amount, change_type, retrieved_at)
         VALUES (?, ?, '전사', ?, ?, ?, 0, 'none', ?)",
    )
    .bind(server)
    .bind(character)
    .bind(div)
    .bind(rank_position)
    .bind(power_value)
    .bind(retrieved_at)
    .execute(pool)
    .await
    .expect("failed to insert test ranking row");
}
