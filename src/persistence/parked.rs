use sqlx::SqlitePool;

use crate::error::PersistenceError;

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<(u32, u16, u8)>, PersistenceError> {
    let rows = sqlx::query_as::<_, (i64, i64, i64)>("SELECT universe, channel, value FROM parked_channels")
        .fetch_all(pool)
        .await?;
    Ok(rows.into_iter().map(|(u, c, v)| (u as u32, c as u16, v as u8)).collect())
}

pub async fn save(pool: &SqlitePool, universe: u32, channel: u16, value: u8) -> Result<(), PersistenceError> {
    sqlx::query(
        "INSERT INTO parked_channels (universe, channel, value) VALUES (?, ?, ?)
         ON CONFLICT (universe, channel) DO UPDATE SET value = excluded.value",
    )
    .bind(universe)
    .bind(channel)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, universe: u32, channel: u16) -> Result<(), PersistenceError> {
    sqlx::query("DELETE FROM parked_channels WHERE universe = ? AND channel = ?")
        .bind(universe)
        .bind(channel)
        .execute(pool)
        .await?;
    Ok(())
}
