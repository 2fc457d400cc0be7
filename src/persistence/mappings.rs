use sqlx::SqlitePool;

use crate::error::PersistenceError;
use crate::mapping::{MappingDestination, MappingEntry, UnmappedBehavior};

pub async fn load(
    pool: &SqlitePool,
) -> Result<(Vec<(MappingEntry, Vec<MappingDestination>)>, UnmappedBehavior, bool), PersistenceError> {
    let rows = sqlx::query_as::<_, (i64, i64, String)>("SELECT src_universe, src_channel, dst_json FROM channel_mappings")
        .fetch_all(pool)
        .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for (src_universe, src_channel, dst_json) in rows {
        match serde_json::from_str::<Vec<MappingDestination>>(&dst_json) {
            Ok(destinations) => entries.push((
                MappingEntry { src_universe: src_universe as u32, src_channel: src_channel as u16 },
                destinations,
            )),
            Err(err) => log::warn!("skipping mapping {src_universe}:{src_channel}: {err}"),
        }
    }

    let settings = sqlx::query_as::<_, (String, i64)>(
        "SELECT unmapped_behavior, enabled FROM mapping_settings WHERE id = 1",
    )
    .fetch_optional(pool)
    .await?;

    let (unmapped_behavior, enabled) = match settings {
        Some((behavior, enabled)) => {
            let behavior = if behavior == "ignore" { UnmappedBehavior::Ignore } else { UnmappedBehavior::Passthrough };
            (behavior, enabled != 0)
        }
        None => (UnmappedBehavior::Passthrough, true),
    };

    Ok((entries, unmapped_behavior, enabled))
}

pub async fn replace(
    pool: &SqlitePool,
    entries: &[(MappingEntry, Vec<MappingDestination>)],
    unmapped_behavior: UnmappedBehavior,
    enabled: bool,
) -> Result<(), PersistenceError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM channel_mappings").execute(&mut *tx).await?;
    for (entry, destinations) in entries {
        let dst_json = serde_json::to_string(destinations).expect("MappingDestination serialization is infallible");
        sqlx::query("INSERT INTO channel_mappings (src_universe, src_channel, dst_json) VALUES (?, ?, ?)")
            .bind(entry.src_universe)
            .bind(entry.src_channel)
            .bind(dst_json)
            .execute(&mut *tx)
            .await?;
    }

    let behavior_str = match unmapped_behavior {
        UnmappedBehavior::Passthrough => "passthrough",
        UnmappedBehavior::Ignore => "ignore",
    };
    sqlx::query(
        "INSERT INTO mapping_settings (id, unmapped_behavior, enabled) VALUES (1, ?, ?)
         ON CONFLICT (id) DO UPDATE SET unmapped_behavior = excluded.unmapped_behavior, enabled = excluded.enabled",
    )
    .bind(behavior_str)
    .bind(enabled)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
