use sqlx::SqlitePool;

use crate::error::PersistenceError;
use crate::groups::Group;

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Group>, PersistenceError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, data_json FROM groups ORDER BY id")
        .fetch_all(pool)
        .await?;

    let mut groups = Vec::with_capacity(rows.len());
    for (id, data_json) in rows {
        match serde_json::from_str::<Group>(&data_json) {
            Ok(group) => groups.push(group),
            Err(err) => log::warn!("skipping group {id}: {err}"),
        }
    }
    Ok(groups)
}

pub async fn save(pool: &SqlitePool, group: &Group) -> Result<(), PersistenceError> {
    let data_json = serde_json::to_string(group).expect("Group serialization is infallible");
    sqlx::query(
        "INSERT INTO groups (id, name, enabled, data_json) VALUES (?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET name = excluded.name, enabled = excluded.enabled, data_json = excluded.data_json",
    )
    .bind(group.id)
    .bind(&group.name)
    .bind(group.enabled)
    .bind(data_json)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: u32) -> Result<(), PersistenceError> {
    sqlx::query("DELETE FROM groups WHERE id = ?").bind(id).execute(pool).await?;
    Ok(())
}
