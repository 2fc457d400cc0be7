use sqlx::SqlitePool;

use crate::error::PersistenceError;
use crate::scenes::Scene;

pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Scene>, PersistenceError> {
    let rows = sqlx::query_as::<_, (i64, String)>("SELECT id, data_json FROM scenes ORDER BY display_order")
        .fetch_all(pool)
        .await?;

    let mut scenes = Vec::with_capacity(rows.len());
    for (id, data_json) in rows {
        match serde_json::from_str::<Scene>(&data_json) {
            Ok(scene) => scenes.push(scene),
            Err(err) => log::warn!("skipping scene {id}: {err}"),
        }
    }
    Ok(scenes)
}

pub async fn save(pool: &SqlitePool, scene: &Scene, display_order: i64) -> Result<(), PersistenceError> {
    let data_json = serde_json::to_string(scene).expect("Scene serialization is infallible");
    sqlx::query(
        "INSERT INTO scenes (id, name, display_order, data_json) VALUES (?, ?, ?, ?)
         ON CONFLICT (id) DO UPDATE SET name = excluded.name, display_order = excluded.display_order, data_json = excluded.data_json",
    )
    .bind(scene.id)
    .bind(&scene.name)
    .bind(display_order)
    .bind(data_json)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &SqlitePool, id: u32) -> Result<(), PersistenceError> {
    sqlx::query("DELETE FROM scenes WHERE id = ?").bind(id).execute(pool).await?;
    Ok(())
}

/// `reorder_scenes` (supplemented, `api/scenes.py`): persists a new
/// `display_order` for each scene id in `order`.
pub async fn reorder(pool: &SqlitePool, order: &[u32]) -> Result<(), PersistenceError> {
    let mut tx = pool.begin().await?;
    for (index, scene_id) in order.iter().enumerate() {
        sqlx::query("UPDATE scenes SET display_order = ? WHERE id = ?")
            .bind(index as i64)
            .bind(scene_id)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}
