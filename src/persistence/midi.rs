use sqlx::SqlitePool;

use crate::error::PersistenceError;
use crate::midi::{CcMapping, NoteAction, NoteTrigger};

pub async fn load_cc_mappings(pool: &SqlitePool) -> Result<Vec<CcMapping>, PersistenceError> {
    let rows = sqlx::query_as::<_, (i64, i64, i64, Option<String>, i64)>(
        "SELECT cc_number, midi_channel, input_channel, device_name, enabled FROM midi_cc_mappings",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(cc_number, midi_channel, input_channel, device_name, enabled)| CcMapping {
            cc_number: cc_number as u8,
            midi_channel: midi_channel as i8,
            input_channel: input_channel as u16,
            device_name,
            enabled: enabled != 0,
        })
        .collect())
}

pub async fn save_cc_mapping(pool: &SqlitePool, mapping: &CcMapping) -> Result<(), PersistenceError> {
    sqlx::query(
        "INSERT INTO midi_cc_mappings (cc_number, midi_channel, input_channel, device_name, enabled)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(mapping.cc_number)
    .bind(mapping.midi_channel)
    .bind(mapping.input_channel)
    .bind(&mapping.device_name)
    .bind(mapping.enabled)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn load_note_triggers(pool: &SqlitePool) -> Result<Vec<NoteTrigger>, PersistenceError> {
    let rows = sqlx::query_as::<_, (i64, i64, String, Option<i64>, Option<String>, i64)>(
        "SELECT note, midi_channel, action, target_id, device_name, enabled FROM midi_note_triggers",
    )
    .fetch_all(pool)
    .await?;

    let mut triggers = Vec::with_capacity(rows.len());
    for (note, midi_channel, action, target_id, device_name, enabled) in rows {
        let action = match action.as_str() {
            "scene" => NoteAction::Scene { scene_id: target_id.unwrap_or(0) as u32 },
            "blackout" => NoteAction::Blackout,
            "group" => NoteAction::Group { group_id: target_id.unwrap_or(0) as u32 },
            other => {
                log::warn!("skipping midi note trigger with unknown action {other}");
                continue;
            }
        };
        triggers.push(NoteTrigger {
            note: note as u8,
            midi_channel: midi_channel as i8,
            action,
            device_name,
            enabled: enabled != 0,
        });
    }
    Ok(triggers)
}

pub async fn save_note_trigger(pool: &SqlitePool, trigger: &NoteTrigger) -> Result<(), PersistenceError> {
    let (action, target_id): (&str, Option<u32>) = match trigger.action {
        NoteAction::Scene { scene_id } => ("scene", Some(scene_id)),
        NoteAction::Blackout => ("blackout", None),
        NoteAction::Group { group_id } => ("group", Some(group_id)),
    };
    sqlx::query(
        "INSERT INTO midi_note_triggers (note, midi_channel, action, target_id, device_name, enabled)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(trigger.note)
    .bind(trigger.midi_channel)
    .bind(action)
    .bind(target_id)
    .bind(&trigger.device_name)
    .bind(trigger.enabled)
    .execute(pool)
    .await?;
    Ok(())
}
