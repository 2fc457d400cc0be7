//! SQLite persistence (spec.md §7's "Persistence mismatch at startup", teacher's
//! `database.rs` + `sqlx::migrate!` convention). One pool, one `Store`, CRUD
//! split across submodules by entity the same way the teacher splits
//! `database/local/{groups,tracks,...}.rs`.

pub mod groups;
pub mod mappings;
pub mod midi;
pub mod parked;
pub mod scenes;

use std::path::Path;

use log::warn;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::PersistenceError;

pub struct Store {
    pub(crate) pool: SqlitePool,
}

impl Store {
    pub async fn connect(path: &Path) -> Result<Self, PersistenceError> {
        let connect_options = SqliteConnectOptions::new()
            .filename(path)
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new().max_connections(3).connect_with(connect_options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Loads every persisted entity, logging and skipping rows that fail to
    /// deserialize rather than aborting startup (spec.md §7).
    pub async fn load_all(&self) -> StartupState {
        let groups = groups::load_all(&self.pool).await.unwrap_or_else(|err| {
            warn!("failed to load groups: {}", err);
            Vec::new()
        });
        let (mapping_entries, unmapped_behavior, mapping_enabled) =
            mappings::load(&self.pool).await.unwrap_or_else(|err| {
                warn!("failed to load channel mappings: {}", err);
                (Vec::new(), crate::mapping::UnmappedBehavior::Passthrough, true)
            });
        let parked = parked::load_all(&self.pool).await.unwrap_or_else(|err| {
            warn!("failed to load parked channels: {}", err);
            Vec::new()
        });
        let scenes = scenes::load_all(&self.pool).await.unwrap_or_else(|err| {
            warn!("failed to load scenes: {}", err);
            Vec::new()
        });
        let cc_mappings = midi::load_cc_mappings(&self.pool).await.unwrap_or_else(|err| {
            warn!("failed to load MIDI CC mappings: {}", err);
            Vec::new()
        });
        let note_triggers = midi::load_note_triggers(&self.pool).await.unwrap_or_else(|err| {
            warn!("failed to load MIDI note triggers: {}", err);
            Vec::new()
        });

        StartupState { groups, mapping_entries, unmapped_behavior, mapping_enabled, parked, scenes, cc_mappings, note_triggers }
    }
}

pub struct StartupState {
    pub groups: Vec<crate::groups::Group>,
    pub mapping_entries: Vec<(crate::mapping::MappingEntry, Vec<crate::mapping::MappingDestination>)>,
    pub unmapped_behavior: crate::mapping::UnmappedBehavior,
    pub mapping_enabled: bool,
    pub parked: Vec<(u32, u16, u8)>,
    pub scenes: Vec<crate::scenes::Scene>,
    pub cc_mappings: Vec<crate::midi::CcMapping>,
    pub note_triggers: Vec<crate::midi::NoteTrigger>,
}
