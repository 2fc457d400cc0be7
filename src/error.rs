//! Error types for the admin-API boundary.
//!
//! Per spec.md §7, nothing in the merge pipeline itself raises an error to the
//! caller — parked/input-controlled/ambiguous writes produce reject events
//! instead (see [`crate::engine::events::Event`]), and transport/packet faults
//! degrade or drop silently. `EngineError` only covers the create/update/delete
//! surface (groups, mappings, scenes, outputs, inputs) where a structured code
//! is genuinely useful to an external HTTP layer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("universe {0} does not exist")]
    UnknownUniverse(u32),
    #[error("group {0} does not exist")]
    UnknownGroup(u32),
    #[error("scene {0} does not exist")]
    UnknownScene(u32),
    #[error("output {0} does not exist")]
    UnknownOutput(u32),
    #[error("channel {0} is out of range (expected 1..=512)")]
    ChannelOutOfRange(u32),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Transport-unavailable conditions (§7). These never propagate on their own —
/// a transport that fails to open logs the error and enters a degraded
/// `status()`; `EngineError::Transport` only wraps one when an admin-API call
/// (e.g. "add this output now") needs to report the failure immediately.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to join multicast group {group}: {source}")]
    MulticastJoinFailed {
        group: String,
        #[source]
        source: std::io::Error,
    },
    #[error("MIDI device error: {0}")]
    Midi(String),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
