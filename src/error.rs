use std::path::PathBuf;

use thiserror::Error;

use crate::world::doors::DoorId;
use crate::world::position::Position;

/// Errors raised while loading content or addressing maps.
///
/// Ticks and range queries never produce one of these; empty results and
/// zones at capacity are steady-state conditions.
#[derive(Error, Debug)]
pub enum WorldError {
    #[error("npc template {tag} does not exist (referenced by {referenced_by})")]
    MissingNpcTemplate { tag: String, referenced_by: String },

    #[error("tagged spawner {0} does not exist")]
    MissingSpawnerTemplate(String),

    #[error("spawner {map} - {},{} has no tag", .position.x, .position.y)]
    SpawnerWithoutTag { map: String, position: Position },

    #[error("npc {name} on {map} has no tag")]
    NpcWithoutTag { map: String, name: String },

    #[error("door {id:?} does not exist on {map}")]
    UnknownDoor { map: String, id: DoorId },

    #[error("map {0} is not loaded")]
    MapNotLoaded(String),

    #[error("map {0} is already loaded")]
    MapAlreadyLoaded(String),

    #[error("unknown character {0}")]
    UnknownCharacter(String),

    #[error("invalid definition {path}: {message}")]
    InvalidDefinition { path: PathBuf, message: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type WorldResult<T> = Result<T, WorldError>;
