pub mod maps;
pub mod templates;

use crate::error::{WorldError, WorldResult};
use crate::world::spawner::SerializableSpawner;
use maps::MapDefinition;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use templates::{NpcTemplate, SpawnerProperties};

/// Tag lookup for NPC and spawner templates.
pub trait ContentLookup {
    fn npc_template(&self, tag: &str) -> Option<&NpcTemplate>;

    fn spawner_template(&self, tag: &str) -> Option<&SpawnerProperties>;
}

/// Persisted spawner tick counters, keyed by map name.
pub type SavedSpawners = BTreeMap<String, Vec<SerializableSpawner>>;

/// Content read from a content root:
///
/// ```text
/// <root>/npcs.yaml            tag -> NpcTemplate
/// <root>/spawners.yaml        tag -> SpawnerProperties
/// <root>/maps/*.yaml          one MapDefinition per file
/// <root>/save/spawners.yaml   optional SavedSpawners
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContentIndex {
    pub npcs: BTreeMap<String, NpcTemplate>,
    pub spawners: BTreeMap<String, SpawnerProperties>,
    pub maps: BTreeMap<String, MapDefinition>,
    pub saved_spawners: SavedSpawners,
}

impl ContentIndex {
    pub fn load(root: &Path) -> WorldResult<Self> {
        let npcs: BTreeMap<String, NpcTemplate> = read_yaml(&root.join("npcs.yaml"))?;
        let spawners: BTreeMap<String, SpawnerProperties> =
            read_yaml(&root.join("spawners.yaml"))?;

        let maps_dir = root.join("maps");
        let entries = fs::read_dir(&maps_dir).map_err(|source| WorldError::Io {
            path: maps_dir.clone(),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| WorldError::Io {
                path: maps_dir.clone(),
                source,
            })?;
            let path = entry.path();
            let ext = path
                .extension()
                .and_then(|ext| ext.to_str())
                .unwrap_or("")
                .to_ascii_lowercase();
            if path.is_file() && (ext == "yaml" || ext == "yml") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut maps = BTreeMap::new();
        for path in paths {
            let definition: MapDefinition = read_yaml(&path)?;
            if maps.contains_key(&definition.name) {
                return Err(WorldError::InvalidDefinition {
                    path,
                    message: format!("duplicate map name {}", definition.name),
                });
            }
            maps.insert(definition.name.clone(), definition);
        }

        let save_path = root.join("save").join("spawners.yaml");
        let saved_spawners = if save_path.is_file() {
            read_yaml(&save_path)?
        } else {
            SavedSpawners::new()
        };

        log::info!(
            "content loaded: npcs={}, spawners={}, maps={}",
            npcs.len(),
            spawners.len(),
            maps.len()
        );
        Ok(Self {
            npcs,
            spawners,
            maps,
            saved_spawners,
        })
    }

    pub fn saved_spawners_for(&self, map: &str) -> &[SerializableSpawner] {
        self.saved_spawners
            .get(map)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl ContentLookup for ContentIndex {
    fn npc_template(&self, tag: &str) -> Option<&NpcTemplate> {
        self.npcs.get(tag)
    }

    fn spawner_template(&self, tag: &str) -> Option<&SpawnerProperties> {
        self.spawners.get(tag)
    }
}

/// Writes `<root>/save/spawners.yaml`, creating the directory if needed.
pub fn save_spawners(root: &Path, saved: &SavedSpawners) -> WorldResult<()> {
    let dir = root.join("save");
    fs::create_dir_all(&dir).map_err(|source| WorldError::Io {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join("spawners.yaml");
    let text = serde_yaml::to_string(saved).map_err(|err| WorldError::InvalidDefinition {
        path: path.clone(),
        message: err.to_string(),
    })?;
    fs::write(&path, text).map_err(|source| WorldError::Io { path, source })
}

pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> WorldResult<T> {
    let text = fs::read_to_string(path).map_err(|source| WorldError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&text).map_err(|err| WorldError::InvalidDefinition {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}
