use crate::content::templates::SpawnerProperties;
use crate::world::knowledge::DEFAULT_KNOWLEDGE_RADIUS;
use serde::{Deserialize, Serialize};

/// One `maps/*.yaml` file: the static layout a MapState is built from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MapDefinition {
    pub name: String,
    pub width: i32,
    pub height: i32,
    #[serde(default = "default_knowledge_radius")]
    pub knowledge_radius: i32,
    #[serde(default)]
    pub respawn_point: Option<TilePoint>,
    #[serde(default)]
    pub doors: Vec<DoorPlacement>,
    #[serde(default)]
    pub npcs: Vec<NpcPlacement>,
    #[serde(default)]
    pub spawners: Vec<SpawnerPlacement>,
}

fn default_knowledge_radius() -> i32 {
    DEFAULT_KNOWLEDGE_RADIUS
}

impl MapDefinition {
    pub fn new(name: impl Into<String>, width: i32, height: i32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            knowledge_radius: DEFAULT_KNOWLEDGE_RADIUS,
            respawn_point: None,
            doors: Vec::new(),
            npcs: Vec::new(),
            spawners: Vec::new(),
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TilePoint {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DoorPlacement {
    pub id: u32,
    pub x: i32,
    pub y: i32,
}

/// A hand-placed NPC; all of them share the map's default spawner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NpcPlacement {
    pub name: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub sprite: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnerPlacement {
    pub name: String,
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub properties: SpawnerProperties,
}
