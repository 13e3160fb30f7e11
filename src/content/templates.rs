use crate::entities::character::{Alignment, Allegiance, Hostility};
use serde::{Deserialize, Serialize};

/// NPC template as authored in `npcs.yaml`, keyed there by its tag.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NpcTemplate {
    pub name: String,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default = "default_hp")]
    pub hp: i32,
    #[serde(default)]
    pub mp: i32,
    #[serde(default)]
    pub sprite: Option<i32>,
    #[serde(default)]
    pub allegiance: Option<Allegiance>,
    #[serde(default)]
    pub alignment: Option<Alignment>,
    #[serde(default)]
    pub hostility: Option<Hostility>,
    #[serde(default)]
    pub elite: bool,
    #[serde(default)]
    pub stationary: bool,
    #[serde(default)]
    pub effects: Vec<String>,
}

fn default_level() -> u32 {
    1
}

fn default_hp() -> i32 {
    100
}

/// Partial spawner settings. Templates in `spawners.yaml` and per-placement
/// overrides in map files share this shape; `merge` layers them.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpawnerProperties {
    #[serde(default)]
    pub respawn_rate: Option<u64>,
    #[serde(default)]
    pub initial_spawn: Option<u32>,
    #[serde(default)]
    pub max_creatures: Option<u32>,
    #[serde(default)]
    pub spawn_radius: Option<i32>,
    #[serde(default)]
    pub random_walk_radius: Option<i32>,
    #[serde(default)]
    pub leash_radius: Option<i32>,
    #[serde(default)]
    pub require_dead_to_respawn: Option<bool>,
    #[serde(default)]
    pub remove_dead_npcs: Option<bool>,
    #[serde(default)]
    pub respect_knowledge: Option<bool>,
    #[serde(default)]
    pub elite_tick_cap: Option<i32>,
    #[serde(default)]
    pub should_serialize: Option<bool>,
    #[serde(default)]
    pub npc_ids: Option<Vec<String>>,
    #[serde(default)]
    pub lair_name: Option<String>,
    #[serde(default)]
    pub resource_name: Option<String>,
}

impl SpawnerProperties {
    /// Fields set in `overrides` win; unset ones fall through to `self`.
    pub fn merge(self, overrides: SpawnerProperties) -> SpawnerProperties {
        SpawnerProperties {
            respawn_rate: overrides.respawn_rate.or(self.respawn_rate),
            initial_spawn: overrides.initial_spawn.or(self.initial_spawn),
            max_creatures: overrides.max_creatures.or(self.max_creatures),
            spawn_radius: overrides.spawn_radius.or(self.spawn_radius),
            random_walk_radius: overrides.random_walk_radius.or(self.random_walk_radius),
            leash_radius: overrides.leash_radius.or(self.leash_radius),
            require_dead_to_respawn: overrides
                .require_dead_to_respawn
                .or(self.require_dead_to_respawn),
            remove_dead_npcs: overrides.remove_dead_npcs.or(self.remove_dead_npcs),
            respect_knowledge: overrides.respect_knowledge.or(self.respect_knowledge),
            elite_tick_cap: overrides.elite_tick_cap.or(self.elite_tick_cap),
            should_serialize: overrides.should_serialize.or(self.should_serialize),
            npc_ids: overrides.npc_ids.or(self.npc_ids),
            lair_name: overrides.lair_name.or(self.lair_name),
            resource_name: overrides.resource_name.or(self.resource_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_overrides() {
        let template = SpawnerProperties {
            respawn_rate: Some(120),
            max_creatures: Some(5),
            npc_ids: Some(vec!["Deer".to_string()]),
            ..SpawnerProperties::default()
        };
        let placement = SpawnerProperties {
            max_creatures: Some(2),
            respect_knowledge: Some(false),
            ..SpawnerProperties::default()
        };
        let merged = template.merge(placement);
        assert_eq!(merged.respawn_rate, Some(120));
        assert_eq!(merged.max_creatures, Some(2));
        assert_eq!(merged.respect_knowledge, Some(false));
        assert_eq!(merged.npc_ids, Some(vec!["Deer".to_string()]));
    }

    #[test]
    fn unknown_spawner_keys_are_rejected() {
        let text = "respawn_rate: 10\nrespawnRate: 20\n";
        assert!(serde_yaml::from_str::<SpawnerProperties>(text).is_err());
    }

    #[test]
    fn npc_template_defaults() {
        let template: NpcTemplate = serde_yaml::from_str("name: deer\n").expect("template");
        assert_eq!(template.level, 1);
        assert_eq!(template.hp, 100);
        assert!(template.hostility.is_none());
        assert!(!template.elite);
        assert!(serde_yaml::from_str::<NpcTemplate>("name: deer\ncolour: red\n").is_err());
    }
}
