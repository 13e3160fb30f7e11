use crate::content::maps::MapDefinition;
use crate::content::{ContentIndex, ContentLookup, SavedSpawners};
use crate::entities::character::{CharacterId, PlayerId};
use crate::error::{WorldError, WorldResult};
use crate::world::context::MapContext;
use crate::world::map_state::MapState;
use crate::world::position::Position;
use crate::world::spawner::SerializableSpawner;
use crate::world::views::{StagedViews, ViewSink};
use std::collections::BTreeMap;

/// Every loaded map, keyed by name. Maps are built on load and dropped on
/// unload; nothing reaches a map except through here or a direct borrow.
#[derive(Debug)]
pub struct WorldMaps<S: ViewSink = StagedViews> {
    context: MapContext,
    maps: BTreeMap<String, MapState<S>>,
}

impl<S: ViewSink + Default> WorldMaps<S> {
    pub fn new(context: MapContext) -> Self {
        Self {
            context,
            maps: BTreeMap::new(),
        }
    }

    pub fn load_map(
        &mut self,
        definition: MapDefinition,
        content: &dyn ContentLookup,
        saved: &[SerializableSpawner],
        seed: u64,
    ) -> WorldResult<()> {
        if self.maps.contains_key(&definition.name) {
            return Err(WorldError::MapAlreadyLoaded(definition.name));
        }
        let name = definition.name.clone();
        let map = MapState::load(
            definition,
            content,
            saved,
            self.context.clone(),
            S::default(),
            seed,
        )?;
        self.maps.insert(name, map);
        Ok(())
    }

    /// Loads every map in the index, each with its saved spawner ticks.
    pub fn load_all(&mut self, content: &ContentIndex, seed: u64) -> WorldResult<()> {
        for (offset, definition) in content.maps.values().enumerate() {
            let saved = content.saved_spawners_for(&definition.name);
            self.load_map(definition.clone(), content, saved, seed.wrapping_add(offset as u64))?;
        }
        Ok(())
    }

    pub fn unload_map(&mut self, name: &str) -> WorldResult<MapState<S>> {
        let map = self
            .maps
            .remove(name)
            .ok_or_else(|| WorldError::MapNotLoaded(name.to_string()))?;
        log::info!("map {} unloaded", name);
        Ok(map)
    }

    pub fn get(&self, name: &str) -> Option<&MapState<S>> {
        self.maps.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut MapState<S>> {
        self.maps.get_mut(name)
    }

    pub fn map_names(&self) -> Vec<&str> {
        self.maps.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Moves a player to `(x, y)` on `destination`. A map change resets `z`
    /// to 0. A destination that is not loaded leaves everything untouched.
    pub fn teleport(
        &mut self,
        from: &str,
        player: PlayerId,
        destination: &str,
        x: i32,
        y: i32,
    ) -> WorldResult<()> {
        if !self.maps.contains_key(destination) {
            log::warn!("teleport of player {} to unloaded map {}", player.0, destination);
            return Err(WorldError::MapNotLoaded(destination.to_string()));
        }
        let source = self
            .maps
            .get_mut(from)
            .ok_or_else(|| WorldError::MapNotLoaded(from.to_string()))?;
        let current = source
            .player(player)
            .map(|p| p.position())
            .ok_or_else(|| WorldError::UnknownCharacter(CharacterId::Player(player).to_string()))?;

        if from == destination {
            let target = Position { x, y, z: current.z };
            source.move_npc_or_player(CharacterId::Player(player), target);
            return Ok(());
        }

        let Some(mut moving) = source.remove_player(player) else {
            return Err(WorldError::UnknownCharacter(CharacterId::Player(player).to_string()));
        };
        moving.core.set_position(Position { x, y, z: 0 });
        if let Some(target) = self.maps.get_mut(destination) {
            target.add_player(moving);
        }
        Ok(())
    }

    pub fn teleport_to_respawn_point(&mut self, from: &str, player: PlayerId) -> WorldResult<()> {
        let respawn = self
            .maps
            .get(from)
            .ok_or_else(|| WorldError::MapNotLoaded(from.to_string()))?
            .player(player)
            .map(|p| p.respawn_point.clone())
            .ok_or_else(|| WorldError::UnknownCharacter(CharacterId::Player(player).to_string()))?;
        self.teleport(from, player, &respawn.map, respawn.x, respawn.y)
    }

    pub fn steady_tick(&mut self) {
        for map in self.maps.values_mut() {
            map.steady_tick();
        }
    }

    pub fn npc_tick(&mut self) {
        for map in self.maps.values_mut() {
            map.npc_tick();
        }
    }

    /// Persistable spawner state for every map that has any.
    pub fn serializable_spawners(&self) -> SavedSpawners {
        self.maps
            .iter()
            .map(|(name, map)| (name.clone(), map.get_serializable_spawners()))
            .filter(|(_, spawners)| !spawners.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::character::Player;
    use std::path::Path;

    fn world() -> WorldMaps {
        let content = ContentIndex::default();
        let mut world = WorldMaps::new(MapContext::default());
        for name in ["Tutorial", "Town"] {
            world
                .load_map(MapDefinition::new(name, 64, 64), &content, &[], 1)
                .expect("load");
        }
        world
    }

    fn place(world: &mut WorldMaps, x: i32, y: i32) {
        let mut player = Player::new(PlayerId(1), "hero", "Tutorial", Position { x, y, z: 2 });
        player.respawn_point.map = "Town".to_string();
        player.respawn_point.x = 5;
        player.respawn_point.y = 6;
        world.get_mut("Tutorial").expect("tutorial").add_player(player);
    }

    #[test]
    fn teleport_within_map_keeps_level() {
        let mut world = world();
        place(&mut world, 10, 10);
        world.teleport("Tutorial", PlayerId(1), "Tutorial", 20, 21).expect("teleport");
        let map = world.get("Tutorial").expect("tutorial");
        assert_eq!(map.player(PlayerId(1)).expect("player").position(), Position { x: 20, y: 21, z: 2 });
        assert!(!map.is_there_any_knowledge_for_xy(10, 10));
    }

    #[test]
    fn teleport_across_maps_resets_level() {
        let mut world = world();
        place(&mut world, 10, 10);
        world.teleport("Tutorial", PlayerId(1), "Town", 3, 4).expect("teleport");

        let tutorial = world.get("Tutorial").expect("tutorial");
        assert!(tutorial.player(PlayerId(1)).is_none());
        assert_eq!(tutorial.knowledge().cell_count(), 0);

        let town = world.get("Town").expect("town");
        let player = town.player(PlayerId(1)).expect("player");
        assert_eq!(player.position(), Position { x: 3, y: 4, z: 0 });
        assert_eq!(player.core.map, "Town");
        assert!(town.is_there_any_knowledge_for_xy(3, 4));
    }

    #[test]
    fn teleport_to_unloaded_map_changes_nothing() {
        let mut world = world();
        place(&mut world, 10, 10);
        let before = world.get("Tutorial").expect("tutorial").knowledge().clone();
        let result = world.teleport("Tutorial", PlayerId(1), "Nowhere", 1, 1);
        assert!(matches!(result, Err(WorldError::MapNotLoaded(name)) if name == "Nowhere"));
        let tutorial = world.get("Tutorial").expect("tutorial");
        assert_eq!(tutorial.knowledge(), &before);
        assert_eq!(
            tutorial.player(PlayerId(1)).expect("player").position(),
            Position { x: 10, y: 10, z: 2 }
        );
    }

    #[test]
    fn respawn_point_teleport() {
        let mut world = world();
        place(&mut world, 10, 10);
        world.teleport_to_respawn_point("Tutorial", PlayerId(1)).expect("respawn");
        let town = world.get("Town").expect("town");
        assert_eq!(
            town.player(PlayerId(1)).expect("player").position(),
            Position { x: 5, y: 6, z: 0 }
        );
    }

    #[test]
    fn load_and_unload_bookkeeping() {
        let mut world = world();
        let content = ContentIndex::default();
        let again = world.load_map(MapDefinition::new("Town", 8, 8), &content, &[], 0);
        assert!(matches!(again, Err(WorldError::MapAlreadyLoaded(_))));
        assert_eq!(world.map_names(), vec!["Town", "Tutorial"]);
        assert!(world.unload_map("Town").is_ok());
        assert!(matches!(world.unload_map("Town"), Err(WorldError::MapNotLoaded(_))));
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn asset_world_loads_and_ticks() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("data");
        let content = ContentIndex::load(&root).expect("content");
        let mut world: WorldMaps = WorldMaps::new(MapContext::default());
        world.load_all(&content, 7).expect("maps");
        assert!(world.get("Tutorial").is_some());
        for _ in 0..200 {
            world.steady_tick();
            world.npc_tick();
        }
        let tutorial = world.get("Tutorial").expect("tutorial");
        assert!(tutorial.npc_count() > 0);
    }
}
