use crate::content::maps::MapDefinition;
use crate::content::ContentLookup;
use crate::entities::character::{
    Alignment, Allegiance, CharacterId, CharacterRef, Hostility, Npc, NpcId, Player, PlayerId,
    SpawnerId,
};
use crate::entities::item::{GroundItem, ItemClass, SimpleItem};
use crate::error::{WorldError, WorldResult};
use crate::world::context::MapContext;
use crate::world::doors::{Door, DoorId, DoorTable};
use crate::world::ground::{GroundCell, GroundStore, GroundVision};
use crate::world::knowledge::KnowledgeGrid;
use crate::world::position::Position;
use crate::world::spatial::SpatialIndex;
use crate::world::spawner::{
    SerializableSpawner, SpawnHost, SpawnTemplate, Spawner, SpawnerConfig,
};
use crate::world::views::{NpcSnapshot, PlayerSnapshot, StagedViews, ViewSink};
use std::collections::{BTreeMap, HashMap};

/// Authoritative state for one loaded map: who stands where, who can see
/// which tiles, door and ground state, and the spawners that populate it.
///
/// Every mutation updates the indexes and knowledge grid first and only then
/// restages the views of players whose knowledge covers the touched tile.
#[derive(Debug)]
pub struct MapState<S: ViewSink = StagedViews> {
    definition: MapDefinition,
    context: MapContext,
    players: HashMap<PlayerId, Player>,
    npcs: HashMap<NpcId, Npc>,
    player_index: SpatialIndex<PlayerId>,
    npc_index: SpatialIndex<NpcId>,
    knowledge: KnowledgeGrid,
    doors: DoorTable,
    ground: GroundStore,
    spawners: Vec<Spawner>,
    next_npc_id: u32,
    next_spawner_id: u32,
    seed: u64,
    views: S,
}

impl<S: ViewSink> MapState<S> {
    /// Bare map with doors but no spawners.
    pub fn new(definition: MapDefinition, context: MapContext, views: S) -> Self {
        let doors = DoorTable::new(definition.doors.iter().map(|door| {
            Door::closed(DoorId(door.id), Position::new(door.x, door.y))
        }));
        Self {
            definition,
            context,
            players: HashMap::new(),
            npcs: HashMap::new(),
            player_index: SpatialIndex::new(),
            npc_index: SpatialIndex::new(),
            knowledge: KnowledgeGrid::new(),
            doors,
            ground: GroundStore::new(),
            spawners: Vec::new(),
            next_npc_id: 0,
            next_spawner_id: 0,
            seed: 0,
            views,
        }
    }

    /// Builds the map and its spawners. Placed NPCs go to a default spawner;
    /// every placed spawner is resolved against its template. Saved tick
    /// counters are restored for persistable spawners by anchor.
    pub fn load(
        definition: MapDefinition,
        content: &dyn ContentLookup,
        saved: &[SerializableSpawner],
        context: MapContext,
        views: S,
        seed: u64,
    ) -> WorldResult<Self> {
        let mut map = Self::new(definition, context, views);
        map.seed = seed;

        let placed = map.placed_npc_spawner(content)?;
        let mut zones = Vec::with_capacity(map.definition.spawners.len());
        for index in 0..map.definition.spawners.len() {
            let mut spawner = map.zone_spawner(index, content)?;
            if spawner.can_be_saved() {
                let anchor = spawner.anchor();
                if let Some(restored) = saved.iter().find(|s| s.x == anchor.x && s.y == anchor.y) {
                    spawner.set_current_tick(restored.current_tick);
                }
            }
            zones.push(spawner);
        }

        map.add_spawner(placed);
        for spawner in zones {
            map.add_spawner(spawner);
        }

        log::info!(
            "map {} loaded: {}x{}, doors={}, spawners={}, npcs={}",
            map.definition.name,
            map.definition.width,
            map.definition.height,
            map.doors.len(),
            map.spawners.len(),
            map.npcs.len()
        );
        Ok(map)
    }

    fn placed_npc_spawner(&mut self, content: &dyn ContentLookup) -> WorldResult<Spawner> {
        let mut templates = Vec::with_capacity(self.definition.npcs.len());
        for placement in &self.definition.npcs {
            let Some(tag) = placement.tag.as_deref() else {
                return Err(WorldError::NpcWithoutTag {
                    map: self.definition.name.clone(),
                    name: placement.name.clone(),
                });
            };
            let mut template = content
                .npc_template(tag)
                .cloned()
                .ok_or_else(|| WorldError::MissingNpcTemplate {
                    tag: tag.to_string(),
                    referenced_by: placement.name.clone(),
                })?;
            template.name = placement.name.clone();
            template.sprite = placement.sprite.or(template.sprite);
            template.allegiance.get_or_insert(Allegiance::None);
            template.alignment.get_or_insert(Alignment::Neutral);
            template.hostility.get_or_insert(Hostility::Never);
            template.stationary = true;
            templates.push(SpawnTemplate {
                tag: tag.to_string(),
                template,
                position: Some(Position::new(placement.x, placement.y)),
            });
        }
        let id = self.next_spawner_id();
        let config = SpawnerConfig::placed_npcs(&self.definition.name);
        Ok(Spawner::placed(id, config, templates, self.spawner_seed(id)))
    }

    fn zone_spawner(&mut self, index: usize, content: &dyn ContentLookup) -> WorldResult<Spawner> {
        let placement = self.definition.spawners[index].clone();
        let anchor = Position::new(placement.x, placement.y);
        let Some(tag) = placement.tag.as_deref() else {
            return Err(WorldError::SpawnerWithoutTag {
                map: self.definition.name.clone(),
                position: anchor,
            });
        };
        let base = content
            .spawner_template(tag)
            .cloned()
            .ok_or_else(|| WorldError::MissingSpawnerTemplate(tag.to_string()))?;
        let mut properties = base.merge(placement.properties);
        if let Some(lair) = properties.lair_name.clone() {
            properties.npc_ids = Some(vec![lair]);
        }
        if let Some(resource) = properties.resource_name.clone() {
            properties.npc_ids = Some(vec![resource]);
        }

        let mut templates = Vec::new();
        for npc_tag in properties.npc_ids.iter().flatten() {
            let template = content
                .npc_template(npc_tag)
                .cloned()
                .ok_or_else(|| WorldError::MissingNpcTemplate {
                    tag: npc_tag.clone(),
                    referenced_by: placement.name.clone(),
                })?;
            templates.push(SpawnTemplate {
                tag: npc_tag.clone(),
                template,
                position: None,
            });
        }

        let id = self.next_spawner_id();
        let config = SpawnerConfig::from_properties(placement.name.clone(), anchor, &properties);
        Ok(Spawner::zone(id, config, templates, self.spawner_seed(id)))
    }

    fn spawner_seed(&self, id: SpawnerId) -> u64 {
        self.seed ^ (u64::from(id.0) << 32)
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &MapDefinition {
        &self.definition
    }

    pub fn knowledge_radius(&self) -> i32 {
        self.definition.knowledge_radius
    }

    pub fn context(&self) -> &MapContext {
        &self.context
    }

    /// A fresh player for this map. Its respawn point is the map's own when
    /// the definition sets one, otherwise the starting tile.
    pub fn new_player(&self, id: PlayerId, name: impl Into<String>, position: Position) -> Player {
        let mut player = Player::new(id, name, self.definition.name.clone(), position);
        if let Some(point) = self.definition.respawn_point {
            player.respawn_point.x = point.x;
            player.respawn_point.y = point.y;
        }
        player
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutable access for stat changes; positions only move through
    /// `move_npc_or_player`.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn npc(&self, id: NpcId) -> Option<&Npc> {
        self.npcs.get(&id)
    }

    pub fn npc_mut(&mut self, id: NpcId) -> Option<&mut Npc> {
        self.npcs.get_mut(&id)
    }

    pub fn character(&self, id: CharacterId) -> Option<CharacterRef<'_>> {
        match id {
            CharacterId::Player(id) => self.players.get(&id).map(CharacterRef::Player),
            CharacterId::Npc(id) => self.npcs.get(&id).map(CharacterRef::Npc),
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn npc_count(&self) -> usize {
        self.npcs.len()
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        let mut ids: Vec<_> = self.players.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn player_index(&self) -> &SpatialIndex<PlayerId> {
        &self.player_index
    }

    pub fn npc_index(&self) -> &SpatialIndex<NpcId> {
        &self.npc_index
    }

    pub fn knowledge(&self) -> &KnowledgeGrid {
        &self.knowledge
    }

    pub fn doors(&self) -> &DoorTable {
        &self.doors
    }

    pub fn ground(&self) -> &GroundStore {
        &self.ground
    }

    pub fn views(&self) -> &S {
        &self.views
    }

    pub fn views_mut(&mut self) -> &mut S {
        &mut self.views
    }

    // characters

    pub fn add_player(&mut self, mut player: Player) {
        if self.players.contains_key(&player.id) {
            self.remove_player(player.id);
        }
        let id = player.id;
        let position = player.position();
        player.core.map = self.definition.name.clone();
        self.player_index.insert(id, position.x, position.y);
        self.knowledge
            .grant_square(id, position, self.definition.knowledge_radius);
        self.players.insert(id, player);
        self.trigger_and_send_update(position.x, position.y, None);
    }

    /// Hands the player back; `None` when it was not on this map.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let player = self.players.remove(&id)?;
        let position = player.position();
        self.player_index.remove(id);
        self.knowledge
            .revoke_square(id, position, self.definition.knowledge_radius);
        self.trigger_and_send_update(position.x, position.y, Some(id));
        Some(player)
    }

    pub fn add_npc(&mut self, mut npc: Npc) {
        if self.npcs.contains_key(&npc.id) {
            self.remove_npc(npc.id);
        }
        let id = npc.id;
        let position = npc.position();
        npc.core.map = self.definition.name.clone();
        self.next_npc_id = self.next_npc_id.max(id.0);
        self.npc_index.insert(id, position.x, position.y);
        self.npcs.insert(id, npc);
        self.trigger_and_send_update(position.x, position.y, None);
    }

    pub fn remove_npc(&mut self, id: NpcId) -> Option<Npc> {
        let npc = self.npcs.remove(&id)?;
        let position = npc.position();
        self.npc_index.remove(id);
        self.trigger_and_send_update(position.x, position.y, None);
        Some(npc)
    }

    /// Moves a character and returns where it stood; `None` when it is not on
    /// this map.
    pub fn move_npc_or_player(&mut self, id: CharacterId, destination: Position) -> Option<Position> {
        match id {
            CharacterId::Player(id) => self.move_player(id, destination),
            CharacterId::Npc(id) => self.move_npc(id, destination),
        }
    }

    fn move_player(&mut self, id: PlayerId, destination: Position) -> Option<Position> {
        let player = self.players.get_mut(&id)?;
        let old = player.position();
        player.core.set_position(destination);
        self.player_index.insert(id, destination.x, destination.y);
        self.knowledge
            .shift_square(id, old, destination, self.definition.knowledge_radius);

        self.trigger_and_send_update(old.x, old.y, Some(id));
        self.trigger_and_send_update(destination.x, destination.y, Some(id));
        self.trigger_full_update_for_player(id);
        Some(old)
    }

    fn move_npc(&mut self, id: NpcId, destination: Position) -> Option<Position> {
        let npc = self.npcs.get_mut(&id)?;
        let old = npc.position();
        npc.core.set_position(destination);
        self.npc_index.insert(id, destination.x, destination.y);

        self.trigger_and_send_update(old.x, old.y, None);
        self.trigger_and_send_update(destination.x, destination.y, None);
        Some(old)
    }

    /// Whether any NPC instantiated from `tag` is on the map.
    pub fn is_any_npc_with_id(&self, tag: &str) -> bool {
        self.npcs.values().any(|npc| npc.npc_id == tag)
    }

    /// The lowest-id NPC instantiated from `tag`.
    pub fn find_npc_with_id(&self, tag: &str) -> Option<&Npc> {
        self.npcs
            .values()
            .filter(|npc| npc.npc_id == tag)
            .min_by_key(|npc| npc.id)
    }

    // range queries

    pub fn get_all_players_in_range(&self, center: Position, radius: i32) -> Vec<&Player> {
        self.player_index
            .query_radius(center.x, center.y, radius)
            .into_iter()
            .filter_map(|id| self.players.get(&id))
            .collect()
    }

    /// Living players around `observer` that it can see, minus `except`.
    pub fn get_players_in_range(
        &self,
        observer: CharacterId,
        radius: i32,
        except: &[CharacterId],
        use_sight: bool,
    ) -> Vec<&Player> {
        let Some(observer) = self.character(observer) else {
            return Vec::new();
        };
        let targeting = &self.context.targeting;
        self.get_all_players_in_range(observer.position(), radius)
            .into_iter()
            .filter(|player| !player.core.is_dead())
            .filter(|player| !except.contains(&CharacterId::Player(player.id)))
            .filter(|player| {
                targeting.is_visible_to(observer, CharacterRef::Player(*player), use_sight)
            })
            .collect()
    }

    /// Players then NPCs in the square, dead or alive.
    pub fn get_all_in_range_raw(
        &self,
        center: Position,
        radius: i32,
        except: &[CharacterId],
    ) -> Vec<CharacterRef<'_>> {
        let players = self
            .player_index
            .query_radius(center.x, center.y, radius)
            .into_iter()
            .filter_map(|id| self.players.get(&id))
            .map(CharacterRef::Player);
        let npcs = self
            .npc_index
            .query_radius(center.x, center.y, radius)
            .into_iter()
            .filter_map(|id| self.npcs.get(&id))
            .map(CharacterRef::Npc);
        players
            .chain(npcs)
            .filter(|character| !except.contains(&character.id()))
            .collect()
    }

    pub fn get_all_in_range(
        &self,
        observer: CharacterId,
        radius: i32,
        except: &[CharacterId],
        use_sight: bool,
    ) -> Vec<CharacterRef<'_>> {
        let Some(observer) = self.character(observer) else {
            return Vec::new();
        };
        let targeting = &self.context.targeting;
        self.get_all_in_range_raw(observer.position(), radius, except)
            .into_iter()
            .filter(|character| !character.is_dead())
            .filter(|character| targeting.is_visible_to(observer, *character, use_sight))
            .collect()
    }

    pub fn get_all_hostiles_in_range(&self, observer: CharacterId, radius: i32) -> Vec<CharacterRef<'_>> {
        self.filter_by_hostility(observer, radius, true)
    }

    pub fn get_all_allies_in_range(&self, observer: CharacterId, radius: i32) -> Vec<CharacterRef<'_>> {
        self.filter_by_hostility(observer, radius, false)
    }

    fn filter_by_hostility(&self, observer: CharacterId, radius: i32, hostile: bool) -> Vec<CharacterRef<'_>> {
        let Some(actor) = self.character(observer) else {
            return Vec::new();
        };
        let targeting = &self.context.targeting;
        self.get_all_in_range(observer, radius, &[], true)
            .into_iter()
            .filter(|target| targeting.is_hostile_towards(actor, *target) == hostile)
            .collect()
    }

    /// What `npc` may attack: never itself, never characters that never fight.
    pub fn get_possible_targets_for(&self, npc: NpcId, radius: i32) -> Vec<CharacterRef<'_>> {
        let me = CharacterId::Npc(npc);
        let Some(actor) = self.character(me) else {
            return Vec::new();
        };
        let targeting = &self.context.targeting;
        self.get_all_in_range(me, radius, &[], true)
            .into_iter()
            .filter(|target| target.id() != me)
            .filter(|target| target.hostility() != Some(Hostility::Never))
            .filter(|target| targeting.is_hostile_towards(actor, *target))
            .collect()
    }

    // knowledge

    pub fn get_player_knowledge_for_xy(&self, x: i32, y: i32) -> Vec<PlayerId> {
        self.knowledge.players_with_knowledge_of(x, y)
    }

    pub fn get_player_objects_with_knowledge_for_xy(&self, x: i32, y: i32) -> Vec<&Player> {
        self.knowledge
            .players_with_knowledge_of(x, y)
            .into_iter()
            .filter_map(|id| self.players.get(&id))
            .collect()
    }

    pub fn is_there_any_knowledge_for_xy(&self, x: i32, y: i32) -> bool {
        self.knowledge.cell_has_knowledge(x, y)
    }

    // doors

    pub fn is_door_open(&self, id: DoorId) -> bool {
        self.doors.is_open(id)
    }

    pub fn open_door(&mut self, id: DoorId) -> WorldResult<()> {
        self.set_door_state(id, true)
    }

    pub fn close_door(&mut self, id: DoorId) -> WorldResult<()> {
        self.set_door_state(id, false)
    }

    /// Rebroadcasts the door tile even when the state is unchanged, so a
    /// repeated toggle doubles as a resend for clients that missed one.
    pub fn set_door_state(&mut self, id: DoorId, open: bool) -> WorldResult<()> {
        let position = self
            .doors
            .set_state(id, open)
            .ok_or_else(|| WorldError::UnknownDoor {
                map: self.definition.name.clone(),
                id,
            })?;
        self.trigger_and_send_update(position.x, position.y, None);
        Ok(())
    }

    // ground

    pub fn add_item_to_ground(&mut self, x: i32, y: i32, class: ItemClass, item: SimpleItem, count: u32) {
        self.ground.add_item(x, y, class, item, count);
        self.trigger_ground_update_in_radius(x, y);
    }

    pub fn add_items_to_ground(&mut self, x: i32, y: i32, items: impl IntoIterator<Item = (ItemClass, SimpleItem)>) {
        for (class, item) in items {
            self.ground.add_item(x, y, class, item, 1);
        }
        self.trigger_ground_update_in_radius(x, y);
    }

    pub fn get_entire_ground(&self, x: i32, y: i32) -> GroundCell {
        self.ground.entire_ground(x, y)
    }

    pub fn get_items_from_ground(
        &self,
        x: i32,
        y: i32,
        class: &ItemClass,
        uuid: Option<&str>,
        count: usize,
    ) -> Vec<GroundItem> {
        self.ground.items(x, y, class, uuid, count)
    }

    /// Returns how many copies were actually removed.
    pub fn remove_item_from_ground(&mut self, x: i32, y: i32, class: &ItemClass, uuid: &str, count: u32) -> u32 {
        let removed = self.ground.remove_item(x, y, class, uuid, count);
        self.trigger_ground_update_in_radius(x, y);
        removed
    }

    pub fn get_ground_vision(&self, x: i32, y: i32, radius: i32) -> GroundVision {
        self.ground.vision(Position::new(x, y), radius)
    }

    // view staging

    pub fn trigger_player_update_in_radius(&mut self, x: i32, y: i32) {
        for player in self.knowledge.players_with_knowledge_of(x, y) {
            self.stage_player_view(player);
        }
    }

    pub fn trigger_npc_update_in_radius(&mut self, x: i32, y: i32) {
        for player in self.knowledge.players_with_knowledge_of(x, y) {
            self.stage_npc_view(player);
        }
    }

    pub fn trigger_ground_update_in_radius(&mut self, x: i32, y: i32) {
        for player in self.knowledge.players_with_knowledge_of(x, y) {
            self.stage_ground_view(player);
        }
    }

    /// Restages every player whose knowledge covers `(x, y)`, except `exclude`.
    pub fn trigger_and_send_update(&mut self, x: i32, y: i32, exclude: Option<PlayerId>) {
        for player in self.knowledge.players_with_knowledge_of(x, y) {
            if Some(player) == exclude {
                continue;
            }
            self.trigger_full_update_for_player(player);
        }
    }

    pub fn trigger_full_update_for_player(&mut self, player: PlayerId) {
        if !self.players.contains_key(&player) {
            return;
        }
        self.stage_player_view(player);
        self.stage_npc_view(player);
        self.stage_ground_view(player);
        let doors = self.doors.states();
        self.views.stage_doors(player, doors);
        self.views.queue_player_patch(player);
    }

    fn stage_player_view(&mut self, player: PlayerId) {
        let Some(center) = self.players.get(&player).map(Player::position) else {
            return;
        };
        let nearby: BTreeMap<PlayerId, PlayerSnapshot> = self
            .get_all_players_in_range(center, self.definition.knowledge_radius)
            .into_iter()
            .filter(|other| other.id != player)
            .map(|other| (other.id, PlayerSnapshot::from(other)))
            .collect();
        self.views.stage_players(player, nearby);
    }

    fn stage_npc_view(&mut self, player: PlayerId) {
        let Some(center) = self.players.get(&player).map(Player::position) else {
            return;
        };
        let nearby: BTreeMap<NpcId, NpcSnapshot> = self
            .npc_index
            .query_radius(center.x, center.y, self.definition.knowledge_radius)
            .into_iter()
            .filter_map(|id| self.npcs.get(&id))
            .map(|npc| (npc.id, NpcSnapshot::from(npc)))
            .collect();
        self.views.stage_npcs(player, nearby);
    }

    fn stage_ground_view(&mut self, player: PlayerId) {
        let Some(center) = self.players.get(&player).map(Player::position) else {
            return;
        };
        let ground = self.ground.vision(center, self.definition.knowledge_radius);
        self.views.stage_ground(player, ground);
    }

    // spawners

    pub fn next_spawner_id(&mut self) -> SpawnerId {
        self.next_spawner_id += 1;
        SpawnerId(self.next_spawner_id)
    }

    /// Runs the spawner's initial spawn and starts ticking it.
    pub fn add_spawner(&mut self, mut spawner: Spawner) -> SpawnerId {
        spawner.initialize(self);
        let id = spawner.id();
        self.spawners.push(spawner);
        id
    }

    /// Stops ticking the spawner; NPCs it already placed stay on the map.
    pub fn remove_spawner(&mut self, id: SpawnerId) -> Option<Spawner> {
        let index = self.spawners.iter().position(|spawner| spawner.id() == id)?;
        Some(self.spawners.remove(index))
    }

    pub fn spawners(&self) -> &[Spawner] {
        &self.spawners
    }

    pub fn get_serializable_spawners(&self) -> Vec<SerializableSpawner> {
        self.spawners
            .iter()
            .filter(|spawner| spawner.can_be_saved())
            .map(Spawner::to_serializable)
            .collect()
    }

    pub fn steady_tick(&mut self) {
        let mut spawners = std::mem::take(&mut self.spawners);
        for spawner in &mut spawners {
            spawner.steady_tick(self);
        }
        spawners.append(&mut self.spawners);
        self.spawners = spawners;
    }

    pub fn npc_tick(&mut self) {
        let mut spawners = std::mem::take(&mut self.spawners);
        for spawner in &mut spawners {
            spawner.npc_tick(self);
        }
        spawners.append(&mut self.spawners);
        self.spawners = spawners;
    }
}

impl<S: ViewSink> SpawnHost for MapState<S> {
    fn map_name(&self) -> &str {
        &self.definition.name
    }

    fn next_npc_id(&mut self) -> NpcId {
        self.next_npc_id += 1;
        NpcId(self.next_npc_id)
    }

    fn npc(&self, id: NpcId) -> Option<&Npc> {
        self.npcs.get(&id)
    }

    fn spawn_npc(&mut self, npc: Npc) {
        self.add_npc(npc);
    }

    fn despawn_npc(&mut self, id: NpcId) -> Option<Npc> {
        self.remove_npc(id)
    }

    fn step_npc(&mut self, id: NpcId, destination: Position) -> bool {
        self.move_npc(id, destination).is_some()
    }

    fn has_knowledge_at(&self, x: i32, y: i32) -> bool {
        self.knowledge.cell_has_knowledge(x, y)
    }

    fn can_enter(&self, position: Position) -> bool {
        self.definition.contains(position.x, position.y) && !self.doors.blocks_movement_at(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::maps::{DoorPlacement, NpcPlacement, SpawnerPlacement, TilePoint};
    use crate::content::templates::{NpcTemplate, SpawnerProperties};
    use crate::world::context::Targeting;
    use crate::world::spawner::SlotState;
    use std::sync::Arc;

    #[derive(Default)]
    struct TestContent {
        npcs: BTreeMap<String, NpcTemplate>,
        spawners: BTreeMap<String, SpawnerProperties>,
    }

    impl ContentLookup for TestContent {
        fn npc_template(&self, tag: &str) -> Option<&NpcTemplate> {
            self.npcs.get(tag)
        }

        fn spawner_template(&self, tag: &str) -> Option<&SpawnerProperties> {
            self.spawners.get(tag)
        }
    }

    fn test_definition() -> MapDefinition {
        let mut definition = MapDefinition::new("Tutorial", 64, 64);
        definition.doors.push(DoorPlacement { id: 1, x: 20, y: 20 });
        definition
    }

    fn test_map() -> MapState {
        MapState::new(test_definition(), MapContext::default(), StagedViews::new())
    }

    fn player(id: u32, x: i32, y: i32) -> Player {
        Player::new(PlayerId(id), format!("p{}", id), "Tutorial", Position::new(x, y))
    }

    fn npc(id: u32, x: i32, y: i32, hostility: Hostility) -> Npc {
        let position = Position::new(x, y);
        let mut core = crate::entities::character::CharacterCore::new("deer", "Tutorial", position);
        core.allegiance = Allegiance::Wilderness;
        Npc {
            id: NpcId(id),
            core,
            npc_id: "Tutorial Deer".to_string(),
            sprite: 0,
            spawner: None,
            hostility,
            elite: false,
            stationary: false,
            anchor: position,
        }
    }

    fn full_updates(map: &MapState, id: u32) -> u64 {
        map.views().get(PlayerId(id)).map_or(0, |view| view.full_updates)
    }

    fn deer_content() -> TestContent {
        let mut content = TestContent::default();
        content.npcs.insert(
            "Tutorial Deer".to_string(),
            NpcTemplate {
                name: "deer".to_string(),
                hp: 20,
                level: 1,
                ..NpcTemplate::default()
            },
        );
        content.spawners.insert(
            "Tutorial Deer Spawner".to_string(),
            SpawnerProperties {
                respawn_rate: Some(5),
                max_creatures: Some(2),
                npc_ids: Some(vec!["Tutorial Deer".to_string()]),
                ..SpawnerProperties::default()
            },
        );
        content
    }

    #[test]
    fn tutorial_scenario() {
        let mut map = test_map();
        map.add_player(player(1, 14, 14));
        map.add_npc(npc(1, 15, 15, Hostility::Always));

        let in_range: Vec<PlayerId> = map
            .get_all_players_in_range(Position::new(15, 15), 4)
            .iter()
            .map(|player| player.id)
            .collect();
        assert_eq!(in_range, vec![PlayerId(1)]);

        map.move_npc_or_player(CharacterId::Player(PlayerId(1)), Position::new(30, 30));
        assert!(map.get_player_objects_with_knowledge_for_xy(15, 15).is_empty());
        assert!(map.is_there_any_knowledge_for_xy(30, 34));
    }

    #[test]
    fn new_players_respawn_at_the_map_point() {
        let mut definition = test_definition();
        definition.respawn_point = Some(TilePoint { x: 3, y: 4 });
        let map: MapState = MapState::new(definition, MapContext::default(), StagedViews::new());
        let player = map.new_player(PlayerId(9), "hero", Position::new(20, 21));
        assert_eq!(player.position(), Position::new(20, 21));
        assert_eq!(player.respawn_point.map, map.name());
        assert_eq!((player.respawn_point.x, player.respawn_point.y), (3, 4));

        let bare = test_map().new_player(PlayerId(9), "hero", Position::new(20, 21));
        assert_eq!((bare.respawn_point.x, bare.respawn_point.y), (20, 21));
    }

    #[test]
    fn add_remove_round_trip_restores_indexes() {
        let mut map = test_map();
        map.add_player(player(1, 5, 5));
        map.add_npc(npc(1, 8, 8, Hostility::Always));
        let players = map.player_index().clone();
        let npcs = map.npc_index().clone();
        let knowledge = map.knowledge().clone();

        map.add_player(player(2, 6, 7));
        map.add_npc(npc(2, 9, 9, Hostility::Never));
        let removed = map.remove_player(PlayerId(2)).expect("player 2");
        assert_eq!(removed.id, PlayerId(2));
        assert!(map.remove_npc(NpcId(2)).is_some());

        assert_eq!(map.player_index(), &players);
        assert_eq!(map.npc_index(), &npcs);
        assert_eq!(map.knowledge(), &knowledge);
        assert!(map.remove_player(PlayerId(2)).is_none());
        assert!(map.remove_npc(NpcId(2)).is_none());
    }

    #[test]
    fn added_player_sees_itself_staged() {
        let mut map = test_map();
        map.add_player(player(1, 10, 10));
        assert_eq!(full_updates(&map, 1), 1);
        map.add_player(player(2, 12, 10));
        assert_eq!(full_updates(&map, 1), 2);
        let view = map.views().get(PlayerId(1)).expect("view");
        assert!(view.players.contains_key(&PlayerId(2)));
        assert!(!view.players.contains_key(&PlayerId(1)));
    }

    #[test]
    fn move_resyncs_old_and_new_holders_and_mover() {
        let mut map = test_map();
        map.add_player(player(1, 10, 10));
        map.add_player(player(2, 7, 10));
        map.add_player(player(3, 17, 10));
        let before = (full_updates(&map, 1), full_updates(&map, 2), full_updates(&map, 3));

        let old = map.move_npc_or_player(CharacterId::Player(PlayerId(1)), Position::new(14, 10));
        assert_eq!(old, Some(Position::new(10, 10)));
        assert_eq!(map.player_index().position_of(PlayerId(1)), Some((14, 10)));
        assert_eq!(full_updates(&map, 1), before.0 + 1);
        assert_eq!(full_updates(&map, 2), before.1 + 1);
        assert_eq!(full_updates(&map, 3), before.2 + 1);
        assert_eq!(
            map.move_npc_or_player(CharacterId::Player(PlayerId(9)), Position::new(1, 1)),
            None
        );
    }

    #[test]
    fn npc_move_updates_index_and_watchers() {
        let mut map = test_map();
        map.add_player(player(1, 10, 10));
        map.add_npc(npc(1, 11, 11, Hostility::Always));
        let before = full_updates(&map, 1);
        map.move_npc_or_player(CharacterId::Npc(NpcId(1)), Position::new(12, 12));
        assert_eq!(map.npc_index().position_of(NpcId(1)), Some((12, 12)));
        assert_eq!(full_updates(&map, 1), before + 2);
        let view = map.views().get(PlayerId(1)).expect("view");
        assert_eq!(view.npcs[&NpcId(1)].position, Position::new(12, 12));
    }

    #[test]
    fn door_rebroadcasts_every_call() {
        let mut map = test_map();
        map.add_player(player(1, 18, 18));
        let before = full_updates(&map, 1);
        map.open_door(DoorId(1)).expect("door");
        map.open_door(DoorId(1)).expect("door");
        assert!(map.is_door_open(DoorId(1)));
        assert_eq!(full_updates(&map, 1), before + 2);
        let view = map.views().get(PlayerId(1)).expect("view");
        assert_eq!(view.open_doors.get(&DoorId(1)), Some(&true));

        map.close_door(DoorId(1)).expect("door");
        assert!(!map.is_door_open(DoorId(1)));
        assert!(matches!(
            map.open_door(DoorId(99)),
            Err(WorldError::UnknownDoor { .. })
        ));
    }

    #[test]
    fn players_in_range_skip_dead_and_excepted() {
        let mut map = test_map();
        map.add_player(player(1, 10, 10));
        map.add_player(player(2, 11, 10));
        map.add_player(player(3, 12, 10));
        map.add_player(player(4, 13, 10));
        map.player_mut(PlayerId(3)).expect("p3").core.hp.set(0);

        let ids: Vec<PlayerId> = map
            .get_players_in_range(
                CharacterId::Player(PlayerId(1)),
                5,
                &[CharacterId::Player(PlayerId(4))],
                true,
            )
            .iter()
            .map(|player| player.id)
            .collect();
        assert_eq!(ids, vec![PlayerId(1), PlayerId(2)]);
        assert!(map
            .get_players_in_range(CharacterId::Npc(NpcId(77)), 5, &[], true)
            .is_empty());
    }

    struct BlindTargeting;

    impl Targeting for BlindTargeting {
        fn is_hostile_towards(&self, _: CharacterRef<'_>, _: CharacterRef<'_>) -> bool {
            true
        }

        fn is_visible_to(&self, observer: CharacterRef<'_>, target: CharacterRef<'_>, _: bool) -> bool {
            observer.id() == target.id()
        }
    }

    #[test]
    fn visibility_filter_comes_from_context() {
        let context = MapContext::new(Arc::new(BlindTargeting));
        let mut map: MapState = MapState::new(test_definition(), context, StagedViews::new());
        map.add_player(player(1, 10, 10));
        map.add_player(player(2, 11, 10));
        let ids: Vec<PlayerId> = map
            .get_players_in_range(CharacterId::Player(PlayerId(1)), 5, &[], true)
            .iter()
            .map(|player| player.id)
            .collect();
        assert_eq!(ids, vec![PlayerId(1)]);
        assert_eq!(map.get_all_in_range_raw(Position::new(10, 10), 5, &[]).len(), 2);
    }

    #[test]
    fn possible_targets_skip_self_and_peaceful() {
        let mut map = test_map();
        map.add_npc(npc(1, 10, 10, Hostility::Always));
        map.add_npc(npc(2, 11, 10, Hostility::Never));
        map.add_npc(npc(3, 12, 10, Hostility::OnHit));
        map.add_player(player(1, 10, 11));

        let targets: Vec<CharacterId> = map
            .get_possible_targets_for(NpcId(1), 4)
            .iter()
            .map(|target| target.id())
            .collect();
        assert_eq!(
            targets,
            vec![CharacterId::Player(PlayerId(1)), CharacterId::Npc(NpcId(3))]
        );
    }

    #[test]
    fn hostiles_and_allies_split_the_neighbourhood() {
        let mut map = test_map();
        map.add_player(player(1, 10, 10));
        map.add_player(player(2, 11, 10));
        map.add_npc(npc(1, 12, 10, Hostility::Always));

        let hostiles: Vec<CharacterId> = map
            .get_all_hostiles_in_range(CharacterId::Player(PlayerId(1)), 4)
            .iter()
            .map(|c| c.id())
            .collect();
        let allies: Vec<CharacterId> = map
            .get_all_allies_in_range(CharacterId::Player(PlayerId(1)), 4)
            .iter()
            .map(|c| c.id())
            .collect();
        assert_eq!(hostiles, vec![CharacterId::Npc(NpcId(1))]);
        assert_eq!(
            allies,
            vec![CharacterId::Player(PlayerId(1)), CharacterId::Player(PlayerId(2))]
        );
    }

    #[test]
    fn ground_mutations_only_restage_ground() {
        let mut map = test_map();
        map.add_player(player(1, 10, 10));
        let before = map.views().get(PlayerId(1)).cloned().expect("view");
        let class = ItemClass::new("Coin");
        map.add_item_to_ground(11, 11, class.clone(), SimpleItem::new("gold", "Gold Coin"), 5);

        let view = map.views().get(PlayerId(1)).expect("view");
        assert_eq!(view.ground_updates, before.ground_updates + 1);
        assert_eq!(view.player_updates, before.player_updates);
        assert_eq!(view.full_updates, before.full_updates);
        assert!(view.ground.contains_key(&(11, 11)));

        assert_eq!(map.remove_item_from_ground(11, 11, &class, "gold", 9), 5);
        assert!(map.get_entire_ground(11, 11).is_empty());
        assert!(map.get_ground_vision(10, 10, 4).is_empty());
    }

    #[test]
    fn add_items_stacks_by_uuid() {
        let mut map = test_map();
        let class = ItemClass::new("Food");
        map.add_items_to_ground(
            3,
            3,
            vec![
                (class.clone(), SimpleItem::new("apple-1", "Apple")),
                (class.clone(), SimpleItem::new("apple-1", "Apple")),
                (class.clone(), SimpleItem::new("apple-2", "Apple")),
            ],
        );
        let items = map.get_items_from_ground(3, 3, &class, None, 10);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].count, 2);
        let one = map.get_items_from_ground(3, 3, &class, Some("apple-2"), 10);
        assert_eq!(one.len(), 1);
    }

    #[test]
    fn ticks_without_spawners_are_noops() {
        let mut map = test_map();
        map.steady_tick();
        map.npc_tick();
        assert_eq!(map.npc_count(), 0);
        assert!(map.get_serializable_spawners().is_empty());
    }

    #[test]
    fn load_places_npcs_and_zone_spawners() {
        let content = deer_content();
        let mut definition = test_definition();
        definition.npcs.push(NpcPlacement {
            name: "Guide".to_string(),
            x: 2,
            y: 2,
            tag: Some("Tutorial Deer".to_string()),
            sprite: Some(7),
        });
        definition.spawners.push(SpawnerPlacement {
            name: "Deer Meadow".to_string(),
            x: 40,
            y: 40,
            tag: Some("Tutorial Deer Spawner".to_string()),
            properties: SpawnerProperties {
                should_serialize: Some(true),
                max_creatures: Some(1),
                ..SpawnerProperties::default()
            },
        });
        let saved = [SerializableSpawner { x: 40, y: 40, current_tick: 4 }];
        let mut map: MapState = MapState::load(
            definition,
            &content,
            &saved,
            MapContext::default(),
            StagedViews::new(),
            3,
        )
        .expect("map load");

        assert!(map.is_any_npc_with_id("Tutorial Deer"));
        assert!(!map.is_any_npc_with_id("Tutorial Wolf"));
        let guide = map.find_npc_with_id("Tutorial Deer").expect("guide");
        assert_eq!(guide.core.name, "Guide");
        assert_eq!(guide.hostility, Hostility::Never);
        assert_eq!(guide.sprite, 7);
        assert_eq!(map.spawners().len(), 2);
        assert_eq!(map.get_serializable_spawners()[0].current_tick, 4);

        map.steady_tick();
        assert_eq!(map.spawners()[1].slot_states()[0], SlotState::Alive);
        assert_eq!(map.npc_count(), 2);
        assert_eq!(
            map.get_serializable_spawners(),
            vec![SerializableSpawner { x: 40, y: 40, current_tick: 5 }]
        );
    }

    #[test]
    fn load_rejects_unknown_templates() {
        let content = deer_content();
        let mut definition = test_definition();
        definition.spawners.push(SpawnerPlacement {
            name: "Nowhere".to_string(),
            x: 1,
            y: 1,
            tag: Some("Missing Spawner".to_string()),
            properties: SpawnerProperties::default(),
        });
        let result: WorldResult<MapState> = MapState::load(
            definition,
            &content,
            &[],
            MapContext::default(),
            StagedViews::new(),
            0,
        );
        assert!(matches!(result, Err(WorldError::MissingSpawnerTemplate(tag)) if tag == "Missing Spawner"));

        let mut definition = test_definition();
        definition.npcs.push(NpcPlacement {
            name: "Ghost".to_string(),
            x: 1,
            y: 1,
            tag: Some("Nobody".to_string()),
            sprite: None,
        });
        let result: WorldResult<MapState> = MapState::load(
            definition,
            &content,
            &[],
            MapContext::default(),
            StagedViews::new(),
            0,
        );
        assert!(matches!(result, Err(WorldError::MissingNpcTemplate { .. })));

        let mut definition = test_definition();
        definition.spawners.push(SpawnerPlacement {
            name: "Untagged".to_string(),
            x: 1,
            y: 1,
            tag: None,
            properties: SpawnerProperties::default(),
        });
        let result: WorldResult<MapState> = MapState::load(
            definition,
            &content,
            &[],
            MapContext::default(),
            StagedViews::new(),
            0,
        );
        assert!(matches!(result, Err(WorldError::SpawnerWithoutTag { .. })));
    }

    #[test]
    fn watched_spawn_point_defers_until_player_leaves() {
        let mut content = deer_content();
        if let Some(spawner) = content.spawners.get_mut("Tutorial Deer Spawner") {
            spawner.respawn_rate = Some(1);
            spawner.max_creatures = Some(1);
        }
        let mut definition = test_definition();
        definition.spawners.push(SpawnerPlacement {
            name: "Deer Meadow".to_string(),
            x: 40,
            y: 40,
            tag: Some("Tutorial Deer Spawner".to_string()),
            properties: SpawnerProperties::default(),
        });
        let mut map: MapState = MapState::load(
            definition,
            &content,
            &[],
            MapContext::default(),
            StagedViews::new(),
            0,
        )
        .expect("map load");
        map.add_player(player(1, 41, 41));
        map.steady_tick();
        map.steady_tick();
        assert_eq!(map.npc_count(), 0);

        map.remove_player(PlayerId(1));
        map.steady_tick();
        assert_eq!(map.npc_count(), 1);
    }
}
