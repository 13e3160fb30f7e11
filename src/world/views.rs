use crate::entities::character::{
    Alignment, Allegiance, BoundedValue, Hostility, Npc, NpcId, Player, PlayerId,
};
use crate::world::doors::DoorId;
use crate::world::ground::GroundVision;
use crate::world::position::{Direction, Position};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Public projection of a player as other players see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub map: String,
    pub position: Position,
    pub direction: Direction,
    pub hp: BoundedValue,
    pub mp: BoundedValue,
    pub level: u32,
    pub allegiance: Allegiance,
    pub alignment: Alignment,
    pub party_name: Option<String>,
    pub effects: BTreeSet<String>,
}

impl From<&Player> for PlayerSnapshot {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.core.name.clone(),
            map: player.core.map.clone(),
            position: player.position(),
            direction: player.core.direction,
            hp: player.core.hp,
            mp: player.core.mp,
            level: player.core.level,
            allegiance: player.core.allegiance,
            alignment: player.core.alignment,
            party_name: player.party_name.clone(),
            effects: player.core.effects.clone(),
        }
    }
}

/// Public projection of an NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NpcSnapshot {
    pub id: NpcId,
    pub npc_id: String,
    pub name: String,
    pub sprite: i32,
    pub map: String,
    pub position: Position,
    pub direction: Direction,
    pub hp: BoundedValue,
    pub mp: BoundedValue,
    pub level: u32,
    pub allegiance: Allegiance,
    pub alignment: Alignment,
    pub hostility: Hostility,
    pub effects: BTreeSet<String>,
}

impl From<&Npc> for NpcSnapshot {
    fn from(npc: &Npc) -> Self {
        Self {
            id: npc.id,
            npc_id: npc.npc_id.clone(),
            name: npc.core.name.clone(),
            sprite: npc.sprite,
            map: npc.core.map.clone(),
            position: npc.position(),
            direction: npc.core.direction,
            hp: npc.core.hp,
            mp: npc.core.mp,
            level: npc.core.level,
            allegiance: npc.core.allegiance,
            alignment: npc.core.alignment,
            hostility: npc.hostility,
            effects: npc.core.effects.clone(),
        }
    }
}

/// Everything staged for one player since the transmission layer last
/// consumed it. Re-staging a section overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OutgoingView {
    pub players: BTreeMap<PlayerId, PlayerSnapshot>,
    pub npcs: BTreeMap<NpcId, NpcSnapshot>,
    pub ground: GroundVision,
    pub open_doors: BTreeMap<DoorId, bool>,
    pub patch_queued: bool,
    pub full_updates: u64,
    pub player_updates: u64,
    pub npc_updates: u64,
    pub ground_updates: u64,
}

/// Where a map stages per-player view state. Serialising and shipping the
/// staged state is the consumer's job.
pub trait ViewSink {
    fn view_mut(&mut self, player: PlayerId) -> &mut OutgoingView;

    fn stage_players(&mut self, player: PlayerId, players: BTreeMap<PlayerId, PlayerSnapshot>) {
        let view = self.view_mut(player);
        view.players = players;
        view.player_updates += 1;
    }

    fn stage_npcs(&mut self, player: PlayerId, npcs: BTreeMap<NpcId, NpcSnapshot>) {
        let view = self.view_mut(player);
        view.npcs = npcs;
        view.npc_updates += 1;
    }

    fn stage_ground(&mut self, player: PlayerId, ground: GroundVision) {
        let view = self.view_mut(player);
        view.ground = ground;
        view.ground_updates += 1;
    }

    fn stage_doors(&mut self, player: PlayerId, open_doors: BTreeMap<DoorId, bool>) {
        self.view_mut(player).open_doors = open_doors;
    }

    fn queue_player_patch(&mut self, player: PlayerId) {
        let view = self.view_mut(player);
        view.patch_queued = true;
        view.full_updates += 1;
    }
}

/// In-memory sink; the transmission step drains it once per tick.
#[derive(Debug, Clone, Default)]
pub struct StagedViews {
    views: HashMap<PlayerId, OutgoingView>,
}

impl StagedViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, player: PlayerId) -> Option<&OutgoingView> {
        self.views.get(&player)
    }

    pub fn take(&mut self, player: PlayerId) -> Option<OutgoingView> {
        self.views.remove(&player)
    }

    pub fn drain(&mut self) -> Vec<(PlayerId, OutgoingView)> {
        let mut drained: Vec<_> = self.views.drain().collect();
        drained.sort_by_key(|(player, _)| *player);
        drained
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

impl ViewSink for StagedViews {
    fn view_mut(&mut self, player: PlayerId) -> &mut OutgoingView {
        self.views.entry(player).or_default()
    }
}
