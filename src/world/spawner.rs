use crate::content::templates::{NpcTemplate, SpawnerProperties};
use crate::entities::character::{
    BoundedValue, CharacterCore, Hostility, Npc, NpcId, SpawnerId,
};
use crate::telemetry::logging::SPAWN_TARGET;
use crate::world::position::{Position, ALL_DIRECTIONS};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

pub const DEFAULT_RESPAWN_RATE: u64 = 120;
pub const DEFAULT_MAX_CREATURES: u32 = 5;
pub const DEFAULT_RANDOM_WALK_RADIUS: i32 = 10;
pub const DEFAULT_LEASH_RADIUS: i32 = 20;
pub const DEFAULT_NPC_RESPAWN_RATE: u64 = 300;
pub const NPC_MOVE_INTERVAL_TICKS: u64 = 5;
const NPC_MOVE_ATTEMPTS: usize = 4;

/// What a spawner may do to the map that owns it.
pub trait SpawnHost {
    fn map_name(&self) -> &str;

    fn next_npc_id(&mut self) -> NpcId;

    fn npc(&self, id: NpcId) -> Option<&Npc>;

    fn spawn_npc(&mut self, npc: Npc);

    fn despawn_npc(&mut self, id: NpcId) -> Option<Npc>;

    /// Relocates an NPC; false when it is not on the map.
    fn step_npc(&mut self, id: NpcId, destination: Position) -> bool;

    fn has_knowledge_at(&self, x: i32, y: i32) -> bool;

    fn can_enter(&self, position: Position) -> bool;
}

/// Spawner position and tick counter as kept across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableSpawner {
    pub x: i32,
    pub y: i32,
    pub current_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnerConfig {
    pub name: String,
    pub anchor: Position,
    pub respawn_rate: u64,
    /// Slots filled at load when spawning immediately; 0 means every slot.
    pub initial_spawn: u32,
    pub max_creatures: u32,
    pub spawn_radius: i32,
    pub random_walk_radius: i32,
    pub leash_radius: i32,
    pub require_dead_to_respawn: bool,
    pub remove_dead_npcs: bool,
    pub do_initial_spawn_immediately: bool,
    pub respect_knowledge: bool,
    pub elite_tick_cap: i32,
    pub should_serialize: bool,
}

impl SpawnerConfig {
    /// Resolves merged properties against the zone defaults.
    pub fn from_properties(name: impl Into<String>, anchor: Position, properties: &SpawnerProperties) -> Self {
        let initial_spawn = properties.initial_spawn.unwrap_or(0);
        let mut config = Self {
            name: name.into(),
            anchor,
            respawn_rate: properties.respawn_rate.unwrap_or(DEFAULT_RESPAWN_RATE),
            initial_spawn,
            max_creatures: properties.max_creatures.unwrap_or(DEFAULT_MAX_CREATURES),
            spawn_radius: properties.spawn_radius.unwrap_or(0).max(0),
            random_walk_radius: properties
                .random_walk_radius
                .unwrap_or(DEFAULT_RANDOM_WALK_RADIUS),
            leash_radius: properties.leash_radius.unwrap_or(DEFAULT_LEASH_RADIUS),
            require_dead_to_respawn: properties.require_dead_to_respawn.unwrap_or(false),
            remove_dead_npcs: properties.remove_dead_npcs.unwrap_or(true),
            do_initial_spawn_immediately: initial_spawn > 0,
            respect_knowledge: properties.respect_knowledge.unwrap_or(true),
            elite_tick_cap: properties.elite_tick_cap.unwrap_or(-1),
            should_serialize: properties.should_serialize.unwrap_or(false),
        };
        if properties.lair_name.is_some() {
            config.respect_knowledge = false;
        }
        config
    }

    /// Settings for the per-map spawner that owns hand-placed NPCs.
    pub fn placed_npcs(map: &str) -> Self {
        Self {
            name: format!("{} Green NPC Spawner", map),
            anchor: Position::new(0, 0),
            respawn_rate: DEFAULT_NPC_RESPAWN_RATE,
            initial_spawn: 0,
            max_creatures: 0,
            spawn_radius: 0,
            random_walk_radius: 0,
            leash_radius: -1,
            require_dead_to_respawn: true,
            remove_dead_npcs: false,
            do_initial_spawn_immediately: true,
            respect_knowledge: false,
            elite_tick_cap: -1,
            should_serialize: false,
        }
    }
}

/// A template a slot can instantiate, optionally pinned to a tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnTemplate {
    pub tag: String,
    pub template: NpcTemplate,
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Unspawned,
    Alive,
    Dead,
}

#[derive(Debug, Clone)]
struct SpawnSlot {
    pinned: Option<usize>,
    /// Living instances and corpses still referenced by this slot.
    instances: Vec<NpcId>,
    living: usize,
    spawned_once: bool,
    timer_started_at: u64,
}

impl SpawnSlot {
    fn new(pinned: Option<usize>) -> Self {
        Self {
            pinned,
            instances: Vec::new(),
            living: 0,
            spawned_once: false,
            timer_started_at: 0,
        }
    }

    fn state(&self) -> SlotState {
        if self.living > 0 {
            SlotState::Alive
        } else if self.spawned_once {
            SlotState::Dead
        } else {
            SlotState::Unspawned
        }
    }
}

#[derive(Debug, Clone)]
pub struct Spawner {
    id: SpawnerId,
    config: SpawnerConfig,
    templates: Vec<SpawnTemplate>,
    slots: Vec<SpawnSlot>,
    current_tick: u64,
    npc_ticks: u64,
    initialized: bool,
    rng: StdRng,
}

impl Spawner {
    /// Zone spawner: `max_creatures` slots, each drawing a random template.
    pub fn zone(id: SpawnerId, config: SpawnerConfig, templates: Vec<SpawnTemplate>, seed: u64) -> Self {
        let slots = if templates.is_empty() {
            Vec::new()
        } else {
            (0..config.max_creatures).map(|_| SpawnSlot::new(None)).collect()
        };
        Self::with_slots(id, config, templates, slots, seed)
    }

    /// One slot per template, each pinned to its own template.
    pub fn placed(id: SpawnerId, config: SpawnerConfig, templates: Vec<SpawnTemplate>, seed: u64) -> Self {
        let slots = (0..templates.len()).map(|index| SpawnSlot::new(Some(index))).collect();
        Self::with_slots(id, config, templates, slots, seed)
    }

    fn with_slots(
        id: SpawnerId,
        config: SpawnerConfig,
        templates: Vec<SpawnTemplate>,
        slots: Vec<SpawnSlot>,
        seed: u64,
    ) -> Self {
        Self {
            id,
            config,
            templates,
            slots,
            current_tick: 0,
            npc_ticks: 0,
            initialized: false,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn id(&self) -> SpawnerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SpawnerConfig {
        &self.config
    }

    pub fn anchor(&self) -> Position {
        self.config.anchor
    }

    pub fn leash_radius(&self) -> i32 {
        self.config.leash_radius
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Restores a persisted counter; meant for use before the first tick.
    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn can_be_saved(&self) -> bool {
        self.config.should_serialize
    }

    pub fn to_serializable(&self) -> SerializableSpawner {
        SerializableSpawner {
            x: self.config.anchor.x,
            y: self.config.anchor.y,
            current_tick: self.current_tick,
        }
    }

    pub fn slot_states(&self) -> Vec<SlotState> {
        self.slots.iter().map(SpawnSlot::state).collect()
    }

    /// Every NPC this spawner still references, corpses included.
    pub fn npc_ids(&self) -> Vec<NpcId> {
        self.slots
            .iter()
            .flat_map(|slot| slot.instances.iter().copied())
            .collect()
    }

    pub fn owns(&self, npc: NpcId) -> bool {
        self.slots.iter().any(|slot| slot.instances.contains(&npc))
    }

    /// Fills slots at map load when configured to spawn immediately.
    /// Timers and knowledge are bypassed; the elite cap still applies.
    pub fn initialize(&mut self, host: &mut dyn SpawnHost) {
        if self.initialized {
            return;
        }
        self.initialized = true;
        if !self.config.do_initial_spawn_immediately {
            return;
        }
        let count = match self.config.initial_spawn {
            0 => self.slots.len(),
            n => (n as usize).min(self.slots.len()),
        };
        for slot_index in 0..count {
            let Some(template_index) = self.pick_template(slot_index) else {
                continue;
            };
            if self.elite_blocked(host, template_index) {
                continue;
            }
            let position = self.pick_position(host, template_index);
            self.spawn_into(host, slot_index, template_index, position);
        }
        log::debug!(
            target: SPAWN_TARGET,
            "{} ({}): initial spawn filled {} of {} slots",
            self.config.name,
            host.map_name(),
            self.slots.iter().filter(|slot| slot.living > 0).count(),
            self.slots.len()
        );
    }

    /// Slow tick: corpse bookkeeping and respawn timers. Never fails; a zone at
    /// capacity or mid-cooldown simply does nothing.
    pub fn steady_tick(&mut self, host: &mut dyn SpawnHost) {
        if !self.initialized {
            self.initialize(host);
        }
        self.current_tick = self.current_tick.saturating_add(1);
        self.reconcile(host);

        let capacity = (self.config.max_creatures as usize).max(self.slots.len());
        for slot_index in 0..self.slots.len() {
            let slot = &self.slots[slot_index];
            let elapsed = self.current_tick.saturating_sub(slot.timer_started_at);
            if elapsed < self.config.respawn_rate {
                continue;
            }
            // capacity freed by a death belongs to the empty slot and its timer
            if slot.living > 0 && (self.config.require_dead_to_respawn || self.has_empty_slot()) {
                continue;
            }
            if self.living_count() >= capacity {
                break;
            }
            let Some(template_index) = self.pick_template(slot_index) else {
                continue;
            };
            if self.elite_blocked(host, template_index) {
                continue;
            }
            let position = self.pick_position(host, template_index);
            if self.config.respect_knowledge && host.has_knowledge_at(position.x, position.y) {
                log::trace!(
                    target: SPAWN_TARGET,
                    "{}: spawn at {},{} deferred, watched",
                    self.config.name,
                    position.x,
                    position.y
                );
                continue;
            }
            self.spawn_into(host, slot_index, template_index, position);
        }
    }

    /// Fast tick: leash enforcement and wandering for living NPCs.
    pub fn npc_tick(&mut self, host: &mut dyn SpawnHost) {
        self.npc_ticks = self.npc_ticks.wrapping_add(1);
        let wander_turn = self.npc_ticks % NPC_MOVE_INTERVAL_TICKS == 0;
        let leash = self.config.leash_radius;
        let walk = self.config.random_walk_radius;

        for id in self.npc_ids() {
            let Some(npc) = host.npc(id) else {
                continue;
            };
            if npc.core.is_dead() {
                continue;
            }
            let position = npc.position();
            let anchor = npc.anchor;
            let stationary = npc.stationary;

            if leash >= 0 && position.chebyshev(anchor) > leash {
                log::trace!(target: SPAWN_TARGET, "{}: npc {} leashed home", self.config.name, id.0);
                host.step_npc(id, anchor);
                continue;
            }
            if stationary || !wander_turn || walk <= 0 {
                continue;
            }
            if !host.has_knowledge_at(position.x, position.y) {
                continue;
            }
            for _ in 0..NPC_MOVE_ATTEMPTS {
                let Some(direction) = ALL_DIRECTIONS.choose(&mut self.rng).copied() else {
                    break;
                };
                let destination = position.step(direction);
                if destination.chebyshev(anchor) > walk {
                    continue;
                }
                if leash >= 0 && destination.chebyshev(anchor) > leash {
                    continue;
                }
                if !host.can_enter(destination) {
                    continue;
                }
                host.step_npc(id, destination);
                break;
            }
        }
    }

    /// Refreshes living counts; starts a slot's timer when it loses a living
    /// instance and drops or keeps corpses per `remove_dead_npcs`.
    fn reconcile(&mut self, host: &mut dyn SpawnHost) {
        let remove_dead = self.config.remove_dead_npcs;
        let now = self.current_tick;
        for slot in &mut self.slots {
            let mut living = 0;
            let mut kept = Vec::with_capacity(slot.instances.len());
            for &id in &slot.instances {
                let Some(npc) = host.npc(id) else {
                    continue;
                };
                if !npc.core.is_dead() {
                    living += 1;
                    kept.push(id);
                } else if remove_dead {
                    host.despawn_npc(id);
                } else {
                    kept.push(id);
                }
            }
            if living < slot.living {
                slot.timer_started_at = now;
            }
            slot.instances = kept;
            slot.living = living;
        }
    }

    fn has_empty_slot(&self) -> bool {
        self.slots.iter().any(|slot| slot.living == 0)
    }

    fn living_count(&self) -> usize {
        self.slots.iter().map(|slot| slot.living).sum()
    }

    fn elite_blocked(&self, host: &dyn SpawnHost, template_index: usize) -> bool {
        let cap = self.config.elite_tick_cap;
        if cap < 0 || !self.templates[template_index].template.elite {
            return false;
        }
        let alive = self
            .npc_ids()
            .into_iter()
            .filter_map(|id| host.npc(id))
            .filter(|npc| npc.elite && !npc.core.is_dead())
            .count();
        alive >= cap as usize
    }

    fn pick_template(&mut self, slot_index: usize) -> Option<usize> {
        if let Some(pinned) = self.slots[slot_index].pinned {
            return Some(pinned);
        }
        if self.templates.is_empty() {
            return None;
        }
        Some(self.rng.gen_range(0..self.templates.len()))
    }

    fn pick_position(&mut self, host: &dyn SpawnHost, template_index: usize) -> Position {
        if let Some(position) = self.templates[template_index].position {
            return position;
        }
        let anchor = self.config.anchor;
        let radius = self.config.spawn_radius;
        if radius <= 0 {
            return anchor;
        }
        for _ in 0..NPC_MOVE_ATTEMPTS {
            let candidate = Position {
                x: anchor.x + self.rng.gen_range(-radius..=radius),
                y: anchor.y + self.rng.gen_range(-radius..=radius),
                z: anchor.z,
            };
            if host.can_enter(candidate) {
                return candidate;
            }
        }
        anchor
    }

    fn spawn_into(
        &mut self,
        host: &mut dyn SpawnHost,
        slot_index: usize,
        template_index: usize,
        position: Position,
    ) {
        let id = host.next_npc_id();
        let spawn = &self.templates[template_index];
        let npc = instantiate(
            id,
            self.id,
            host.map_name(),
            spawn,
            position,
            spawn.position.unwrap_or(self.config.anchor),
        );
        log::debug!(
            target: SPAWN_TARGET,
            "{}: spawned {} ({}) as npc {} at {},{}",
            self.config.name,
            npc.core.name,
            spawn.tag,
            id.0,
            position.x,
            position.y
        );
        host.spawn_npc(npc);
        let slot = &mut self.slots[slot_index];
        slot.instances.push(id);
        slot.living += 1;
        slot.spawned_once = true;
        slot.timer_started_at = self.current_tick;
    }
}

fn instantiate(
    id: NpcId,
    spawner: SpawnerId,
    map: &str,
    spawn: &SpawnTemplate,
    position: Position,
    anchor: Position,
) -> Npc {
    let template = &spawn.template;
    let mut core = CharacterCore::new(template.name.clone(), map, position);
    core.hp = BoundedValue::full(0, template.hp.max(1));
    core.mp = BoundedValue::full(0, template.mp.max(0));
    core.level = template.level;
    core.allegiance = template.allegiance.unwrap_or_default();
    core.alignment = template.alignment.unwrap_or_default();
    core.effects = template.effects.iter().cloned().collect();
    Npc {
        id,
        core,
        npc_id: spawn.tag.clone(),
        sprite: template.sprite.unwrap_or(-1),
        spawner: Some(spawner),
        hostility: template.hostility.unwrap_or(Hostility::Always),
        elite: template.elite,
        stationary: template.stationary,
        anchor,
    }
}
