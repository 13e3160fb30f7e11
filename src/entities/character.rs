use crate::world::position::{Direction, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NpcId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpawnerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CharacterId {
    Player(PlayerId),
    Npc(NpcId),
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CharacterId::Player(id) => write!(f, "player {}", id.0),
            CharacterId::Npc(id) => write!(f, "npc {}", id.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Allegiance {
    #[default]
    None,
    Townsfolk,
    Royalty,
    Adventurers,
    Wilderness,
    Underground,
    Pirates,
    Enemy,
    NaturalResource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Alignment {
    Good,
    #[default]
    Neutral,
    Evil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Hostility {
    #[default]
    Never,
    OnHit,
    Faction,
    Always,
}

/// A resource pool (hp, mp) whose current value stays inside its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundedValue {
    pub minimum: i32,
    pub maximum: i32,
    current: i32,
}

impl BoundedValue {
    pub fn new(minimum: i32, maximum: i32, current: i32) -> Self {
        let maximum = maximum.max(minimum);
        Self {
            minimum,
            maximum,
            current: current.clamp(minimum, maximum),
        }
    }

    pub fn full(minimum: i32, maximum: i32) -> Self {
        Self::new(minimum, maximum, maximum)
    }

    pub fn current(&self) -> i32 {
        self.current
    }

    pub fn set(&mut self, value: i32) {
        self.current = value.clamp(self.minimum, self.maximum);
    }

    pub fn add(&mut self, delta: i32) {
        self.set(self.current.saturating_add(delta));
    }

    pub fn is_depleted(&self) -> bool {
        self.current <= self.minimum
    }
}

impl Default for BoundedValue {
    fn default() -> Self {
        Self::full(0, 100)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterCore {
    pub name: String,
    pub map: String,
    position: Position,
    pub direction: Direction,
    pub hp: BoundedValue,
    pub mp: BoundedValue,
    pub level: u32,
    pub allegiance: Allegiance,
    pub alignment: Alignment,
    pub effects: BTreeSet<String>,
}

impl CharacterCore {
    pub fn new(name: impl Into<String>, map: impl Into<String>, position: Position) -> Self {
        Self {
            name: name.into(),
            map: map.into(),
            position,
            direction: Direction::South,
            hp: BoundedValue::default(),
            mp: BoundedValue::full(0, 0),
            level: 1,
            allegiance: Allegiance::None,
            alignment: Alignment::Neutral,
            effects: BTreeSet::new(),
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Only the owning map may reposition a character once it is indexed.
    pub(crate) fn set_position(&mut self, position: Position) {
        if let Some(direction) = Direction::between(self.position, position) {
            self.direction = direction;
        }
        self.position = position;
    }

    pub fn is_dead(&self) -> bool {
        self.hp.is_depleted()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnPoint {
    pub map: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub core: CharacterCore,
    pub exp: u64,
    pub learned_abilities: BTreeSet<String>,
    pub respawn_point: RespawnPoint,
    pub party_name: Option<String>,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, map: impl Into<String>, position: Position) -> Self {
        let map = map.into();
        Self {
            id,
            respawn_point: RespawnPoint {
                map: map.clone(),
                x: position.x,
                y: position.y,
            },
            core: CharacterCore::new(name, map, position),
            exp: 0,
            learned_abilities: BTreeSet::new(),
            party_name: None,
        }
    }

    pub fn position(&self) -> Position {
        self.core.position()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Npc {
    pub id: NpcId,
    pub core: CharacterCore,
    /// Template tag the NPC was instantiated from.
    pub npc_id: String,
    pub sprite: i32,
    pub spawner: Option<SpawnerId>,
    pub hostility: Hostility,
    pub elite: bool,
    pub stationary: bool,
    pub anchor: Position,
}

impl Npc {
    pub fn position(&self) -> Position {
        self.core.position()
    }
}

/// Borrowed view over either character variant.
#[derive(Debug, Clone, Copy)]
pub enum CharacterRef<'a> {
    Player(&'a Player),
    Npc(&'a Npc),
}

impl<'a> CharacterRef<'a> {
    pub fn id(self) -> CharacterId {
        match self {
            CharacterRef::Player(player) => CharacterId::Player(player.id),
            CharacterRef::Npc(npc) => CharacterId::Npc(npc.id),
        }
    }

    pub fn core(self) -> &'a CharacterCore {
        match self {
            CharacterRef::Player(player) => &player.core,
            CharacterRef::Npc(npc) => &npc.core,
        }
    }

    pub fn position(self) -> Position {
        self.core().position()
    }

    pub fn is_dead(self) -> bool {
        self.core().is_dead()
    }

    pub fn is_player(self) -> bool {
        matches!(self, CharacterRef::Player(_))
    }

    /// Players carry no hostility policy.
    pub fn hostility(self) -> Option<Hostility> {
        match self {
            CharacterRef::Player(_) => None,
            CharacterRef::Npc(npc) => Some(npc.hostility),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_value_clamps() {
        let mut hp = BoundedValue::new(0, 50, 80);
        assert_eq!(hp.current(), 50);
        hp.add(-70);
        assert_eq!(hp.current(), 0);
        assert!(hp.is_depleted());
        hp.set(25);
        assert_eq!(hp.current(), 25);
        assert!(!hp.is_depleted());
    }

    #[test]
    fn set_position_updates_facing() {
        let mut core = CharacterCore::new("Test", "Tutorial", Position::new(5, 5));
        core.set_position(Position::new(5, 4));
        assert_eq!(core.direction, Direction::North);
        core.set_position(Position::new(20, 20));
        assert_eq!(core.direction, Direction::Southeast);
    }
}
