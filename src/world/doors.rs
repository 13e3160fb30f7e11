use crate::world::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DoorId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Door {
    pub id: DoorId,
    pub position: Position,
    pub open: bool,
    /// Blocks movement.
    pub density: bool,
    /// Blocks sight.
    pub opacity: bool,
}

impl Door {
    pub fn closed(id: DoorId, position: Position) -> Self {
        Self {
            id,
            position,
            open: false,
            density: true,
            opacity: true,
        }
    }

    fn set_open(&mut self, open: bool) {
        self.open = open;
        self.density = !open;
        self.opacity = !open;
    }
}

#[derive(Debug, Clone, Default)]
pub struct DoorTable {
    doors: HashMap<DoorId, Door>,
}

impl DoorTable {
    pub fn new(doors: impl IntoIterator<Item = Door>) -> Self {
        Self {
            doors: doors.into_iter().map(|door| (door.id, door)).collect(),
        }
    }

    pub fn get(&self, id: DoorId) -> Option<&Door> {
        self.doors.get(&id)
    }

    pub fn len(&self) -> usize {
        self.doors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doors.is_empty()
    }

    pub fn is_open(&self, id: DoorId) -> bool {
        self.doors.get(&id).is_some_and(|door| door.open)
    }

    /// Applies the state unconditionally and returns the door's tile.
    pub fn set_state(&mut self, id: DoorId, open: bool) -> Option<Position> {
        let door = self.doors.get_mut(&id)?;
        door.set_open(open);
        Some(door.position)
    }

    pub fn blocks_movement_at(&self, position: Position) -> bool {
        self.doors
            .values()
            .any(|door| door.density && door.position.x == position.x && door.position.y == position.y)
    }

    /// Open/closed flag per door, as staged into player views.
    pub fn states(&self) -> BTreeMap<DoorId, bool> {
        self.doors.values().map(|door| (door.id, door.open)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggling_flips_density_and_opacity() {
        let mut table = DoorTable::new([Door::closed(DoorId(3), Position::new(5, 6))]);
        assert!(!table.is_open(DoorId(3)));
        assert!(table.blocks_movement_at(Position::new(5, 6)));

        assert_eq!(table.set_state(DoorId(3), true), Some(Position::new(5, 6)));
        let door = table.get(DoorId(3)).expect("door");
        assert!(door.open && !door.density && !door.opacity);
        assert!(!table.blocks_movement_at(Position::new(5, 6)));

        table.set_state(DoorId(3), false);
        let door = table.get(DoorId(3)).expect("door");
        assert!(!door.open && door.density && door.opacity);
    }

    #[test]
    fn unknown_door_is_reported() {
        let mut table = DoorTable::default();
        assert_eq!(table.set_state(DoorId(1), true), None);
        assert!(!table.is_open(DoorId(1)));
    }
}
