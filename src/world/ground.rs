use crate::entities::item::{GroundItem, ItemClass, SimpleItem};
use crate::world::position::Position;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub type GroundCell = BTreeMap<ItemClass, Vec<GroundItem>>;

/// Ground snapshot for a square of tiles; only non-empty tiles appear.
pub type GroundVision = BTreeMap<(i32, i32), GroundCell>;

/// Items lying on a map, bucketed per tile and item class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroundStore {
    #[serde(with = "cell_list")]
    cells: HashMap<(i32, i32), GroundCell>,
}

impl GroundStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tile_count(&self) -> usize {
        self.cells.len()
    }

    /// Stacks onto an existing entry with the same uuid, otherwise appends.
    pub fn add_item(&mut self, x: i32, y: i32, class: ItemClass, item: SimpleItem, count: u32) {
        if count == 0 {
            return;
        }
        let items = self.cells.entry((x, y)).or_default().entry(class).or_default();
        if let Some(existing) = items.iter_mut().find(|ground| ground.item.uuid == item.uuid) {
            existing.count = existing.count.saturating_add(count);
        } else {
            items.push(GroundItem { item, count });
        }
    }

    pub fn entire_ground(&self, x: i32, y: i32) -> GroundCell {
        self.cells.get(&(x, y)).cloned().unwrap_or_default()
    }

    /// Up to `count` items of `class` at the tile, optionally a single uuid.
    pub fn items(
        &self,
        x: i32,
        y: i32,
        class: &ItemClass,
        uuid: Option<&str>,
        count: usize,
    ) -> Vec<GroundItem> {
        let Some(items) = self.cells.get(&(x, y)).and_then(|cell| cell.get(class)) else {
            return Vec::new();
        };
        items
            .iter()
            .filter(|ground| uuid.map_or(true, |uuid| ground.item.uuid == uuid))
            .take(count)
            .cloned()
            .collect()
    }

    /// Removes up to `count` copies; asking for more than exist clamps.
    /// Returns how many copies were removed.
    pub fn remove_item(&mut self, x: i32, y: i32, class: &ItemClass, uuid: &str, count: u32) -> u32 {
        let Some(cell) = self.cells.get_mut(&(x, y)) else {
            return 0;
        };
        let Some(items) = cell.get_mut(class) else {
            return 0;
        };
        let mut removed = 0;
        if let Some(index) = items.iter().position(|ground| ground.item.uuid == uuid) {
            let ground = &mut items[index];
            removed = ground.count.min(count);
            ground.count -= removed;
            if ground.count == 0 {
                items.remove(index);
            }
        }
        if items.is_empty() {
            cell.remove(class);
        }
        if cell.is_empty() {
            self.cells.remove(&(x, y));
        }
        removed
    }

    pub fn vision(&self, center: Position, radius: i32) -> GroundVision {
        let mut vision = GroundVision::new();
        if radius < 0 {
            return vision;
        }
        for x in center.x.saturating_sub(radius)..=center.x.saturating_add(radius) {
            for y in center.y.saturating_sub(radius)..=center.y.saturating_add(radius) {
                if let Some(cell) = self.cells.get(&(x, y)) {
                    vision.insert((x, y), cell.clone());
                }
            }
        }
        vision
    }
}

mod cell_list {
    use super::GroundCell;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;

    #[derive(Serialize, Deserialize)]
    struct Tile {
        x: i32,
        y: i32,
        items: GroundCell,
    }

    pub fn serialize<S: Serializer>(
        cells: &HashMap<(i32, i32), GroundCell>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut tiles: Vec<Tile> = cells
            .iter()
            .map(|(&(x, y), items)| Tile { x, y, items: items.clone() })
            .collect();
        tiles.sort_by_key(|tile| (tile.x, tile.y));
        tiles.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<HashMap<(i32, i32), GroundCell>, D::Error> {
        let tiles = Vec::<Tile>::deserialize(deserializer)?;
        Ok(tiles.into_iter().map(|tile| ((tile.x, tile.y), tile.items)).collect())
    }
}
