use crate::entities::character::PlayerId;
use crate::world::position::Position;
use std::collections::{BTreeSet, HashMap};

pub const DEFAULT_KNOWLEDGE_RADIUS: i32 = 4;

/// Cells touched by a square shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct KnowledgeDelta {
    pub revoked: usize,
    pub granted: usize,
}

/// Which players have each tile in view.
///
/// Keyed by `(x, y)`; a cell with no watchers is removed, so the grid is
/// equal by content to its prior state after a grant/revoke round-trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeGrid {
    cells: HashMap<(i32, i32), BTreeSet<PlayerId>>,
}

impl KnowledgeGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn grant(&mut self, player: PlayerId, x: i32, y: i32) -> bool {
        self.cells.entry((x, y)).or_default().insert(player)
    }

    pub fn revoke(&mut self, player: PlayerId, x: i32, y: i32) -> bool {
        let Some(watchers) = self.cells.get_mut(&(x, y)) else {
            return false;
        };
        let removed = watchers.remove(&player);
        if watchers.is_empty() {
            self.cells.remove(&(x, y));
        }
        removed
    }

    pub fn knows(&self, player: PlayerId, x: i32, y: i32) -> bool {
        self.cells
            .get(&(x, y))
            .is_some_and(|watchers| watchers.contains(&player))
    }

    pub fn cell_has_knowledge(&self, x: i32, y: i32) -> bool {
        self.cells.contains_key(&(x, y))
    }

    pub fn players_with_knowledge_of(&self, x: i32, y: i32) -> Vec<PlayerId> {
        self.cells
            .get(&(x, y))
            .map(|watchers| watchers.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn grant_square(&mut self, player: PlayerId, center: Position, radius: i32) {
        for (x, y) in square(center, radius) {
            self.grant(player, x, y);
        }
    }

    pub fn revoke_square(&mut self, player: PlayerId, center: Position, radius: i32) {
        for (x, y) in square(center, radius) {
            self.revoke(player, x, y);
        }
    }

    /// Moves a player's square from `old` to `new`, touching only the cells
    /// that are in exactly one of the two squares.
    pub fn shift_square(
        &mut self,
        player: PlayerId,
        old: Position,
        new: Position,
        radius: i32,
    ) -> KnowledgeDelta {
        let mut delta = KnowledgeDelta::default();
        for (x, y) in square(old, radius) {
            if !Position::new(x, y).within_square(new, radius) && self.revoke(player, x, y) {
                delta.revoked += 1;
            }
        }
        for (x, y) in square(new, radius) {
            if !Position::new(x, y).within_square(old, radius) && self.grant(player, x, y) {
                delta.granted += 1;
            }
        }
        delta
    }
}

fn square(center: Position, radius: i32) -> impl Iterator<Item = (i32, i32)> {
    let radius = radius.max(-1);
    let xs = center.x.saturating_sub(radius)..=center.x.saturating_add(radius);
    xs.flat_map(move |x| {
        (center.y.saturating_sub(radius)..=center.y.saturating_add(radius)).map(move |y| (x, y))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: PlayerId = PlayerId(1);

    #[test]
    fn grant_and_revoke_single_cell() {
        let mut grid = KnowledgeGrid::new();
        assert!(grid.grant(P, 3, 4));
        assert!(!grid.grant(P, 3, 4));
        assert!(grid.cell_has_knowledge(3, 4));
        assert_eq!(grid.players_with_knowledge_of(3, 4), vec![P]);
        assert!(grid.revoke(P, 3, 4));
        assert!(!grid.cell_has_knowledge(3, 4));
        assert_eq!(grid, KnowledgeGrid::new());
    }

    #[test]
    fn square_covers_chebyshev_neighbourhood() {
        let mut grid = KnowledgeGrid::new();
        grid.grant_square(P, Position::new(0, 0), 4);
        assert_eq!(grid.cell_count(), 81);
        assert!(grid.knows(P, 4, -4));
        assert!(!grid.knows(P, 5, 0));
    }

    #[test]
    fn disjoint_shift_moves_whole_square() {
        let mut grid = KnowledgeGrid::new();
        grid.grant_square(P, Position::new(0, 0), 4);
        grid.grant(PlayerId(2), 40, 40);

        let delta = grid.shift_square(P, Position::new(0, 0), Position::new(10, 10), 4);
        assert_eq!(delta, KnowledgeDelta { revoked: 81, granted: 81 });

        for x in -4..=4 {
            for y in -4..=4 {
                assert!(!grid.knows(P, x, y));
            }
        }
        for x in 6..=14 {
            for y in 6..=14 {
                assert!(grid.knows(P, x, y));
            }
        }
        assert_eq!(grid.players_with_knowledge_of(40, 40), vec![PlayerId(2)]);
        assert_eq!(grid.cell_count(), 82);
    }

    #[test]
    fn overlapping_shift_leaves_shared_cells_alone() {
        let mut grid = KnowledgeGrid::new();
        grid.grant_square(P, Position::new(0, 0), 4);
        let delta = grid.shift_square(P, Position::new(0, 0), Position::new(1, 0), 4);
        assert_eq!(delta, KnowledgeDelta { revoked: 9, granted: 9 });
        assert!(!grid.knows(P, -4, 0));
        assert!(grid.knows(P, 5, 0));
        assert_eq!(grid.cell_count(), 81);
    }

    #[test]
    fn revoke_square_roundtrip() {
        let mut grid = KnowledgeGrid::new();
        grid.grant(PlayerId(9), 2, 2);
        let before = grid.clone();
        grid.grant_square(P, Position::new(2, 2), 4);
        grid.revoke_square(P, Position::new(2, 2), 4);
        assert_eq!(grid, before);
    }
}
