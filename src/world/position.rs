use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    #[default]
    South,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionDelta {
    pub dx: i32,
    pub dy: i32,
}

pub const ALL_DIRECTIONS: [Direction; 8] = [
    Direction::North,
    Direction::East,
    Direction::South,
    Direction::West,
    Direction::Northeast,
    Direction::Northwest,
    Direction::Southeast,
    Direction::Southwest,
];

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y, z: 0 }
    }

    pub fn offset(self, delta: PositionDelta) -> Self {
        Self {
            x: self.x.saturating_add(delta.dx),
            y: self.y.saturating_add(delta.dy),
            z: self.z,
        }
    }

    pub fn step(self, direction: Direction) -> Self {
        self.offset(direction.delta())
    }

    /// Square-neighbourhood distance; the z level is ignored.
    pub fn chebyshev(self, other: Position) -> i32 {
        let dx = (i64::from(self.x) - i64::from(other.x)).unsigned_abs();
        let dy = (i64::from(self.y) - i64::from(other.y)).unsigned_abs();
        dx.max(dy).min(i32::MAX as u64) as i32
    }

    pub fn within_square(self, center: Position, radius: i32) -> bool {
        radius >= 0 && self.chebyshev(center) <= radius
    }
}

impl Direction {
    pub fn delta(self) -> PositionDelta {
        match self {
            Direction::North => PositionDelta { dx: 0, dy: -1 },
            Direction::East => PositionDelta { dx: 1, dy: 0 },
            Direction::South => PositionDelta { dx: 0, dy: 1 },
            Direction::West => PositionDelta { dx: -1, dy: 0 },
            Direction::Northeast => PositionDelta { dx: 1, dy: -1 },
            Direction::Northwest => PositionDelta { dx: -1, dy: -1 },
            Direction::Southeast => PositionDelta { dx: 1, dy: 1 },
            Direction::Southwest => PositionDelta { dx: -1, dy: 1 },
        }
    }

    /// Facing for a one-tile step; `None` when the tiles coincide.
    pub fn between(from: Position, to: Position) -> Option<Self> {
        let dx = (to.x - from.x).signum();
        let dy = (to.y - from.y).signum();
        ALL_DIRECTIONS
            .into_iter()
            .find(|direction| direction.delta() == PositionDelta { dx, dy })
    }
}
