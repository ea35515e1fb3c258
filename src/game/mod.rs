//! # Game Module
//!
//! Core game state, grid representation, entity storage and turn scheduling.
//!
//! This module contains the fundamental building blocks of a Delve session:
//! - Grid coordinates and movement directions
//! - The immutable dungeon grid and its tiles
//! - The entity-component store and its closed component set
//! - The game state snapshot and the turn scheduler that owns it

pub mod autoexplore;
pub mod components;
pub mod ecs;
pub mod scheduler;
pub mod state;
pub mod world;

pub use autoexplore::*;
pub use components::*;
pub use ecs::*;
pub use scheduler::*;
pub use state::*;
pub use world::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents a 2D coordinate on the dungeon grid.
///
/// # Examples
///
/// ```
/// use delve::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
///
/// let adjacent = pos.cardinal_adjacent_positions();
/// assert_eq!(adjacent.len(), 4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }

    /// Returns the 4 cardinal neighbours in east, west, south, north order.
    ///
    /// The order is part of the contract: wander choices and A* tie-breaking
    /// both depend on it.
    pub fn cardinal_adjacent_positions(self) -> [Position; 4] {
        Direction::CARDINALS.map(|dir| self.step(dir))
    }

    /// Returns the position one step away in `direction`.
    pub fn step(self, direction: Direction) -> Position {
        Position::new(self.x + direction.dx, self.y + direction.dy)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

impl std::ops::Add<Direction> for Position {
    type Output = Self;

    fn add(self, direction: Direction) -> Self {
        self.step(direction)
    }
}

impl std::ops::Sub for Position {
    type Output = (i32, i32);

    fn sub(self, other: Self) -> (i32, i32) {
        (self.x - other.x, self.y - other.y)
    }
}

/// A unit step on the grid.
///
/// Each axis is in `{-1, 0, 1}`. Movement commits only use the cardinal
/// directions and [`Direction::NONE`]; diagonals appear only inside
/// line-of-sight ray walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Direction {
    pub dx: i32,
    pub dy: i32,
}

impl Direction {
    pub const NONE: Direction = Direction { dx: 0, dy: 0 };
    pub const NORTH: Direction = Direction { dx: 0, dy: -1 };
    pub const SOUTH: Direction = Direction { dx: 0, dy: 1 };
    pub const EAST: Direction = Direction { dx: 1, dy: 0 };
    pub const WEST: Direction = Direction { dx: -1, dy: 0 };

    /// The 4 cardinal directions in east, west, south, north order.
    pub const CARDINALS: [Direction; 4] = [
        Direction::EAST,
        Direction::WEST,
        Direction::SOUTH,
        Direction::NORTH,
    ];

    /// Builds a direction, returning `None` if either axis is outside `{-1, 0, 1}`.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::Direction;
    ///
    /// assert_eq!(Direction::new(0, -1), Some(Direction::NORTH));
    /// assert_eq!(Direction::new(2, 0), None);
    /// ```
    pub fn new(dx: i32, dy: i32) -> Option<Direction> {
        if (-1..=1).contains(&dx) && (-1..=1).contains(&dy) {
            Some(Direction { dx, dy })
        } else {
            None
        }
    }

    /// Builds the step whose axes are the signs of the given delta.
    pub fn towards(delta: (i32, i32)) -> Direction {
        Direction {
            dx: delta.0.signum(),
            dy: delta.1.signum(),
        }
    }

    /// True for the zero step.
    pub fn is_none(self) -> bool {
        self == Direction::NONE
    }

    /// True if at most one axis is non-zero, i.e. the step is legal for movement.
    pub fn is_cardinal_or_none(self) -> bool {
        self.dx == 0 || self.dy == 0
    }

    /// Returns the step pointing the other way.
    pub fn opposite(self) -> Direction {
        Direction {
            dx: -self.dx,
            dy: -self.dy,
        }
    }
}

/// Unique identifier for game entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_creation() {
        let pos = Position::new(5, 10);
        assert_eq!(pos.x, 5);
        assert_eq!(pos.y, 10);
    }

    #[test]
    fn test_position_manhattan_distance() {
        let pos1 = Position::new(0, 0);
        let pos2 = Position::new(3, 4);
        assert_eq!(pos1.manhattan_distance(pos2), 7);
        assert_eq!(pos2.manhattan_distance(pos1), 7);
    }

    #[test]
    fn test_position_cardinal_adjacent() {
        let pos = Position::new(5, 5);
        let adjacent = pos.cardinal_adjacent_positions();
        assert_eq!(
            adjacent,
            [
                Position::new(6, 5),
                Position::new(4, 5),
                Position::new(5, 6),
                Position::new(5, 4),
            ]
        );
        assert!(!adjacent.contains(&Position::new(4, 4)));
    }

    #[test]
    fn test_position_arithmetic() {
        let pos = Position::new(5, 10);
        assert_eq!(pos + Direction::NORTH, Position::new(5, 9));
        assert_eq!(Position::new(8, 12) - pos, (3, 2));
    }

    #[test]
    fn test_direction_validation() {
        assert_eq!(Direction::new(1, 0), Some(Direction::EAST));
        assert_eq!(Direction::new(1, 1), Some(Direction { dx: 1, dy: 1 }));
        assert_eq!(Direction::new(-2, 0), None);
        assert_eq!(Direction::new(0, 3), None);
    }

    #[test]
    fn test_direction_cardinality() {
        assert!(Direction::NONE.is_cardinal_or_none());
        assert!(Direction::WEST.is_cardinal_or_none());
        assert!(!Direction { dx: 1, dy: -1 }.is_cardinal_or_none());
        assert_eq!(Direction::towards((-7, 3)), Direction { dx: -1, dy: 1 });
        assert_eq!(Direction::SOUTH.opposite(), Direction::NORTH);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId(42).to_string(), "#42");
    }
}
