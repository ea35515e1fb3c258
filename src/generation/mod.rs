//! # Generation Module
//!
//! Procedural level generation: BSP rooms, cellular caves, connectivity
//! repair, and NPC placement.
//!
//! Every step draws from one seeded [`StdRng`], so a fixed seed and config
//! always produce the same level. The pipeline that composes the steps lives
//! in [`dungeon`].

pub mod bsp;
pub mod cave;
pub mod connectivity;
pub mod dungeon;
pub mod encounters;

pub use bsp::*;
pub use cave::*;
pub use connectivity::*;
pub use dungeon::*;
pub use encounters::*;

use crate::{config, DelveError, DelveResult, Position};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// How a level's walkable space is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutStyle {
    /// BSP rooms joined by L-shaped corridors
    Rooms,
    /// Cellular-automaton caverns
    Caves,
    /// BSP rooms smoothed by the cellular refiner
    Hybrid,
}

impl std::str::FromStr for LayoutStyle {
    type Err = DelveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rooms" => Ok(LayoutStyle::Rooms),
            "caves" => Ok(LayoutStyle::Caves),
            "hybrid" => Ok(LayoutStyle::Hybrid),
            other => Err(DelveError::Configuration(format!(
                "unknown layout style '{other}' (expected rooms, caves or hybrid)"
            ))),
        }
    }
}

/// Parameters of the cellular cave refiner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaveConfig {
    /// Chance that a cell starts as wall
    pub initial_wall_probability: f64,
    /// Smoothing passes for a freshly seeded cave
    pub iterations: u32,
    /// A cell with at least this many wall neighbours becomes wall
    pub survival_threshold: u32,
    /// A cell with at most this many wall neighbours becomes floor
    pub birth_threshold: u32,
}

impl Default for CaveConfig {
    fn default() -> Self {
        Self {
            initial_wall_probability: 0.45,
            iterations: 5,
            survival_threshold: 5,
            birth_threshold: 3,
        }
    }
}

impl CaveConfig {
    /// Rejects thresholds and probabilities that cannot describe a cave.
    pub fn validate(&self) -> DelveResult<()> {
        if !(0.0..=1.0).contains(&self.initial_wall_probability) {
            return Err(DelveError::Configuration(format!(
                "initial wall probability {} is outside [0, 1]",
                self.initial_wall_probability
            )));
        }
        if self.survival_threshold > 8 || self.birth_threshold > 8 {
            return Err(DelveError::Configuration(
                "cave thresholds must be neighbour counts in [0, 8]".to_string(),
            ));
        }
        if self.birth_threshold >= self.survival_threshold {
            return Err(DelveError::Configuration(format!(
                "birth threshold {} must be below survival threshold {}",
                self.birth_threshold, self.survival_threshold
            )));
        }
        Ok(())
    }
}

/// Configuration for level generation.
///
/// Controls the grid size, the BSP room constraints, the layout style and
/// how many NPCs populate each level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Base seed; level seeds are derived from it
    pub seed: u64,
    /// Grid width in tiles
    pub width: u32,
    /// Grid height in tiles
    pub height: u32,
    /// Minimum room side length
    pub min_room_size: u32,
    /// Maximum room side length
    pub max_room_size: u32,
    /// Maximum BSP recursion depth
    pub max_depth: u32,
    /// Empty margin kept between a room and its leaf boundary
    pub room_padding: u32,
    /// Which generator produces the walkable space
    pub layout: LayoutStyle,
    /// Cellular refiner settings
    pub cave: CaveConfig,
    /// Refinement passes applied to BSP rooms in hybrid layouts
    pub hybrid_iterations: u32,
    /// Probability of a door where a corridor meets a room
    pub door_chance: f64,
    /// NPCs on level 1; each deeper level adds one
    pub npcs_per_level: u32,
}

impl GenerationConfig {
    /// Creates a default generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(7);
    /// assert!(config.min_room_size >= 3);
    /// assert!(config.max_room_size >= config.min_room_size);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            width: config::DEFAULT_DUNGEON_WIDTH,
            height: config::DEFAULT_DUNGEON_HEIGHT,
            min_room_size: 4,
            max_room_size: 10,
            max_depth: 5,
            room_padding: 1,
            layout: LayoutStyle::Rooms,
            cave: CaveConfig::default(),
            hybrid_iterations: 2,
            door_chance: 0.25,
            npcs_per_level: 4,
        }
    }

    /// Creates a configuration for testing with small, simple levels.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            seed,
            width: 20,
            height: 10,
            min_room_size: 3,
            max_room_size: 6,
            max_depth: 5,
            room_padding: 1,
            layout: LayoutStyle::Rooms,
            cave: CaveConfig::default(),
            hybrid_iterations: 1,
            door_chance: 0.0,
            npcs_per_level: 2,
        }
    }

    /// Same configuration with a different layout style.
    pub fn with_layout(mut self, layout: LayoutStyle) -> Self {
        self.layout = layout;
        self
    }

    /// Smallest BSP leaf able to host a minimum-size room plus padding.
    pub fn min_leaf_size(&self) -> u32 {
        self.min_room_size + 2 * self.room_padding
    }

    /// Checks that the dimensions and room constraints are mutually consistent.
    ///
    /// An inconsistent configuration is fatal: generation never starts.
    pub fn validate(&self) -> DelveResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DelveError::Configuration(format!(
                "dungeon dimensions {}x{} must be non-zero",
                self.width, self.height
            )));
        }
        if self.min_room_size == 0 {
            return Err(DelveError::Configuration(
                "minimum room size must be at least 1".to_string(),
            ));
        }
        if self.max_room_size < self.min_room_size {
            return Err(DelveError::Configuration(format!(
                "maximum room size {} is below minimum room size {}",
                self.max_room_size, self.min_room_size
            )));
        }
        if self.layout != LayoutStyle::Caves {
            let leaf = self.min_leaf_size();
            if leaf > self.width || leaf > self.height {
                return Err(DelveError::Configuration(format!(
                    "a {}x{} dungeon cannot hold a room of size {} with padding {}",
                    self.width, self.height, self.min_room_size, self.room_padding
                )));
            }
        } else if self.width < 3 || self.height < 3 {
            return Err(DelveError::Configuration(format!(
                "a cave needs at least 3x3 tiles, got {}x{}",
                self.width, self.height
            )));
        }
        if !(0.0..=1.0).contains(&self.door_chance) {
            return Err(DelveError::Configuration(format!(
                "door chance {} is outside [0, 1]",
                self.door_chance
            )));
        }
        self.cave.validate()
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// A boolean walkability grid (`true` = walkable) used while a level is
/// still being built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl WalkGrid {
    /// Creates a grid with every cell blocked.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; (width * height) as usize],
        }
    }

    /// Parses rows of `.` (walkable) and `#` (blocked). Any other character
    /// counts as walkable.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Position, WalkGrid};
    ///
    /// let grid = WalkGrid::from_ascii("###\n#..\n###");
    /// assert!(grid.get(Position::new(1, 1)));
    /// assert!(!grid.get(Position::new(0, 1)));
    /// ```
    pub fn from_ascii(text: &str) -> Self {
        let rows: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let height = rows.len() as u32;
        let width = rows.iter().map(|row| row.chars().count()).max().unwrap_or(0) as u32;
        let mut grid = Self::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                grid.set(Position::new(x as i32, y as i32), ch != '#');
            }
        }
        grid
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn cells(&self) -> &[bool] {
        &self.cells
    }

    pub fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    fn index(&self, pos: Position) -> Option<usize> {
        if self.in_bounds(pos) {
            Some(pos.y as usize * self.width as usize + pos.x as usize)
        } else {
            None
        }
    }

    /// Walkability of a cell; out-of-bounds cells are blocked.
    pub fn get(&self, pos: Position) -> bool {
        self.index(pos).map(|idx| self.cells[idx]).unwrap_or(false)
    }

    /// Sets a cell, ignoring out-of-bounds positions.
    pub fn set(&mut self, pos: Position, walkable: bool) {
        if let Some(idx) = self.index(pos) {
            self.cells[idx] = walkable;
        }
    }

    pub fn count_walkable(&self) -> usize {
        self.cells.iter().filter(|&&open| open).count()
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }
}

/// A rectangular room placed in a BSP leaf. Every cell inside it is walkable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Index of this room in placement order
    pub id: u32,
    /// Top-left corner of the room
    pub top_left: Position,
    pub width: u32,
    pub height: u32,
    /// Rooms joined to this one by a corridor
    pub connections: Vec<u32>,
}

impl Room {
    /// Creates a new room.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Room, Position};
    ///
    /// let room = Room::new(1, Position::new(5, 5), 10, 8);
    /// assert_eq!(room.center(), Position::new(10, 9));
    /// assert!(room.contains(Position::new(14, 12)));
    /// ```
    pub fn new(id: u32, top_left: Position, width: u32, height: u32) -> Self {
        Self {
            id,
            top_left,
            width,
            height,
            connections: Vec::new(),
        }
    }

    /// Gets the bottom-right corner of the room.
    pub fn bottom_right(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 - 1,
            self.top_left.y + self.height as i32 - 1,
        )
    }

    /// Gets the center position of the room.
    pub fn center(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 / 2,
            self.top_left.y + self.height as i32 / 2,
        )
    }

    pub fn area(&self) -> u32 {
        self.width * self.height
    }

    /// Checks if a position is inside this room.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.top_left.x
            && pos.y >= self.top_left.y
            && pos.x < self.top_left.x + self.width as i32
            && pos.y < self.top_left.y + self.height as i32
    }

    /// Checks if this room overlaps with another room.
    pub fn overlaps(&self, other: &Room) -> bool {
        !(self.top_left.x >= other.top_left.x + other.width as i32
            || other.top_left.x >= self.top_left.x + self.width as i32
            || self.top_left.y >= other.top_left.y + other.height as i32
            || other.top_left.y >= self.top_left.y + self.height as i32)
    }

    /// Gets all positions within this room.
    pub fn positions(&self) -> Vec<Position> {
        let mut positions = Vec::with_capacity(self.area() as usize);
        for y in self.top_left.y..(self.top_left.y + self.height as i32) {
            for x in self.top_left.x..(self.top_left.x + self.width as i32) {
                positions.push(Position::new(x, y));
            }
        }
        positions
    }

    /// Adds a connection to another room.
    pub fn add_connection(&mut self, room_id: u32) {
        if !self.connections.contains(&room_id) {
            self.connections.push(room_id);
        }
    }
}

/// Trait for procedural generators.
///
/// Every generation step implements this trait, so the level pipeline can
/// run, validate and log them uniformly.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random number generator.
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T, config: &GenerationConfig) -> DelveResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;
    use rand::SeedableRng;

    /// Creates a seeded random number generator.
    pub fn create_rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    /// Seed of a dungeon level derived from the base seed.
    pub fn level_seed(base_seed: u64, level_number: u32) -> u64 {
        base_seed.wrapping_add(level_number as u64 * config::LEVEL_SEED_STRIDE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_config_creation() {
        let config = GenerationConfig::new(12345);
        assert_eq!(config.seed, 12345);
        assert!(config.min_room_size >= 3);
        assert!(config.max_room_size >= config.min_room_size);
        assert!(config.validate().is_ok());
        assert!(GenerationConfig::for_testing(1).validate().is_ok());
    }

    #[test]
    fn test_inconsistent_room_sizes_are_rejected() {
        let mut config = GenerationConfig::for_testing(1);
        config.min_room_size = 12;
        config.max_room_size = 12;
        assert!(matches!(
            config.validate(),
            Err(DelveError::Configuration(_))
        ));

        let mut config = GenerationConfig::for_testing(1);
        config.max_room_size = 2;
        assert!(matches!(
            config.validate(),
            Err(DelveError::Configuration(_))
        ));

        let mut config = GenerationConfig::for_testing(1);
        config.min_room_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cave_config_validation() {
        assert!(CaveConfig::default().validate().is_ok());

        let bad_probability = CaveConfig {
            initial_wall_probability: 1.5,
            ..CaveConfig::default()
        };
        assert!(bad_probability.validate().is_err());

        let inverted = CaveConfig {
            survival_threshold: 3,
            birth_threshold: 5,
            ..CaveConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_layout_style_parsing() {
        assert_eq!("Caves".parse::<LayoutStyle>().unwrap(), LayoutStyle::Caves);
        assert_eq!("rooms".parse::<LayoutStyle>().unwrap(), LayoutStyle::Rooms);
        assert!("maze".parse::<LayoutStyle>().is_err());
    }

    #[test]
    fn test_room_geometry() {
        let room = Room::new(1, Position::new(5, 5), 10, 8);

        assert_eq!(room.bottom_right(), Position::new(14, 12));
        assert_eq!(room.center(), Position::new(10, 9));
        assert_eq!(room.area(), 80);
        assert_eq!(room.positions().len(), 80);

        assert!(room.contains(Position::new(5, 5)));
        assert!(room.contains(Position::new(14, 12)));
        assert!(!room.contains(Position::new(4, 5)));
        assert!(!room.contains(Position::new(15, 12)));
    }

    #[test]
    fn test_room_overlap() {
        let room1 = Room::new(1, Position::new(5, 5), 10, 8);
        let room2 = Room::new(2, Position::new(10, 8), 6, 6);
        let room3 = Room::new(3, Position::new(20, 20), 5, 5);

        assert!(room1.overlaps(&room2));
        assert!(room2.overlaps(&room1));
        assert!(!room1.overlaps(&room3));
    }

    #[test]
    fn test_room_connections() {
        let mut room = Room::new(1, Position::new(5, 5), 10, 8);
        room.add_connection(2);
        room.add_connection(3);
        room.add_connection(2);
        assert_eq!(room.connections, vec![2, 3]);
    }

    #[test]
    fn test_walk_grid_access() {
        let mut grid = WalkGrid::new(4, 3);
        assert_eq!(grid.count_walkable(), 0);
        grid.set(Position::new(2, 1), true);
        grid.set(Position::new(9, 9), true);
        assert!(grid.get(Position::new(2, 1)));
        assert!(!grid.get(Position::new(-1, 0)));
        assert_eq!(grid.count_walkable(), 1);
        assert_eq!(grid.positions().count(), 12);
    }

    #[test]
    fn test_level_seed_derivation() {
        assert_eq!(utils::level_seed(42, 0), 42);
        assert_eq!(utils::level_seed(42, 3), 3042);
        assert_eq!(utils::level_seed(u64::MAX, 1), 999);
    }
}
