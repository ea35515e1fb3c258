//! # Level Generation
//!
//! The full level pipeline: layout, connectivity repair, doors, spawn and
//! stairs.
//!
//! The generator runs these steps in order:
//! 1. Build walkable space with the configured [`LayoutStyle`]
//! 2. Merge all regions into one with the [`ConnectivityResolver`]
//! 3. Convert to a [`DungeonGrid`] and add doors where corridors meet rooms
//! 4. Pick the spawn cell, then put the stairs on the cell farthest from it
//!
//! Every random draw comes from one [`StdRng`] seeded from the level seed, so
//! a seed and config pin down the level exactly.

use crate::generation::utils;
use crate::{
    BspGenerator, CaveRefiner, ConnectivityResolver, Corridor, DelveError, DelveResult,
    DungeonGrid, GenerationConfig, Generator, LayoutStyle, Position, Room, Tile, TileType,
    WalkGrid,
};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A finished, playable level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLevel {
    pub level_number: u32,
    /// Seed the level was generated from
    pub seed: u64,
    pub grid: DungeonGrid,
    /// Rooms from the BSP pass; empty for pure caves
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    /// Where the player enters the level
    pub spawn: Position,
    /// Stairs to the next level. Absent only on single-cell levels.
    pub stairs: Option<Position>,
}

/// Composes the generation steps into complete levels.
#[derive(Debug, Clone)]
pub struct LevelGenerator {
    /// Refuse levels that end up with more than one walkable region
    pub ensure_connectivity: bool,
}

impl Default for LevelGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl LevelGenerator {
    /// Creates a level generator.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{GenerationConfig, LevelGenerator};
    ///
    /// let level = LevelGenerator::new()
    ///     .generate_level(&GenerationConfig::for_testing(42), 1, Some(42))
    ///     .unwrap();
    /// assert_eq!(level.grid.count_regions(), 1);
    /// ```
    pub fn new() -> Self {
        Self {
            ensure_connectivity: true,
        }
    }

    /// Generates level `level_number`.
    ///
    /// With an explicit `seed` the level uses it directly; otherwise the seed
    /// is derived from the config's base seed and the level number.
    pub fn generate_level(
        &self,
        config: &GenerationConfig,
        level_number: u32,
        seed: Option<u64>,
    ) -> DelveResult<GeneratedLevel> {
        let seed = seed.unwrap_or_else(|| utils::level_seed(config.seed, level_number));
        let mut rng = utils::create_rng(seed);

        log::info!(
            "generating level {} ({:?}, {}x{}, seed {})",
            level_number,
            config.layout,
            config.width,
            config.height,
            seed
        );

        let mut level = self.generate(config, &mut rng)?;
        level.level_number = level_number;
        level.seed = seed;
        Ok(level)
    }

    fn build_layout(
        &self,
        config: &GenerationConfig,
        rng: &mut StdRng,
    ) -> DelveResult<(WalkGrid, Vec<Room>, Vec<Corridor>)> {
        match config.layout {
            LayoutStyle::Rooms => {
                let layout = BspGenerator::new().generate(config, rng)?;
                Ok((layout.grid, layout.rooms, layout.corridors))
            }
            LayoutStyle::Caves => {
                let grid = CaveRefiner::new(config.cave.clone()).generate(config, rng)?;
                Ok((grid, Vec::new(), Vec::new()))
            }
            LayoutStyle::Hybrid => {
                let layout = BspGenerator::new().generate(config, rng)?;
                let refined = CaveRefiner::new(config.cave.clone())
                    .smooth(&layout.grid, config.hybrid_iterations);
                Ok((refined, layout.rooms, layout.corridors))
            }
        }
    }

    /// Turns corridor cells directly outside a room edge into doors when they
    /// sit between two walls.
    fn place_doors(&self, grid: &mut DungeonGrid, rooms: &[Room], chance: f64, rng: &mut StdRng) -> usize {
        if chance <= 0.0 {
            return 0;
        }

        let mut placed = 0;
        for room in rooms {
            for (cell, flanks) in door_candidates(room) {
                if !grid.is_walkable(cell) || grid.get_tile(cell).map(|t| t.tile_type) != Some(TileType::Floor) {
                    continue;
                }
                if flanks.iter().any(|&flank| grid.is_walkable(flank)) {
                    continue;
                }
                if rng.gen_bool(chance) {
                    grid.set_tile(cell, Tile::new(TileType::Door));
                    placed += 1;
                }
            }
        }
        placed
    }

    /// The first room's center, or the first walkable cell in row-major order.
    fn choose_spawn(&self, grid: &DungeonGrid, rooms: &[Room]) -> DelveResult<Position> {
        if let Some(center) = rooms.first().map(Room::center) {
            if grid.is_walkable(center) {
                return Ok(center);
            }
        }
        grid.walkable_cells()
            .first()
            .copied()
            .ok_or_else(|| DelveError::GenerationFailed("level has no walkable cell".to_string()))
    }
}

/// Cells one step outside each room edge, paired with the two cells flanking
/// them along that edge. Corners are skipped.
fn door_candidates(room: &Room) -> Vec<(Position, [Position; 2])> {
    let top_left = room.top_left;
    let bottom_right = room.bottom_right();
    let mut candidates = Vec::new();

    for x in top_left.x..=bottom_right.x {
        for y in [top_left.y - 1, bottom_right.y + 1] {
            candidates.push((
                Position::new(x, y),
                [Position::new(x - 1, y), Position::new(x + 1, y)],
            ));
        }
    }
    for y in top_left.y..=bottom_right.y {
        for x in [top_left.x - 1, bottom_right.x + 1] {
            candidates.push((
                Position::new(x, y),
                [Position::new(x, y - 1), Position::new(x, y + 1)],
            ));
        }
    }
    candidates
}

/// Breadth-first distances from `origin`; returns the farthest walkable cell.
/// Ties go to the cell discovered first.
pub fn farthest_cell(grid: &DungeonGrid, origin: Position) -> Position {
    let width = grid.width() as usize;
    let mut distance = vec![u32::MAX; width * grid.height() as usize];
    let index = |pos: Position| pos.y as usize * width + pos.x as usize;

    let mut farthest = (origin, 0u32);
    let mut queue = VecDeque::new();
    distance[index(origin)] = 0;
    queue.push_back(origin);

    while let Some(pos) = queue.pop_front() {
        let d = distance[index(pos)];
        if d > farthest.1 {
            farthest = (pos, d);
        }
        for next in pos.cardinal_adjacent_positions() {
            if grid.is_walkable(next) && distance[index(next)] == u32::MAX {
                distance[index(next)] = d + 1;
                queue.push_back(next);
            }
        }
    }

    farthest.0
}

impl Generator<GeneratedLevel> for LevelGenerator {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<GeneratedLevel> {
        config.validate()?;

        let (mut walk, rooms, corridors) = self.build_layout(config, rng)?;
        let report = ConnectivityResolver::new().resolve(&mut walk, rng)?;

        let mut grid = DungeonGrid::from_walk_grid(&walk);
        let doors = if config.layout == LayoutStyle::Rooms {
            self.place_doors(&mut grid, &rooms, config.door_chance, rng)
        } else {
            0
        };

        let spawn = self.choose_spawn(&grid, &rooms)?;
        let far = farthest_cell(&grid, spawn);
        let stairs = if far != spawn {
            grid.set_tile(far, Tile::new(TileType::Stairs));
            Some(far)
        } else {
            None
        };

        log::debug!(
            "level ready: {} rooms, {} regions merged, {} doors, spawn {}, stairs {:?}",
            rooms.len(),
            report.regions_before,
            doors,
            spawn,
            stairs
        );

        let level = GeneratedLevel {
            level_number: 0,
            seed: config.seed,
            grid,
            rooms,
            corridors,
            spawn,
            stairs,
        };
        self.validate(&level, config)?;
        Ok(level)
    }

    fn validate(&self, level: &GeneratedLevel, config: &GenerationConfig) -> DelveResult<()> {
        if level.grid.width() != config.width || level.grid.height() != config.height {
            return Err(DelveError::GenerationFailed(format!(
                "level is {}x{}, expected {}x{}",
                level.grid.width(),
                level.grid.height(),
                config.width,
                config.height
            )));
        }
        if !level.grid.is_walkable(level.spawn) {
            return Err(DelveError::GenerationFailed(format!(
                "spawn {} is not walkable",
                level.spawn
            )));
        }
        if self.ensure_connectivity {
            let regions = level.grid.count_regions();
            if regions != 1 {
                return Err(DelveError::GenerationFailed(format!(
                    "level has {regions} walkable regions"
                )));
            }
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "LevelGenerator"
    }
}

/// Convenience wrapper around [`LevelGenerator::generate_level`].
pub fn generate_level(
    config: &GenerationConfig,
    level_number: u32,
    seed: Option<u64>,
) -> DelveResult<GeneratedLevel> {
    LevelGenerator::new().generate_level(config, level_number, seed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_with_small_level() {
        let config = GenerationConfig::for_testing(42);
        let level = generate_level(&config, 1, Some(42)).unwrap();

        assert_eq!(level.grid.width(), 20);
        assert_eq!(level.grid.height(), 10);
        assert!(!level.grid.walkable_cells().is_empty());
        assert_eq!(level.grid.count_regions(), 1);
        assert_eq!(level.seed, 42);
        assert_eq!(level.level_number, 1);
    }

    #[test]
    fn test_spawn_is_first_room_center() {
        let config = GenerationConfig::for_testing(8);
        let level = generate_level(&config, 1, None).unwrap();
        assert_eq!(level.spawn, level.rooms[0].center());
    }

    #[test]
    fn test_stairs_are_far_from_spawn() {
        let config = GenerationConfig::new(77);
        let level = generate_level(&config, 2, None).unwrap();
        let stairs = level.stairs.expect("stairs placed");

        assert_eq!(
            level.grid.get_tile(stairs).map(|t| t.tile_type),
            Some(TileType::Stairs)
        );
        assert_ne!(stairs, level.spawn);
    }

    #[test]
    fn test_level_seed_derivation() {
        let config = GenerationConfig::for_testing(42);
        let derived = generate_level(&config, 3, None).unwrap();
        assert_eq!(derived.seed, 3042);

        let explicit = generate_level(&config, 3, Some(3042)).unwrap();
        assert_eq!(derived.grid, explicit.grid);
    }

    #[test]
    fn test_every_layout_is_connected() {
        for layout in [LayoutStyle::Rooms, LayoutStyle::Caves, LayoutStyle::Hybrid] {
            for seed in 0..5 {
                let config = GenerationConfig::new(seed).with_layout(layout);
                let level = generate_level(&config, 1, None).unwrap();
                assert_eq!(level.grid.count_regions(), 1, "{layout:?} seed {seed}");
                assert!(level.grid.is_walkable(level.spawn));
            }
        }
    }

    #[test]
    fn test_doors_sit_between_walls() {
        let mut config = GenerationConfig::new(11);
        config.door_chance = 1.0;
        let level = generate_level(&config, 1, None).unwrap();

        for pos in level.grid.positions() {
            if level.grid.get_tile(pos).map(|t| t.tile_type) == Some(TileType::Door) {
                let horizontal_walls = !level.grid.is_walkable(Position::new(pos.x - 1, pos.y))
                    && !level.grid.is_walkable(Position::new(pos.x + 1, pos.y));
                let vertical_walls = !level.grid.is_walkable(Position::new(pos.x, pos.y - 1))
                    && !level.grid.is_walkable(Position::new(pos.x, pos.y + 1));
                assert!(horizontal_walls || vertical_walls, "door at {pos} is not in a wall gap");
            }
        }
    }

    #[test]
    fn test_farthest_cell_on_corridor() {
        let grid = DungeonGrid::from_walk_grid(&WalkGrid::from_ascii(
            "#####
             #...#
             ###.#
             ###.#",
        ));
        assert_eq!(farthest_cell(&grid, Position::new(1, 1)), Position::new(3, 3));
    }
}
