//! # Cave Refinement
//!
//! Cellular-automaton smoothing. Seeds a random wall field (or takes an
//! existing grid) and repeatedly applies the wall-count rule to every cell
//! simultaneously.

use crate::{CaveConfig, DelveError, DelveResult, GenerationConfig, Generator, Position, WalkGrid};
use rand::{rngs::StdRng, Rng};

/// Cellular automaton over a [`WalkGrid`].
#[derive(Debug, Clone)]
pub struct CaveRefiner {
    pub config: CaveConfig,
}

impl Default for CaveRefiner {
    fn default() -> Self {
        Self::new(CaveConfig::default())
    }
}

impl CaveRefiner {
    pub fn new(config: CaveConfig) -> Self {
        Self { config }
    }

    /// Fills a grid where each cell is wall with the configured probability.
    pub fn seed_grid(&self, width: u32, height: u32, rng: &mut StdRng) -> WalkGrid {
        let mut grid = WalkGrid::new(width, height);
        let p = self.config.initial_wall_probability;
        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let wall = rng.gen_bool(p);
                grid.set(Position::new(x, y), !wall);
            }
        }
        grid
    }

    /// Number of the 8 surrounding cells that are walls. Cells outside the
    /// grid count as walls.
    pub fn wall_neighbors(grid: &WalkGrid, pos: Position) -> u32 {
        let mut walls = 0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                if !grid.get(Position::new(pos.x + dx, pos.y + dy)) {
                    walls += 1;
                }
            }
        }
        walls
    }

    /// One synchronous smoothing pass.
    ///
    /// Cells with at least `survival_threshold` wall neighbours become wall,
    /// cells with at most `birth_threshold` become floor, and the rest keep
    /// their state.
    pub fn step(&self, grid: &WalkGrid) -> WalkGrid {
        let mut next = grid.clone();
        for pos in grid.positions() {
            let walls = Self::wall_neighbors(grid, pos);
            if walls >= self.config.survival_threshold {
                next.set(pos, false);
            } else if walls <= self.config.birth_threshold {
                next.set(pos, true);
            }
        }
        next
    }

    /// Applies `iterations` smoothing passes.
    pub fn smooth(&self, grid: &WalkGrid, iterations: u32) -> WalkGrid {
        let mut current = grid.clone();
        for _ in 0..iterations {
            current = self.step(&current);
        }
        current
    }

    /// Forces the outermost ring of cells to wall.
    pub fn seal_border(grid: &mut WalkGrid) {
        let (w, h) = (grid.width() as i32, grid.height() as i32);
        for x in 0..w {
            grid.set(Position::new(x, 0), false);
            grid.set(Position::new(x, h - 1), false);
        }
        for y in 0..h {
            grid.set(Position::new(0, y), false);
            grid.set(Position::new(w - 1, y), false);
        }
    }
}

impl Generator<WalkGrid> for CaveRefiner {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<WalkGrid> {
        self.config.validate()?;

        let seeded = self.seed_grid(config.width, config.height, rng);
        let mut grid = self.smooth(&seeded, self.config.iterations);
        Self::seal_border(&mut grid);

        if grid.count_walkable() == 0 {
            let center = Position::new(config.width as i32 / 2, config.height as i32 / 2);
            log::debug!("cave collapsed to solid rock; opening {}", center);
            grid.set(center, true);
        }

        self.validate(&grid, config)?;
        Ok(grid)
    }

    fn validate(&self, grid: &WalkGrid, config: &GenerationConfig) -> DelveResult<()> {
        if grid.width() != config.width || grid.height() != config.height {
            return Err(DelveError::GenerationFailed(format!(
                "cave is {}x{}, expected {}x{}",
                grid.width(),
                grid.height(),
                config.width,
                config.height
            )));
        }
        if grid.count_walkable() == 0 {
            return Err(DelveError::GenerationFailed("cave has no floor".to_string()));
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "CaveRefiner"
    }
}
