//! # Connectivity Resolution
//!
//! Finds 4-connected walkable regions and carves passages until exactly one
//! remains.

use crate::{DelveError, DelveResult, Position, WalkGrid};
use rand::{rngs::StdRng, Rng};
use std::collections::VecDeque;

/// Groups walkable cells into 4-connected regions.
///
/// Regions are listed in the row-major order of their first cell, and the
/// cells of each region in flood-fill order.
pub fn find_regions(grid: &WalkGrid) -> Vec<Vec<Position>> {
    let mut visited = vec![false; grid.cells().len()];
    let index = |pos: Position| pos.y as usize * grid.width() as usize + pos.x as usize;
    let mut regions = Vec::new();

    for origin in grid.positions() {
        if !grid.get(origin) || visited[index(origin)] {
            continue;
        }

        let mut region = Vec::new();
        let mut queue = VecDeque::new();
        visited[index(origin)] = true;
        queue.push_back(origin);

        while let Some(pos) = queue.pop_front() {
            region.push(pos);
            for next in pos.cardinal_adjacent_positions() {
                if grid.get(next) && !visited[index(next)] {
                    visited[index(next)] = true;
                    queue.push_back(next);
                }
            }
        }

        regions.push(region);
    }

    regions
}

/// Carves a greedy Manhattan walk from `start` to `end`, marking every cell
/// on the way walkable. Each step moves along the axis with the larger
/// remaining distance (x on ties). Returns the number of newly opened cells.
pub fn carve_path(grid: &mut WalkGrid, start: Position, end: Position) -> usize {
    let mut carved = 0;
    let mut current = start;

    loop {
        if !grid.get(current) {
            grid.set(current, true);
            carved += 1;
        }
        if current == end {
            break;
        }
        let (dx, dy) = end - current;
        if dx.abs() >= dy.abs() {
            current.x += dx.signum();
        } else {
            current.y += dy.signum();
        }
    }

    carved
}

/// Summary of a connectivity pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub regions_before: usize,
    pub cells_carved: usize,
}

/// Merges every walkable region into one.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityResolver;

impl ConnectivityResolver {
    pub fn new() -> Self {
        Self
    }

    /// Joins each consecutive pair of regions through randomly chosen
    /// cells, then verifies a single region remains.
    ///
    /// A grid with no walkable cell gets its center opened instead.
    pub fn resolve(&self, grid: &mut WalkGrid, rng: &mut StdRng) -> DelveResult<ConnectivityReport> {
        let regions = find_regions(grid);
        let mut report = ConnectivityReport {
            regions_before: regions.len(),
            cells_carved: 0,
        };

        if regions.is_empty() {
            let center = Position::new(grid.width() as i32 / 2, grid.height() as i32 / 2);
            grid.set(center, true);
            report.cells_carved = 1;
        }

        for pair in regions.windows(2) {
            let from = pair[0][rng.gen_range(0..pair[0].len())];
            let to = pair[1][rng.gen_range(0..pair[1].len())];
            report.cells_carved += carve_path(grid, from, to);
        }

        let remaining = find_regions(grid).len();
        if remaining != 1 {
            return Err(DelveError::GenerationFailed(format!(
                "{} regions remain after connecting {}",
                remaining, report.regions_before
            )));
        }

        if report.regions_before > 1 {
            log::debug!(
                "joined {} regions by carving {} cells",
                report.regions_before,
                report.cells_carved
            );
        }
        Ok(report)
    }
}
