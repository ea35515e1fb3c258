//! # Pathfinding
//!
//! Grid A* with a Manhattan heuristic over the 4 cardinal moves.
//!
//! Ties on `f` are broken by insertion order: the node pushed first is
//! expanded first, and a node whose cost improves keeps the sequence number it
//! was first pushed with. Neighbours are pushed in east, west, south, north
//! order. Together this makes the returned path a pure function of the grid,
//! which keeps NPC movement reproducible under a fixed seed.

use crate::config::MAX_PATH_EXPANSIONS;
use crate::{Direction, Position};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A* search over an arbitrary walkability predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pathfinder {
    /// Nodes expanded before the search gives up
    pub max_expansions: usize,
}

impl Default for Pathfinder {
    fn default() -> Self {
        Self::new()
    }
}

impl Pathfinder {
    pub fn new() -> Self {
        Self {
            max_expansions: MAX_PATH_EXPANSIONS,
        }
    }

    pub fn with_max_expansions(max_expansions: usize) -> Self {
        Self { max_expansions }
    }

    /// Finds a shortest path from `start` to `goal`.
    ///
    /// The returned cells exclude `start` and end with `goal`; a search where
    /// `start == goal` yields an empty path. `None` means the goal is not
    /// walkable, unreachable, or the expansion budget ran out.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Pathfinder, Position};
    ///
    /// let path = Pathfinder::new()
    ///     .find_path(Position::new(0, 0), Position::new(2, 0), |p| p.y == 0 && p.x >= 0)
    ///     .unwrap();
    /// assert_eq!(path, vec![Position::new(1, 0), Position::new(2, 0)]);
    /// ```
    pub fn find_path<F>(&self, start: Position, goal: Position, walkable: F) -> Option<Vec<Position>>
    where
        F: Fn(Position) -> bool,
    {
        if start == goal {
            return Some(Vec::new());
        }
        if !walkable(goal) {
            return None;
        }

        let mut open = BinaryHeap::new();
        let mut g_score: HashMap<Position, u32> = HashMap::new();
        let mut came_from: HashMap<Position, Position> = HashMap::new();
        let mut sequence: HashMap<Position, u64> = HashMap::new();
        let mut closed: HashSet<Position> = HashSet::new();
        let mut next_seq = 0u64;
        let mut expansions = 0usize;

        g_score.insert(start, 0);
        sequence.insert(start, next_seq);
        open.push(Reverse((start.manhattan_distance(goal), next_seq, start)));

        while let Some(Reverse((f, _, current))) = open.pop() {
            if closed.contains(&current) {
                continue;
            }
            let g = g_score.get(&current).copied().unwrap_or(u32::MAX);
            // Stale entry superseded by a cheaper push.
            if g.saturating_add(current.manhattan_distance(goal)) != f {
                continue;
            }
            if current == goal {
                return Some(reconstruct(&came_from, start, goal));
            }

            expansions += 1;
            if expansions > self.max_expansions {
                log::debug!(
                    "A* from {} to {} gave up after {} expansions",
                    start,
                    goal,
                    self.max_expansions
                );
                return None;
            }
            closed.insert(current);

            for neighbor in current.cardinal_adjacent_positions() {
                if closed.contains(&neighbor) || !walkable(neighbor) {
                    continue;
                }
                let tentative = g + 1;
                if g_score.get(&neighbor).map_or(true, |&known| tentative < known) {
                    g_score.insert(neighbor, tentative);
                    came_from.insert(neighbor, current);
                    let seq = match sequence.get(&neighbor) {
                        Some(&seq) => seq,
                        None => {
                            next_seq += 1;
                            sequence.insert(neighbor, next_seq);
                            next_seq
                        }
                    };
                    open.push(Reverse((
                        tentative + neighbor.manhattan_distance(goal),
                        seq,
                        neighbor,
                    )));
                }
            }
        }

        None
    }

    /// First step of the shortest path, or [`Direction::NONE`] when already
    /// at the goal.
    pub fn next_step<F>(&self, start: Position, goal: Position, walkable: F) -> Option<Direction>
    where
        F: Fn(Position) -> bool,
    {
        let path = self.find_path(start, goal, walkable)?;
        match path.first() {
            Some(&next) => Some(Direction::towards(next - start)),
            None => Some(Direction::NONE),
        }
    }
}

fn reconstruct(came_from: &HashMap<Position, Position>, start: Position, goal: Position) -> Vec<Position> {
    let mut path = vec![goal];
    let mut current = goal;
    while let Some(&prev) = came_from.get(&current) {
        if prev == start {
            break;
        }
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WalkGrid;

    fn walkable(grid: &WalkGrid) -> impl Fn(Position) -> bool + '_ {
        move |pos| grid.get(pos)
    }

    #[test]
    fn test_straight_corridor() {
        let grid = WalkGrid::from_ascii("..........");
        let path = Pathfinder::new()
            .find_path(Position::new(1, 0), Position::new(8, 0), walkable(&grid))
            .unwrap();
        assert_eq!(path.len(), 7);
        assert_eq!(path.last(), Some(&Position::new(8, 0)));
        assert!(!path.contains(&Position::new(1, 0)));
    }

    #[test]
    fn test_start_equals_goal() {
        let grid = WalkGrid::from_ascii("...");
        let finder = Pathfinder::new();
        let pos = Position::new(1, 0);
        assert_eq!(finder.find_path(pos, pos, walkable(&grid)), Some(Vec::new()));
        assert_eq!(finder.next_step(pos, pos, walkable(&grid)), Some(Direction::NONE));
    }

    #[test]
    fn test_routes_around_walls() {
        let grid = WalkGrid::from_ascii(
            ".....
             .###.
             .#...
             .#.#.
             ...#.",
        );
        let start = Position::new(2, 2);
        let goal = Position::new(0, 4);
        let path = Pathfinder::new()
            .find_path(start, goal, walkable(&grid))
            .unwrap();

        let mut previous = start;
        for &step in &path {
            assert!(grid.get(step));
            assert_eq!(previous.manhattan_distance(step), 1);
            previous = step;
        }
        assert_eq!(path.len(), 4);
    }

    #[test]
    fn test_unreachable_and_blocked_goals() {
        let grid = WalkGrid::from_ascii("..#..");
        let finder = Pathfinder::new();
        assert_eq!(
            finder.find_path(Position::new(0, 0), Position::new(4, 0), walkable(&grid)),
            None
        );
        assert_eq!(
            finder.find_path(Position::new(0, 0), Position::new(2, 0), walkable(&grid)),
            None
        );
    }

    #[test]
    fn test_equal_cost_paths_prefer_east_then_west_then_south_then_north() {
        // Two equally short routes; the east-first expansion must win.
        let grid = WalkGrid::from_ascii(
            "...
             ...",
        );
        let path = Pathfinder::new()
            .find_path(Position::new(0, 0), Position::new(1, 1), walkable(&grid))
            .unwrap();
        assert_eq!(path, vec![Position::new(1, 0), Position::new(1, 1)]);
    }

    #[test]
    fn test_expansion_budget() {
        let grid = WalkGrid::from_ascii(&".".repeat(50));
        let finder = Pathfinder::with_max_expansions(5);
        assert_eq!(
            finder.find_path(Position::new(0, 0), Position::new(49, 0), walkable(&grid)),
            None
        );
    }

    #[test]
    fn test_next_step_direction() {
        let grid = WalkGrid::from_ascii(".....");
        let step = Pathfinder::new().next_step(Position::new(3, 0), Position::new(0, 0), walkable(&grid));
        assert_eq!(step, Some(Direction::WEST));
    }
}
