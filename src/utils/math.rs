//! # Grid Geometry
//!
//! Line rasterization and line-of-sight over the tile grid.

use crate::{DungeonGrid, Position};

/// Rasterizes the segment between two cells with Bresenham's algorithm.
///
/// Both endpoints are included and the cells are ordered from `start` to
/// `end`. Consecutive cells may be diagonal neighbours unless the segment is
/// axis-aligned.
///
/// # Examples
///
/// ```
/// use delve::{bresenham_line, Position};
///
/// let line = bresenham_line(Position::new(0, 0), Position::new(3, 0));
/// assert_eq!(line.len(), 4);
/// assert_eq!(line[3], Position::new(3, 0));
/// ```
pub fn bresenham_line(start: Position, end: Position) -> Vec<Position> {
    let dx = (end.x - start.x).abs();
    let dy = -(end.y - start.y).abs();
    let sx = if start.x < end.x { 1 } else { -1 };
    let sy = if start.y < end.y { 1 } else { -1 };

    let mut points = Vec::with_capacity(dx.max(-dy) as usize + 1);
    let mut err = dx + dy;
    let (mut x, mut y) = (start.x, start.y);

    loop {
        points.push(Position::new(x, y));
        if x == end.x && y == end.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }

    points
}

/// Walks the Bresenham ray from `from` to `to` and reports whether every
/// intermediate cell is transparent.
///
/// The endpoints themselves are never tested, so a viewer standing in a
/// doorway can still see out and a target behind nothing is always visible.
/// The walk fails closed: the first opaque cell ends it.
pub fn line_of_sight<F>(from: Position, to: Position, is_transparent: F) -> bool
where
    F: Fn(Position) -> bool,
{
    let ray = bresenham_line(from, to);
    if ray.len() <= 2 {
        return true;
    }
    ray[1..ray.len() - 1].iter().all(|&cell| is_transparent(cell))
}

/// Whether `viewer` can see `target` on `grid` within `range` (Manhattan).
///
/// Out-of-bounds cells are opaque.
pub fn can_see(grid: &DungeonGrid, viewer: Position, target: Position, range: u32) -> bool {
    viewer.manhattan_distance(target) <= range
        && line_of_sight(viewer, target, |cell| grid.is_transparent(cell))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::WalkGrid;

    #[test]
    fn test_line_endpoints_and_order() {
        let line = bresenham_line(Position::new(2, 3), Position::new(7, 5));
        assert_eq!(line.first(), Some(&Position::new(2, 3)));
        assert_eq!(line.last(), Some(&Position::new(7, 5)));
        assert_eq!(line.len(), 6);

        let reversed = bresenham_line(Position::new(7, 5), Position::new(2, 3));
        assert_eq!(reversed.first(), Some(&Position::new(7, 5)));
        assert_eq!(reversed.last(), Some(&Position::new(2, 3)));
    }

    #[test]
    fn test_axis_aligned_lines_are_contiguous() {
        let line = bresenham_line(Position::new(4, 1), Position::new(4, 6));
        assert_eq!(line.len(), 6);
        for pair in line.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
    }

    #[test]
    fn test_single_point_line() {
        let pos = Position::new(3, 3);
        assert_eq!(bresenham_line(pos, pos), vec![pos]);
    }

    #[test]
    fn test_line_of_sight_ignores_endpoints() {
        let opaque = |_: Position| false;
        assert!(line_of_sight(Position::new(0, 0), Position::new(1, 0), opaque));
        assert!(!line_of_sight(Position::new(0, 0), Position::new(2, 0), opaque));
    }

    #[test]
    fn test_wall_blocks_sight() {
        let grid = DungeonGrid::from_walk_grid(&WalkGrid::from_ascii(
            "#######
             #..#..#
             #.....#
             #######",
        ));

        assert!(!can_see(&grid, Position::new(1, 1), Position::new(5, 1), 8));
        assert!(can_see(&grid, Position::new(1, 2), Position::new(5, 2), 8));
        assert!(!can_see(&grid, Position::new(1, 2), Position::new(5, 2), 3));
    }
}
