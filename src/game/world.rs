//! # Dungeon Grid
//!
//! Tiles and the fixed-size grid a level is played on.
//!
//! A [`DungeonGrid`] is produced once by the level generator and is never
//! modified afterwards; the scheduler shares it behind an `Arc` so snapshots
//! stay cheap.

use crate::generation::{connectivity, WalkGrid};
use crate::Position;
use serde::{Deserialize, Serialize};

/// The kind of terrain occupying a grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileType {
    Floor,
    Wall,
    Door,
    Stairs,
}

impl TileType {
    /// Whether an entity may stand on this tile.
    pub fn is_walkable(self) -> bool {
        matches!(self, TileType::Floor | TileType::Door | TileType::Stairs)
    }

    /// Whether line of sight passes through this tile.
    pub fn is_transparent(self) -> bool {
        matches!(self, TileType::Floor | TileType::Stairs)
    }

    /// ASCII glyph used by diagnostic dumps.
    pub fn glyph(self) -> char {
        match self {
            TileType::Floor => '.',
            TileType::Wall => '#',
            TileType::Door => '+',
            TileType::Stairs => '>',
        }
    }
}

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile {
    pub tile_type: TileType,
}

impl Tile {
    /// Creates a tile of the given type.
    pub fn new(tile_type: TileType) -> Self {
        Self { tile_type }
    }

    /// Creates a floor tile.
    pub fn floor() -> Self {
        Self::new(TileType::Floor)
    }

    /// Creates a wall tile.
    pub fn wall() -> Self {
        Self::new(TileType::Wall)
    }

    pub fn is_walkable(&self) -> bool {
        self.tile_type.is_walkable()
    }

    pub fn is_transparent(&self) -> bool {
        self.tile_type.is_transparent()
    }
}

/// The immutable 2D tile array of one dungeon level.
///
/// Cells outside the grid are neither walkable nor transparent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DungeonGrid {
    width: u32,
    height: u32,
    tiles: Vec<Tile>,
}

impl DungeonGrid {
    /// Creates a grid filled with walls.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Tile::wall(); (width * height) as usize],
        }
    }

    /// Builds a grid from a boolean walk grid: walkable cells become floor,
    /// everything else wall.
    pub fn from_walk_grid(walk: &WalkGrid) -> Self {
        let tiles = walk
            .cells()
            .iter()
            .map(|&open| if open { Tile::floor() } else { Tile::wall() })
            .collect();

        Self {
            width: walk.width(),
            height: walk.height(),
            tiles,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Checks whether a position lies inside the grid.
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

    /// Gets the tile at a position, if it is inside the grid.
    pub fn get_tile(&self, pos: Position) -> Option<&Tile> {
        self.index(pos).and_then(|idx| self.tiles.get(idx))
    }

    /// Whether the tile storage covers exactly `width * height` cells.
    ///
    /// Always true for generated grids; a deserialized grid may not be.
    pub fn is_well_formed(&self) -> bool {
        self.tiles.len() == self.width as usize * self.height as usize
    }

    /// Replaces a tile. Only the generator writes tiles, before the grid is shared.
    pub(crate) fn set_tile(&mut self, pos: Position, tile: Tile) -> bool {
        match self.index(pos).and_then(|idx| self.tiles.get_mut(idx)) {
            Some(slot) => {
                *slot = tile;
                true
            }
            None => false,
        }
    }

    pub fn is_walkable(&self, pos: Position) -> bool {
        self.get_tile(pos).map(Tile::is_walkable).unwrap_or(false)
    }

    pub fn is_transparent(&self, pos: Position) -> bool {
        self.get_tile(pos).map(Tile::is_transparent).unwrap_or(false)
    }

    /// All walkable positions in row-major order.
    pub fn walkable_cells(&self) -> Vec<Position> {
        self.positions().filter(|&pos| self.is_walkable(pos)).collect()
    }

    /// All positions in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }

    /// Boolean walkability mask of this grid.
    pub fn walkable_mask(&self) -> WalkGrid {
        let mut walk = WalkGrid::new(self.width, self.height);
        for pos in self.positions() {
            if self.is_walkable(pos) {
                walk.set(pos, true);
            }
        }
        walk
    }

    /// Number of 4-connected walkable regions. A finished level always has one.
    pub fn count_regions(&self) -> usize {
        connectivity::find_regions(&self.walkable_mask()).len()
    }

    /// Renders the grid as one line of glyphs per row.
    pub fn to_ascii(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for row in self.tiles.chunks(self.width.max(1) as usize) {
            out.extend(row.iter().map(|tile| tile.tile_type.glyph()));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corridor_grid() -> DungeonGrid {
        let mut walk = WalkGrid::new(6, 3);
        for x in 1..5 {
            walk.set(Position::new(x, 1), true);
        }
        DungeonGrid::from_walk_grid(&walk)
    }

    #[test]
    fn test_tile_flags() {
        assert!(TileType::Floor.is_walkable());
        assert!(TileType::Door.is_walkable());
        assert!(!TileType::Door.is_transparent());
        assert!(TileType::Stairs.is_transparent());
        assert!(!TileType::Wall.is_walkable());
        assert!(!TileType::Wall.is_transparent());
    }

    #[test]
    fn test_grid_bounds() {
        let grid = corridor_grid();
        assert!(grid.in_bounds(Position::new(0, 0)));
        assert!(grid.in_bounds(Position::new(5, 2)));
        assert!(!grid.in_bounds(Position::new(6, 2)));
        assert!(!grid.in_bounds(Position::new(-1, 0)));
        assert!(grid.get_tile(Position::new(0, 3)).is_none());
        assert!(!grid.is_walkable(Position::new(-3, 1)));
    }

    #[test]
    fn test_from_walk_grid() {
        let grid = corridor_grid();
        assert_eq!(grid.walkable_cells().len(), 4);
        assert!(grid.is_walkable(Position::new(1, 1)));
        assert!(!grid.is_walkable(Position::new(0, 1)));
        assert_eq!(grid.count_regions(), 1);
        assert_eq!(grid.walkable_mask(), {
            let mut walk = WalkGrid::new(6, 3);
            for x in 1..5 {
                walk.set(Position::new(x, 1), true);
            }
            walk
        });
    }

    #[test]
    fn test_ascii_dump() {
        let mut grid = corridor_grid();
        grid.set_tile(Position::new(4, 1), Tile::new(TileType::Stairs));
        assert_eq!(grid.to_ascii(), "######\n#...>#\n######\n");
    }

    #[test]
    fn test_short_tile_array_does_not_panic() {
        let grid: DungeonGrid =
            serde_json::from_str(r#"{"width": 4, "height": 3, "tiles": [{"tile_type": "Floor"}]}"#)
                .unwrap();
        assert!(!grid.is_well_formed());
        assert!(grid.is_walkable(Position::new(0, 0)));
        assert!(grid.get_tile(Position::new(3, 2)).is_none());
        assert!(!grid.is_walkable(Position::new(2, 1)));
        assert!(corridor_grid().is_well_formed());
    }
}
