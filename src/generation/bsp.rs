//! # BSP Room Generation
//!
//! Recursively partitions the grid into a strict binary tree, places one room
//! per leaf and joins sibling subtrees with L-shaped corridors.

use crate::utils::bresenham_line;
use crate::{DelveError, DelveResult, GenerationConfig, Generator, Position, Room, WalkGrid};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

/// An axis-aligned region of the grid covered by a BSP node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn contains_room(&self, room: &Room) -> bool {
        let bottom_right = room.bottom_right();
        room.top_left.x >= self.x
            && room.top_left.y >= self.y
            && bottom_right.x < self.x + self.width as i32
            && bottom_right.y < self.y + self.height as i32
    }
}

/// A node of the partition tree. Either a leaf holding exactly one room or an
/// internal node with exactly two children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BspNode {
    Leaf {
        bounds: Rect,
        /// Index into [`BspLayout::rooms`]
        room: usize,
    },
    Split {
        bounds: Rect,
        children: Box<(BspNode, BspNode)>,
    },
}

impl BspNode {
    pub fn bounds(&self) -> Rect {
        match self {
            BspNode::Leaf { bounds, .. } | BspNode::Split { bounds, .. } => *bounds,
        }
    }

    /// Room indices held by the leaves under this node, left to right.
    pub fn room_indices(&self) -> Vec<usize> {
        let mut indices = Vec::new();
        self.collect_rooms(&mut indices);
        indices
    }

    fn collect_rooms(&self, out: &mut Vec<usize>) {
        match self {
            BspNode::Leaf { room, .. } => out.push(*room),
            BspNode::Split { children, .. } => {
                children.0.collect_rooms(out);
                children.1.collect_rooms(out);
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            BspNode::Leaf { .. } => 1,
            BspNode::Split { children, .. } => children.0.leaf_count() + children.1.leaf_count(),
        }
    }

    pub fn depth(&self) -> u32 {
        match self {
            BspNode::Leaf { .. } => 0,
            BspNode::Split { children, .. } => 1 + children.0.depth().max(children.1.depth()),
        }
    }
}

/// A corridor between two room centers. `bend` is the corner of the L.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corridor {
    pub from_room: u32,
    pub to_room: u32,
    pub start: Position,
    pub bend: Position,
    pub end: Position,
}

impl Corridor {
    /// Every cell of both segments, start to end. The bend appears once.
    pub fn cells(&self) -> Vec<Position> {
        let mut cells = bresenham_line(self.start, self.bend);
        cells.extend(bresenham_line(self.bend, self.end).into_iter().skip(1));
        cells
    }
}

/// Output of the BSP generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BspLayout {
    pub grid: WalkGrid,
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub tree: BspNode,
}

/// Binary space partition room generator.
#[derive(Debug, Clone, Default)]
pub struct BspGenerator;

impl BspGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Splits `bounds` until the depth limit or until neither axis can hold
    /// two minimum leaves.
    fn partition(
        &self,
        bounds: Rect,
        depth: u32,
        config: &GenerationConfig,
        rng: &mut StdRng,
        rooms: &mut Vec<Room>,
        corridors: &mut Vec<Corridor>,
    ) -> BspNode {
        let min_leaf = config.min_leaf_size();
        let can_split_x = bounds.width >= 2 * min_leaf;
        let can_split_y = bounds.height >= 2 * min_leaf;

        if depth >= config.max_depth || (!can_split_x && !can_split_y) {
            let room = self.place_room(bounds, config, rng, rooms.len() as u32);
            rooms.push(room);
            return BspNode::Leaf {
                bounds,
                room: rooms.len() - 1,
            };
        }

        // Draw the axis first, then fall back to the other one if it is too short.
        let vertical_cut = rng.gen_bool(0.5);
        let vertical_cut = match (vertical_cut, can_split_x, can_split_y) {
            (true, false, _) => false,
            (false, _, false) => true,
            (choice, _, _) => choice,
        };

        let (first, second) = if vertical_cut {
            let offset = rng.gen_range(min_leaf..=bounds.width - min_leaf);
            (
                Rect::new(bounds.x, bounds.y, offset, bounds.height),
                Rect::new(bounds.x + offset as i32, bounds.y, bounds.width - offset, bounds.height),
            )
        } else {
            let offset = rng.gen_range(min_leaf..=bounds.height - min_leaf);
            (
                Rect::new(bounds.x, bounds.y, bounds.width, offset),
                Rect::new(bounds.x, bounds.y + offset as i32, bounds.width, bounds.height - offset),
            )
        };

        let left = self.partition(first, depth + 1, config, rng, rooms, corridors);
        let right = self.partition(second, depth + 1, config, rng, rooms, corridors);

        if let Some(corridor) = self.join_subtrees(&left, &right, rooms, rng) {
            corridors.push(corridor);
        }

        BspNode::Split {
            bounds,
            children: Box::new((left, right)),
        }
    }

    /// Places a random room inside the padded leaf.
    fn place_room(&self, leaf: Rect, config: &GenerationConfig, rng: &mut StdRng, id: u32) -> Room {
        let pad = config.room_padding;
        let inner_width = leaf.width - 2 * pad;
        let inner_height = leaf.height - 2 * pad;

        let width = rng.gen_range(config.min_room_size..=inner_width.min(config.max_room_size));
        let height = rng.gen_range(config.min_room_size..=inner_height.min(config.max_room_size));
        let x = leaf.x + pad as i32 + rng.gen_range(0..=inner_width - width) as i32;
        let y = leaf.y + pad as i32 + rng.gen_range(0..=inner_height - height) as i32;

        Room::new(id, Position::new(x, y), width, height)
    }

    /// Connects the closest pair of rooms (by center distance) across two
    /// sibling subtrees.
    fn join_subtrees(
        &self,
        left: &BspNode,
        right: &BspNode,
        rooms: &mut [Room],
        rng: &mut StdRng,
    ) -> Option<Corridor> {
        let left_rooms = left.room_indices();
        let right_rooms = right.room_indices();

        let mut best: Option<(u32, usize, usize)> = None;
        for &a in &left_rooms {
            for &b in &right_rooms {
                let distance = rooms[a].center().manhattan_distance(rooms[b].center());
                if best.map_or(true, |(d, _, _)| distance < d) {
                    best = Some((distance, a, b));
                }
            }
        }
        let (_, a, b) = best?;

        let start = rooms[a].center();
        let end = rooms[b].center();
        let bend = if rng.gen_bool(0.5) {
            Position::new(end.x, start.y)
        } else {
            Position::new(start.x, end.y)
        };

        let (id_a, id_b) = (rooms[a].id, rooms[b].id);
        rooms[a].add_connection(id_b);
        rooms[b].add_connection(id_a);

        Some(Corridor {
            from_room: id_a,
            to_room: id_b,
            start,
            bend,
            end,
        })
    }
}

impl Generator<BspLayout> for BspGenerator {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<BspLayout> {
        config.validate()?;

        let bounds = Rect::new(0, 0, config.width, config.height);
        let mut rooms = Vec::new();
        let mut corridors = Vec::new();
        let tree = self.partition(bounds, 0, config, rng, &mut rooms, &mut corridors);

        let mut grid = WalkGrid::new(config.width, config.height);
        for room in &rooms {
            for pos in room.positions() {
                grid.set(pos, true);
            }
        }
        for corridor in &corridors {
            for pos in corridor.cells() {
                grid.set(pos, true);
            }
        }

        log::debug!(
            "BSP produced {} rooms and {} corridors (depth {})",
            rooms.len(),
            corridors.len(),
            tree.depth()
        );

        let layout = BspLayout {
            grid,
            rooms,
            corridors,
            tree,
        };
        self.validate(&layout, config)?;
        Ok(layout)
    }

    fn validate(&self, layout: &BspLayout, config: &GenerationConfig) -> DelveResult<()> {
        if layout.tree.leaf_count() != layout.rooms.len() {
            return Err(DelveError::GenerationFailed(format!(
                "{} leaves but {} rooms",
                layout.tree.leaf_count(),
                layout.rooms.len()
            )));
        }
        if layout.corridors.len() + 1 != layout.rooms.len() {
            return Err(DelveError::GenerationFailed(format!(
                "{} rooms joined by {} corridors",
                layout.rooms.len(),
                layout.corridors.len()
            )));
        }
        for room in &layout.rooms {
            let in_range = |side: u32| (config.min_room_size..=config.max_room_size).contains(&side);
            if !in_range(room.width) || !in_range(room.height) {
                return Err(DelveError::GenerationFailed(format!(
                    "room {} is {}x{}, outside [{}, {}]",
                    room.id, room.width, room.height, config.min_room_size, config.max_room_size
                )));
            }
        }
        for (i, room) in layout.rooms.iter().enumerate() {
            if let Some(other) = layout.rooms[i + 1..].iter().find(|other| room.overlaps(other)) {
                return Err(DelveError::GenerationFailed(format!(
                    "rooms {} and {} overlap",
                    room.id, other.id
                )));
            }
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "BspGenerator"
    }
}
