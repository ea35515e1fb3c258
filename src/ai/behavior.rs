//! # Behavior Selector
//!
//! Rule-based NPC movement. Each behavior class maps what the NPC perceives to
//! one legal step:
//!
//! - **hostile**: pursue the player along the A* path while the player is
//!   visible, otherwise wander
//! - **passive**: step directly away from a visible player, otherwise wander
//! - **neutral**: always wander
//!
//! Wandering picks uniformly among the open cardinal neighbours and holds
//! still when there are none. Every failure path ends in wandering on the
//! same NPC, so the selector always yields a direction.

use crate::utils::{can_see, Pathfinder};
use crate::{
    AiBehaviorComponent, BehaviorClass, ComponentKind, Direction, DungeonGrid, EntityId,
    GameState, Position,
};
use rand::{rngs::StdRng, seq::SliceRandom};
use std::collections::HashSet;

/// What one NPC knows when choosing a step.
#[derive(Debug, Clone)]
pub struct Perception<'a> {
    pub grid: &'a DungeonGrid,
    pub position: Position,
    pub behavior: BehaviorClass,
    pub vision_range: u32,
    pub player: Option<Position>,
    /// Cells held by other NPCs
    pub blocked: HashSet<Position>,
}

impl<'a> Perception<'a> {
    pub fn new(grid: &'a DungeonGrid, position: Position, behavior: BehaviorClass, vision_range: u32) -> Self {
        Self {
            grid,
            position,
            behavior,
            vision_range,
            player: None,
            blocked: HashSet::new(),
        }
    }

    pub fn with_player(mut self, player: Position) -> Self {
        self.player = Some(player);
        self
    }

    pub fn with_blocked(mut self, cells: impl IntoIterator<Item = Position>) -> Self {
        self.blocked.extend(cells);
        self
    }

    /// Perception of `npc` in a game snapshot.
    pub fn from_state(state: &'a GameState, npc: EntityId) -> Option<Self> {
        let ai = state.entities.get::<AiBehaviorComponent>(npc)?;
        let position = state.entities.position_of(npc)?;
        let blocked = state
            .entities
            .with_component(ComponentKind::Position)
            .filter(|&other| other != npc && other != state.player_id)
            .filter_map(|other| state.entities.position_of(other));

        let perception = Self::new(&state.grid, position, ai.behavior, ai.vision_range).with_blocked(blocked);
        Some(match state.player_position() {
            Some(player) => perception.with_player(player),
            None => perception,
        })
    }

    /// Whether the NPC may step onto `pos`. The player's cell counts as open.
    pub fn can_enter(&self, pos: Position) -> bool {
        self.grid.is_walkable(pos) && !self.blocked.contains(&pos)
    }

    /// The player's position if it is within vision range and line of sight.
    pub fn visible_player(&self) -> Option<Position> {
        self.player
            .filter(|&player| can_see(self.grid, self.position, player, self.vision_range))
    }
}

/// Maps behavior class and perception to a step.
#[derive(Debug, Clone, Default)]
pub struct BehaviorSelector {
    pathfinder: Pathfinder,
}

impl BehaviorSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pathfinder(pathfinder: Pathfinder) -> Self {
        Self { pathfinder }
    }

    /// The rule-based step for this NPC.
    pub fn select(&self, perception: &Perception<'_>, rng: &mut StdRng) -> Direction {
        match perception.behavior {
            BehaviorClass::Hostile if perception.visible_player().is_some() => self.pursue(perception, rng),
            BehaviorClass::Passive if perception.visible_player().is_some() => self.flee(perception, rng),
            _ => self.wander(perception, rng),
        }
    }

    /// First step of the shortest path to the player; wanders when there is
    /// no player or no path.
    pub fn pursue(&self, perception: &Perception<'_>, rng: &mut StdRng) -> Direction {
        let Some(player) = perception.player else {
            return self.wander(perception, rng);
        };
        match self
            .pathfinder
            .next_step(perception.position, player, |pos| perception.can_enter(pos))
        {
            Some(step) => step,
            None => {
                log::trace!("no path from {} to player at {}", perception.position, player);
                self.wander(perception, rng)
            }
        }
    }

    /// One cardinal step away from the player, trying the axis with the
    /// larger separation first (x on ties). Falls through to wandering when
    /// both candidate cells are closed or the NPC shares the player's cell.
    pub fn flee(&self, perception: &Perception<'_>, rng: &mut StdRng) -> Direction {
        let Some(player) = perception.player else {
            return self.wander(perception, rng);
        };
        let (dx, dy) = perception.position - player;
        let away_x = Direction::towards((dx, 0));
        let away_y = Direction::towards((0, dy));
        let candidates = if dx.abs() >= dy.abs() {
            [away_x, away_y]
        } else {
            [away_y, away_x]
        };

        candidates
            .into_iter()
            .filter(|step| !step.is_none())
            .find(|&step| perception.can_enter(perception.position.step(step)))
            .unwrap_or_else(|| self.wander(perception, rng))
    }

    /// Uniform choice among open cardinal neighbours; holds when boxed in.
    pub fn wander(&self, perception: &Perception<'_>, rng: &mut StdRng) -> Direction {
        let open: Vec<Direction> = Direction::CARDINALS
            .into_iter()
            .filter(|&step| perception.can_enter(perception.position.step(step)))
            .collect();
        open.choose(rng).copied().unwrap_or(Direction::NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::utils::create_rng;
    use crate::WalkGrid;

    /// A vertical corridor from (5, 1) down to (5, 8) with side pockets.
    fn corridor(wall_at: Option<Position>) -> DungeonGrid {
        let mut walk = WalkGrid::new(11, 10);
        for y in 1..9 {
            walk.set(Position::new(5, y), true);
        }
        walk.set(Position::new(4, 5), true);
        walk.set(Position::new(6, 5), true);
        if let Some(pos) = wall_at {
            walk.set(pos, false);
        }
        DungeonGrid::from_walk_grid(&walk)
    }

    fn open_steps(perception: &Perception<'_>) -> Vec<Direction> {
        Direction::CARDINALS
            .into_iter()
            .filter(|&d| perception.can_enter(perception.position.step(d)))
            .collect()
    }

    #[test]
    fn test_hostile_pursues_visible_player() {
        let grid = corridor(None);
        let perception = Perception::new(&grid, Position::new(5, 5), BehaviorClass::Hostile, 8)
            .with_player(Position::new(5, 1));
        let step = BehaviorSelector::new().select(&perception, &mut create_rng(1));
        assert_eq!(step.dy, -1);
        assert_eq!(step.dx, 0);
    }

    #[test]
    fn test_hostile_wanders_when_sight_is_blocked() {
        let grid = corridor(Some(Position::new(5, 3)));
        let perception = Perception::new(&grid, Position::new(5, 5), BehaviorClass::Hostile, 8)
            .with_player(Position::new(5, 1));
        assert!(perception.visible_player().is_none());

        let allowed = open_steps(&perception);
        for seed in 0..20 {
            let step = BehaviorSelector::new().select(&perception, &mut create_rng(seed));
            assert!(allowed.contains(&step), "{step:?} is not a wander step");
        }
    }

    #[test]
    fn test_hostile_out_of_range_wanders() {
        let grid = corridor(None);
        let perception = Perception::new(&grid, Position::new(5, 8), BehaviorClass::Hostile, 3)
            .with_player(Position::new(5, 1));
        assert!(perception.visible_player().is_none());
    }

    #[test]
    fn test_passive_flees_along_larger_axis() {
        let grid = DungeonGrid::from_walk_grid(&WalkGrid::from_ascii(
            "#######
             #.....#
             #.....#
             #.....#
             #######",
        ));
        let perception = Perception::new(&grid, Position::new(3, 2), BehaviorClass::Passive, 8)
            .with_player(Position::new(1, 1));
        assert_eq!(
            BehaviorSelector::new().select(&perception, &mut create_rng(1)),
            Direction::EAST
        );

        // East is walled off: the y axis is tried next.
        let perception = Perception::new(&grid, Position::new(5, 2), BehaviorClass::Passive, 8)
            .with_player(Position::new(2, 1));
        assert_eq!(
            BehaviorSelector::new().select(&perception, &mut create_rng(1)),
            Direction::SOUTH
        );
    }

    #[test]
    fn test_cornered_passive_falls_through_to_wander() {
        let grid = DungeonGrid::from_walk_grid(&WalkGrid::from_ascii(
            "#####
             #...#
             #...#
             #####",
        ));
        let perception = Perception::new(&grid, Position::new(3, 2), BehaviorClass::Passive, 8)
            .with_player(Position::new(1, 1));
        let allowed = open_steps(&perception);
        let step = BehaviorSelector::new().select(&perception, &mut create_rng(4));
        assert!(allowed.contains(&step));
    }

    #[test]
    fn test_boxed_in_npc_holds() {
        let grid = DungeonGrid::from_walk_grid(&WalkGrid::from_ascii(
            "###
             #.#
             ###",
        ));
        let perception = Perception::new(&grid, Position::new(1, 1), BehaviorClass::Neutral, 8);
        assert_eq!(
            BehaviorSelector::new().select(&perception, &mut create_rng(1)),
            Direction::NONE
        );
    }

    #[test]
    fn test_wander_avoids_other_npcs() {
        let grid = corridor(None);
        let perception = Perception::new(&grid, Position::new(5, 2), BehaviorClass::Neutral, 8)
            .with_blocked([Position::new(5, 3)]);
        for seed in 0..10 {
            assert_eq!(
                BehaviorSelector::new().select(&perception, &mut create_rng(seed)),
                Direction::NORTH
            );
        }
    }

    #[test]
    fn test_wander_is_reproducible() {
        let grid = corridor(None);
        let perception = Perception::new(&grid, Position::new(5, 5), BehaviorClass::Neutral, 8);
        let selector = BehaviorSelector::new();
        let first: Vec<_> = (0..8).map(|s| selector.select(&perception, &mut create_rng(s))).collect();
        let second: Vec<_> = (0..8).map(|s| selector.select(&perception, &mut create_rng(s))).collect();
        assert_eq!(first, second);
    }
}
