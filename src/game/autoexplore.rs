//! # Autoexplore Module
//!
//! Drives the player automatically: walk to the stairs, take them, repeat.
//! Used by the headless binary and by long-running tests.

use crate::utils::Pathfinder;
use crate::{DelveError, DelveResult, Direction, GameState, PlayerCommand, Position, TileType};
use std::collections::VecDeque;

/// Autopilot state: the path being followed and where it leads.
#[derive(Debug, Clone, Default)]
pub struct Autopilot {
    /// Whether the autopilot issues commands at all
    pub enabled: bool,
    pathfinder: Pathfinder,
    /// Remaining steps, excluding the player's cell
    pub current_path: VecDeque<Position>,
    pub target: Option<Position>,
}

impl Autopilot {
    /// Creates an enabled autopilot.
    pub fn new() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    /// Toggles the autopilot on/off. Turning it off forgets the path.
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        if !self.enabled {
            self.current_path.clear();
            self.target = None;
        }
        self.enabled
    }

    /// The command to submit this player turn.
    ///
    /// Descends when standing on the stairs, otherwise takes the next step
    /// toward them. NPCs in the way are routed around when possible and
    /// attacked when not. Waits when disabled or when no route exists.
    pub fn next_command(&mut self, state: &GameState) -> DelveResult<PlayerCommand> {
        if !self.enabled {
            return Ok(PlayerCommand::Wait);
        }

        let player_pos = state
            .player_position()
            .ok_or_else(|| DelveError::InvalidState("No player found".to_string()))?;

        let on_stairs = state
            .grid
            .get_tile(player_pos)
            .map_or(false, |tile| tile.tile_type == TileType::Stairs);
        if on_stairs {
            self.current_path.clear();
            self.target = None;
            return Ok(PlayerCommand::Descend);
        }

        let Some(stairs) = state.stairs else {
            return Ok(PlayerCommand::Wait);
        };
        if self.target != Some(stairs) {
            self.current_path.clear();
            self.target = Some(stairs);
        }

        // Follow the cached path while it is still valid.
        if let Some(step) = self.step_along(state, player_pos, true) {
            return Ok(PlayerCommand::Move(step));
        }

        self.current_path = self.plan(state, player_pos, stairs);
        if self.current_path.is_empty() {
            log::debug!("autopilot found no route from {} to {}", player_pos, stairs);
            return Ok(PlayerCommand::Wait);
        }
        Ok(self
            .step_along(state, player_pos, false)
            .map_or(PlayerCommand::Wait, PlayerCommand::Move))
    }

    /// Pops the next path cell if it is adjacent to the player. With
    /// `replan_if_blocked`, an NPC on the path discards it instead.
    fn step_along(
        &mut self,
        state: &GameState,
        player_pos: Position,
        replan_if_blocked: bool,
    ) -> Option<Direction> {
        let next = *self.current_path.front()?;
        let direction = Direction::new(next.x - player_pos.x, next.y - player_pos.y)
            .filter(|d| !d.is_none() && d.is_cardinal_or_none());
        let Some(direction) = direction else {
            self.current_path.clear();
            return None;
        };

        // An NPC stepped onto the path: replan unless it stands on the goal.
        if replan_if_blocked && state.entity_at(next).is_some() && self.current_path.len() > 1 {
            self.current_path.clear();
            return None;
        }

        self.current_path.pop_front();
        Some(direction)
    }

    /// A route that avoids NPCs if one exists, otherwise one through them.
    fn plan(&self, state: &GameState, start: Position, goal: Position) -> VecDeque<Position> {
        let around = self.pathfinder.find_path(start, goal, |pos| {
            state.grid.is_walkable(pos) && (pos == goal || state.entity_at(pos).is_none())
        });
        around
            .or_else(|| {
                self.pathfinder
                    .find_path(start, goal, |pos| state.grid.is_walkable(pos))
            })
            .map(VecDeque::from)
            .unwrap_or_default()
    }
}
