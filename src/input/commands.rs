//! # Command Definitions
//!
//! The commands a player can submit to the turn scheduler.

use crate::Direction;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One player action for one player turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    /// Step in a cardinal direction; bumping an NPC attacks it
    Move(Direction),
    /// Pass the turn
    Wait,
    /// Take the stairs under the player
    Descend,
}

impl PlayerCommand {
    pub fn north() -> Self {
        PlayerCommand::Move(Direction::NORTH)
    }

    pub fn south() -> Self {
        PlayerCommand::Move(Direction::SOUTH)
    }

    pub fn east() -> Self {
        PlayerCommand::Move(Direction::EAST)
    }

    pub fn west() -> Self {
        PlayerCommand::Move(Direction::WEST)
    }
}

impl fmt::Display for PlayerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayerCommand::Move(direction) => match *direction {
                Direction::NORTH => f.write_str("move north"),
                Direction::SOUTH => f.write_str("move south"),
                Direction::EAST => f.write_str("move east"),
                Direction::WEST => f.write_str("move west"),
                other => write!(f, "move ({}, {})", other.dx, other.dy),
            },
            PlayerCommand::Wait => f.write_str("wait"),
            PlayerCommand::Descend => f.write_str("descend"),
        }
    }
}
