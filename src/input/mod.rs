//! # Input Module
//!
//! Key parsing for player interactions.
//!
//! The core never reads a keyboard. Front ends hand key names to
//! [`InputHandler`] and submit the resulting [`PlayerCommand`] to the
//! scheduler.

pub mod commands;

pub use commands::*;

use crate::Direction;

/// Maps key names to player input.
#[derive(Debug, Clone)]
pub struct InputHandler {
    /// Whether to enable Vi-style movement keys (hjkl)
    pub vi_keys_enabled: bool,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    /// Creates a new input handler.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{InputHandler, PlayerCommand, PlayerInput};
    ///
    /// let input = InputHandler::new();
    /// assert_eq!(input.parse("j"), Some(PlayerInput::Command(PlayerCommand::south())));
    /// ```
    pub fn new() -> Self {
        Self {
            vi_keys_enabled: true,
        }
    }

    /// Parses one key name. Key names are case-insensitive; arrows are
    /// spelled `up`, `down`, `left` and `right`.
    pub fn parse(&self, key: &str) -> Option<PlayerInput> {
        let key = key.trim().to_ascii_lowercase();
        let command = match key.as_str() {
            "escape" | "esc" | "q" => return Some(PlayerInput::Quit),
            "?" | "f1" => return Some(PlayerInput::Help),

            // Movement keys - arrows and WASD
            "up" | "w" => PlayerCommand::Move(Direction::NORTH),
            "down" | "s" => PlayerCommand::Move(Direction::SOUTH),
            "left" | "a" => PlayerCommand::Move(Direction::WEST),
            "right" | "d" => PlayerCommand::Move(Direction::EAST),

            // Movement keys - Vi style
            "k" if self.vi_keys_enabled => PlayerCommand::Move(Direction::NORTH),
            "j" if self.vi_keys_enabled => PlayerCommand::Move(Direction::SOUTH),
            "h" if self.vi_keys_enabled => PlayerCommand::Move(Direction::WEST),
            "l" if self.vi_keys_enabled => PlayerCommand::Move(Direction::EAST),

            "." | "space" => PlayerCommand::Wait,
            ">" => PlayerCommand::Descend,
            _ => return None,
        };
        Some(PlayerInput::Command(command))
    }
}

/// Parses a key name with the default bindings, keeping only game commands.
pub fn parse_command(key: &str) -> Option<PlayerCommand> {
    match InputHandler::new().parse(key)? {
        PlayerInput::Command(command) => Some(command),
        _ => None,
    }
}

/// Player input types that can be processed by the input handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerInput {
    /// A command for the turn scheduler
    Command(PlayerCommand),
    /// Quit the game
    Quit,
    /// Show help information
    Help,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_bindings() {
        for (keys, direction) in [
            (["up", "w", "k"], Direction::NORTH),
            (["down", "s", "j"], Direction::SOUTH),
            (["left", "a", "h"], Direction::WEST),
            (["right", "d", "l"], Direction::EAST),
        ] {
            for key in keys {
                assert_eq!(parse_command(key), Some(PlayerCommand::Move(direction)), "{key}");
            }
        }
    }

    #[test]
    fn test_wait_and_descend() {
        assert_eq!(parse_command("."), Some(PlayerCommand::Wait));
        assert_eq!(parse_command("Space"), Some(PlayerCommand::Wait));
        assert_eq!(parse_command(">"), Some(PlayerCommand::Descend));
    }

    #[test]
    fn test_vi_keys_can_be_disabled() {
        let input = InputHandler {
            vi_keys_enabled: false,
        };
        assert_eq!(input.parse("h"), None);
        assert_eq!(input.parse("a"), Some(PlayerInput::Command(PlayerCommand::west())));
    }

    #[test]
    fn test_non_commands() {
        assert_eq!(parse_command("q"), None);
        assert_eq!(InputHandler::new().parse("esc"), Some(PlayerInput::Quit));
        assert_eq!(parse_command("x"), None);
        assert_eq!(PlayerCommand::Descend.to_string(), "descend");
        assert_eq!(PlayerCommand::north().to_string(), "move north");
    }
}
