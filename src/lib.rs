//! # Delve
//!
//! Simulation core for a turn-based dungeon crawler whose NPCs can take
//! suggestions from a generative model.
//!
//! ## Architecture Overview
//!
//! Delve is split along the data flow of a single level:
//!
//! - **Generation System**: seeded BSP rooms, cellular cave refinement and a
//!   connectivity pass that guarantees a single walkable region
//! - **Entity System**: a closed set of component types stored per entity
//! - **Pathfinding & Vision**: grid A* and Bresenham line-of-sight
//! - **AI System**: rule-based behavior selection plus an asynchronous
//!   suggestion pipeline with a hard timeout and deterministic fallback
//! - **Turn Scheduler**: the single writer that alternates player and AI turns
//!
//! Rendering, input capture and persistence encoding live outside the core.
//! Collaborators read [`GameState`] snapshots and push [`PlayerCommand`]s.

pub mod ai;
pub mod game;
pub mod generation;
pub mod input;
pub mod utils;

// Core module re-exports
pub use ai::*;
pub use game::*;
pub use generation::*;
pub use input::*;
pub use utils::*;

/// Core error type for the Delve simulation.
#[derive(thiserror::Error, Debug)]
pub enum DelveError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generation parameters contradict each other
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Generation produced a level that breaks its invariants
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Game state is invalid
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Entity does not exist in the store
    #[error("Unknown entity: {0}")]
    UnknownEntity(EntityId),
}

/// Result type used throughout the Delve codebase.
pub type DelveResult<T> = Result<T, DelveError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Game configuration constants.
pub mod config {
    /// Default dungeon width in tiles
    pub const DEFAULT_DUNGEON_WIDTH: u32 = 80;

    /// Default dungeon height in tiles
    pub const DEFAULT_DUNGEON_HEIGHT: u32 = 40;

    /// Default vision range for NPCs, in Manhattan distance
    pub const DEFAULT_VISION_RANGE: u32 = 8;

    /// Default player starting health
    pub const DEFAULT_PLAYER_HEALTH: u32 = 100;

    /// Base NPC health on level 1
    pub const DEFAULT_NPC_HEALTH: u32 = 20;

    /// Damage dealt by a bump attack
    pub const DEFAULT_MELEE_DAMAGE: u32 = 5;

    /// Hard deadline for one suggestion call
    pub const DEFAULT_SUGGESTION_TIMEOUT_MS: u64 = 2_000;

    /// Capacity of an NPC's rolling memory
    pub const NPC_MEMORY_CAPACITY: usize = 10;

    /// Longest dialog line accepted from a suggestion
    pub const MAX_DIALOG_CHARS: usize = 140;

    /// Longest target name accepted from a suggestion
    pub const MAX_TARGET_CHARS: usize = 20;

    /// Upper bound on nodes expanded by a single A* search
    pub const MAX_PATH_EXPANSIONS: usize = 10_000;

    /// Seed stride between consecutive dungeon levels
    pub const LEVEL_SEED_STRIDE: u64 = 1_000;

    /// Capacity of the turn event broadcast channel
    pub const EVENT_CHANNEL_CAPACITY: usize = 256;
}
