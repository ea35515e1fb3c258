//! # Game State Module
//!
//! The snapshot of a running session and the configuration it was built from.
//!
//! [`GameState`] is the single unit of truth handed to renderers, the decision
//! pipeline and persistence. Only the [`TurnScheduler`](crate::TurnScheduler)
//! mutates it; everyone else gets a clone.

use crate::ai::PipelineConfig;
use crate::config::{DEFAULT_MELEE_DAMAGE, DEFAULT_PLAYER_HEALTH, DEFAULT_VISION_RANGE};
use crate::{
    AiBehaviorComponent, ComponentKind, DelveError, DelveResult, DungeonGrid, EntityId,
    EntityStore, GeneratedLevel, GenerationConfig, HealthComponent, PlayerComponent, Position,
    PositionComponent, TurnEvent,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

/// Whose move it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnPhase {
    Player,
    Ai,
}

/// Everything needed to run a session: generation, AI and gameplay tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
    /// NPC vision range in tiles (Manhattan)
    pub vision_range: u32,
    /// Damage dealt by one bump attack
    pub melee_damage: u32,
    pub player_health: u32,
    pub player_name: String,
    /// Turns between two suggestion calls for the same NPC
    pub decision_cooldown: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

impl GameConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            generation: GenerationConfig::new(seed),
            pipeline: PipelineConfig::default(),
            vision_range: DEFAULT_VISION_RANGE,
            melee_damage: DEFAULT_MELEE_DAMAGE,
            player_health: DEFAULT_PLAYER_HEALTH,
            player_name: "Adventurer".to_string(),
            decision_cooldown: 1,
        }
    }

    /// Small levels and a short suggestion deadline.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            generation: GenerationConfig::for_testing(seed),
            pipeline: PipelineConfig {
                suggestion_timeout_ms: 50,
                ..PipelineConfig::default()
            },
            ..Self::new(seed)
        }
    }

    /// Loads a config from JSON. Omitted fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> DelveResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: GameConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::info!("loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    pub fn validate(&self) -> DelveResult<()> {
        self.generation.validate()?;
        if self.player_health == 0 {
            return Err(DelveError::Configuration(
                "player health must be positive".to_string(),
            ));
        }
        if self.pipeline.suggestion_timeout_ms == 0 {
            return Err(DelveError::Configuration(
                "suggestion timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Running totals for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameStatistics {
    /// NPCs killed by the player
    pub enemies_defeated: u32,
    pub damage_dealt: u64,
    pub damage_taken: u64,
    pub deaths: u32,
    /// Deepest level reached
    pub max_depth_reached: u32,
    pub steps_taken: u64,
}

impl GameStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates statistics based on a turn event.
    pub fn update_from_event(&mut self, event: &TurnEvent, player: EntityId) {
        match event {
            TurnEvent::PlayerMoved { .. } => self.steps_taken += 1,
            TurnEvent::Attacked {
                attacker,
                target,
                damage,
            } => {
                if *attacker == player {
                    self.damage_dealt += *damage as u64;
                }
                if *target == player {
                    self.damage_taken += *damage as u64;
                }
            }
            TurnEvent::EntityDied { entity, killer } => {
                if *entity == player {
                    self.deaths += 1;
                } else if *killer == Some(player) {
                    self.enemies_defeated += 1;
                }
            }
            TurnEvent::LevelEntered { level, .. } => {
                self.max_depth_reached = self.max_depth_reached.max(*level);
            }
            _ => {}
        }
    }
}

/// Point-in-time game state.
///
/// The grid is shared through an `Arc`, so cloning a snapshot copies only the
/// entity store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub dungeon_level: u32,
    pub grid: Arc<DungeonGrid>,
    pub stairs: Option<Position>,
    pub player_id: EntityId,
    pub entities: EntityStore,
    pub current_turn: TurnPhase,
    /// Completed AI turns
    pub turn_number: u64,
    /// Base seed of the session
    pub rng_seed: u64,
    pub statistics: GameStatistics,
}

impl GameState {
    /// Creates a state for a fresh level with a new player at its spawn.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{generate_level, GameConfig, GameState, TurnPhase};
    ///
    /// let config = GameConfig::for_testing(42);
    /// let level = generate_level(&config.generation, 1, None).unwrap();
    /// let state = GameState::new(&level, &config);
    /// assert_eq!(state.player_position(), Some(level.spawn));
    /// assert_eq!(state.current_turn, TurnPhase::Player);
    /// ```
    pub fn new(level: &GeneratedLevel, config: &GameConfig) -> Self {
        let mut entities = EntityStore::new();
        let player_id = entities.create_entity(vec![
            PositionComponent::new(level.spawn, level.level_number as i32).into(),
            HealthComponent::new(config.player_health).into(),
            PlayerComponent::new(config.player_name.clone()).into(),
        ]);

        let mut statistics = GameStatistics::new();
        statistics.max_depth_reached = level.level_number;

        Self {
            dungeon_level: level.level_number,
            grid: Arc::new(level.grid.clone()),
            stairs: level.stairs,
            player_id,
            entities,
            current_turn: TurnPhase::Player,
            turn_number: 0,
            rng_seed: config.generation.seed,
            statistics,
        }
    }

    pub fn player_position(&self) -> Option<Position> {
        self.entities.position_of(self.player_id)
    }

    pub fn player_health(&self) -> Option<&HealthComponent> {
        self.entities.get::<HealthComponent>(self.player_id)
    }

    pub fn is_player_alive(&self) -> bool {
        self.player_health().map_or(false, HealthComponent::is_alive)
    }

    /// NPC ids (entities with an AI profile) in ascending order.
    pub fn npcs(&self) -> Vec<EntityId> {
        self.entities.with_component(ComponentKind::AiBehavior).collect()
    }

    /// Any entity standing on `pos`.
    pub fn entity_at(&self, pos: Position) -> Option<EntityId> {
        self.entities.entity_at(pos)
    }

    /// Checks the invariants a restored state must satisfy: the grid is
    /// well formed, the player exists, every entity stands on a walkable
    /// cell, no two entities share a cell, and every health value is within
    /// bounds.
    pub fn validate(&self) -> DelveResult<()> {
        if !self.grid.is_well_formed() {
            return Err(DelveError::InvalidState(format!(
                "grid is {}x{} but stores a different number of tiles",
                self.grid.width(),
                self.grid.height()
            )));
        }
        if !self.entities.has_component(self.player_id, ComponentKind::Player) {
            return Err(DelveError::InvalidState(format!(
                "player {} is missing",
                self.player_id
            )));
        }
        if self.player_position().is_none() {
            return Err(DelveError::InvalidState("player has no position".to_string()));
        }

        let mut occupied = HashSet::new();
        for id in self.entities.ids() {
            if let Some(pos) = self.entities.position_of(id) {
                if !self.grid.is_walkable(pos) {
                    return Err(DelveError::InvalidState(format!(
                        "entity {id} stands on blocked cell {pos}"
                    )));
                }
                if !occupied.insert(pos) {
                    return Err(DelveError::InvalidState(format!(
                        "more than one entity on {pos}"
                    )));
                }
            }
            if let Some(health) = self.entities.get::<HealthComponent>(id) {
                if !health.is_consistent() {
                    return Err(DelveError::InvalidState(format!(
                        "entity {id} has health {} above max {}",
                        health.current(),
                        health.max()
                    )));
                }
            }
            if let Some(ai) = self.entities.get::<AiBehaviorComponent>(id) {
                if ai.memory().len() > crate::config::NPC_MEMORY_CAPACITY {
                    return Err(DelveError::InvalidState(format!(
                        "entity {id} remembers more than {} events",
                        crate::config::NPC_MEMORY_CAPACITY
                    )));
                }
            }
        }
        Ok(())
    }

    /// Saves the game state to JSON.
    pub fn save_to_json(&self) -> DelveResult<String> {
        serde_json::to_string_pretty(self).map_err(DelveError::from)
    }

    /// Loads game state from JSON, rejecting states that break invariants.
    pub fn load_from_json(json: &str) -> DelveResult<Self> {
        let state: GameState = serde_json::from_str(json)?;
        state.validate()?;
        Ok(state)
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> DelveResult<()> {
        std::fs::write(path, self.save_to_json()?)?;
        Ok(())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> DelveResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::load_from_json(&json)
    }
}
