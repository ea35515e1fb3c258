//! # Turn Scheduler
//!
//! The single writer of [`GameState`]. Turns alternate strictly between the
//! player and the AI:
//!
//! 1. In the player phase at most one [`PlayerCommand`] is applied. A move
//!    into a wall is rejected and leaves the phase unchanged.
//! 2. In the AI phase every NPC decides concurrently against one shared
//!    snapshot. Decisions are committed in NPC id order once all have
//!    settled, and the phase returns to the player exactly once.
//!
//! Collaborators observe the game through [`TurnScheduler::snapshot`] and the
//! [`TurnEvent`] broadcast channel.

use crate::ai::{Decision, DecisionPipeline, SuggestionProvider};
use crate::config::EVENT_CHANNEL_CAPACITY;
use crate::generation::utils::{create_rng, level_seed};
use crate::{
    AiBehaviorComponent, DelveError, DelveResult, EncounterGenerator, EntityId, GameConfig,
    GameState, GeneratedLevel, Generator, HealthComponent, LevelGenerator, PlayerCommand,
    Position, PositionComponent, TileType, TurnPhase,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;

/// Offset between a level's seed and the seed of its NPC placement.
const ENCOUNTER_SEED_OFFSET: u64 = 0x5EED;

/// Something observable that happened during a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    PlayerMoved {
        from: Position,
        to: Position,
    },
    /// A move ran into a wall or an entity that cannot be attacked
    Bumped {
        entity: EntityId,
        at: Position,
    },
    Attacked {
        attacker: EntityId,
        target: EntityId,
        damage: u32,
    },
    EntityDied {
        entity: EntityId,
        killer: Option<EntityId>,
    },
    NpcSpoke {
        npc: EntityId,
        line: String,
    },
    TurnAdvanced {
        turn_number: u64,
        phase: TurnPhase,
    },
    LevelEntered {
        level: u32,
        seed: u64,
    },
}

/// Why a player command was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The destination is not walkable
    Blocked,
    /// Something without health stands on the destination
    Occupied,
    /// Movement is cardinal only
    Diagonal,
    NotOnStairs,
}

/// Result of [`TurnScheduler::submit_player_action`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Moved(Position),
    Waited,
    Attacked {
        target: EntityId,
        damage: u32,
        killed: bool,
    },
    /// Entered the given level; the player moves again
    Descended {
        level: u32,
    },
    /// Nothing changed and it is still the player's turn
    Rejected(RejectReason),
    NotPlayerTurn,
    PlayerDead,
}

impl ActionOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ActionOutcome::Rejected(_))
    }

    /// Whether the command handed the turn to the AI.
    pub fn ends_player_turn(&self) -> bool {
        matches!(
            self,
            ActionOutcome::Moved(_) | ActionOutcome::Waited | ActionOutcome::Attacked { .. }
        )
    }
}

/// Summary of one resolved AI turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AiTurnReport {
    /// Turn number the decisions were made for
    pub turn: u64,
    /// Committed decisions in NPC order; empty when cancelled
    pub decisions: Vec<Decision>,
    pub moved: usize,
    pub blocked: usize,
    pub attacks: usize,
    pub fallbacks: usize,
    pub cancelled: bool,
}

/// Result of [`TurnScheduler::play_turn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSummary {
    pub outcome: ActionOutcome,
    /// Present when the command ended the player's turn
    pub ai: Option<AiTurnReport>,
}

/// Cancels the AI turn in flight, or the next one if none is running.
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// Owns the game state and drives the turn loop.
#[derive(Debug)]
pub struct TurnScheduler {
    config: GameConfig,
    state: GameState,
    generator: LevelGenerator,
    pipeline: Arc<DecisionPipeline>,
    events: broadcast::Sender<TurnEvent>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl TurnScheduler {
    /// Starts a session on level 1 with rule-based NPCs only.
    pub fn new(config: GameConfig) -> DelveResult<Self> {
        Self::with_provider(config, None)
    }

    /// Starts a session on level 1 whose NPCs may consult `provider`.
    pub fn with_provider(
        config: GameConfig,
        provider: Option<Arc<dyn SuggestionProvider>>,
    ) -> DelveResult<Self> {
        config.validate()?;
        let generator = LevelGenerator::new();
        let state = Self::fresh_state(&generator, &config)?;
        let pipeline = Arc::new(DecisionPipeline::new(provider, config.pipeline.clone()));
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown, _) = watch::channel(false);

        log::info!(
            "session started: seed {}, {} NPCs on level 1, pipeline {:?}",
            config.generation.seed,
            state.npcs().len(),
            pipeline
        );

        Ok(Self {
            config,
            state,
            generator,
            pipeline,
            events,
            shutdown: Arc::new(shutdown),
        })
    }

    fn fresh_state(generator: &LevelGenerator, config: &GameConfig) -> DelveResult<GameState> {
        let level = generator.generate_level(&config.generation, 1, None)?;
        let mut state = GameState::new(&level, config);
        populate(&mut state, &level, config)?;
        Ok(state)
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Read access to the live state.
    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// A copy of the current state for renderers and persistence.
    pub fn snapshot(&self) -> GameState {
        self.state.clone()
    }

    /// Replaces the live state with a previously taken snapshot.
    pub fn restore(&mut self, state: GameState) -> DelveResult<()> {
        if let Err(err) = state.validate() {
            log::warn!("refusing to restore state: {}", err);
            return Err(err);
        }
        self.state = state;
        Ok(())
    }

    /// Starts over on level 1 with a fresh player.
    pub fn reset(&mut self) -> DelveResult<()> {
        self.state = Self::fresh_state(&self.generator, &self.config)?;
        self.shutdown.send_replace(false);
        let seed = level_seed(self.config.generation.seed, 1);
        self.emit(TurnEvent::LevelEntered { level: 1, seed });
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    fn emit(&mut self, event: TurnEvent) {
        self.state
            .statistics
            .update_from_event(&event, self.state.player_id);
        log::trace!("event: {:?}", event);
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }

    /// Applies one player command.
    ///
    /// Refusals are reported through [`ActionOutcome`]; errors are reserved
    /// for a corrupt state or a level that fails to generate.
    pub fn submit_player_action(&mut self, command: PlayerCommand) -> DelveResult<ActionOutcome> {
        if self.state.current_turn != TurnPhase::Player {
            return Ok(ActionOutcome::NotPlayerTurn);
        }
        if !self.state.is_player_alive() {
            return Ok(ActionOutcome::PlayerDead);
        }

        let player = self.state.player_id;
        let from = self
            .state
            .player_position()
            .ok_or_else(|| DelveError::InvalidState("player has no position".to_string()))?;

        let direction = match command {
            PlayerCommand::Wait => {
                self.state.current_turn = TurnPhase::Ai;
                return Ok(ActionOutcome::Waited);
            }
            PlayerCommand::Descend => {
                let on_stairs = self
                    .state
                    .grid
                    .get_tile(from)
                    .map_or(false, |tile| tile.tile_type == TileType::Stairs);
                if !on_stairs {
                    return Ok(ActionOutcome::Rejected(RejectReason::NotOnStairs));
                }
                let level = self.descend()?;
                return Ok(ActionOutcome::Descended { level });
            }
            PlayerCommand::Move(direction) if direction.is_none() => {
                self.state.current_turn = TurnPhase::Ai;
                return Ok(ActionOutcome::Waited);
            }
            PlayerCommand::Move(direction) if !direction.is_cardinal_or_none() => {
                return Ok(ActionOutcome::Rejected(RejectReason::Diagonal));
            }
            PlayerCommand::Move(direction) => direction,
        };

        let to = from.step(direction);
        if let Some(target) = self.state.entity_at(to).filter(|&id| id != player) {
            if self.state.entities.get::<HealthComponent>(target).is_none() {
                self.emit(TurnEvent::Bumped { entity: player, at: to });
                return Ok(ActionOutcome::Rejected(RejectReason::Occupied));
            }
            let (damage, killed) = self.attack(player, target);
            self.state.current_turn = TurnPhase::Ai;
            return Ok(ActionOutcome::Attacked {
                target,
                damage,
                killed,
            });
        }

        if !self.state.grid.is_walkable(to) {
            log::debug!("player bumped into {}", to);
            self.emit(TurnEvent::Bumped { entity: player, at: to });
            return Ok(ActionOutcome::Rejected(RejectReason::Blocked));
        }

        self.move_entity(player, to);
        self.emit(TurnEvent::PlayerMoved { from, to });
        self.state.current_turn = TurnPhase::Ai;
        Ok(ActionOutcome::Moved(to))
    }

    /// Resolves the AI phase and hands the turn back to the player.
    ///
    /// Each NPC decides in its own task against a shared snapshot, seeded
    /// from the session seed, level and turn so the outcome does not depend
    /// on task completion order. Signalling the [`ShutdownHandle`] aborts the
    /// tasks and commits nothing.
    pub async fn resolve_ai_turn(&mut self) -> DelveResult<AiTurnReport> {
        if self.state.current_turn != TurnPhase::Ai {
            return Err(DelveError::InvalidState(
                "AI turn requested during the player's turn".to_string(),
            ));
        }

        let turn = self.state.turn_number;
        let npcs = self.state.npcs();
        let mut rng = create_rng(turn_seed(self.state.rng_seed, self.state.dungeon_level, turn));
        let seeds: Vec<u64> = npcs.iter().map(|_| rng.gen()).collect();
        let snapshot = Arc::new(self.state.clone());

        let mut report = AiTurnReport {
            turn,
            ..AiTurnReport::default()
        };
        let mut settled: Vec<Option<Decision>> = vec![None; npcs.len()];
        let mut shutdown = self.shutdown.subscribe();

        if *shutdown.borrow_and_update() {
            report.cancelled = true;
        } else {
            let mut tasks = JoinSet::new();
            for (index, (&npc, seed)) in npcs.iter().zip(seeds).enumerate() {
                let pipeline = Arc::clone(&self.pipeline);
                let snapshot = Arc::clone(&snapshot);
                tasks.spawn(async move { (index, pipeline.decide(&snapshot, npc, seed).await) });
            }

            loop {
                tokio::select! {
                    biased;
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow_and_update() {
                            tasks.abort_all();
                            report.cancelled = true;
                            break;
                        }
                    }
                    joined = tasks.join_next() => match joined {
                        Some(Ok((index, decision))) => settled[index] = Some(decision),
                        Some(Err(err)) => log::warn!("NPC decision task failed: {}", err),
                        None => break,
                    },
                }
            }
        }

        if report.cancelled {
            log::info!("AI turn {} cancelled before commit", turn);
            self.shutdown.send_replace(false);
        } else {
            for (&npc, decision) in npcs.iter().zip(settled) {
                let decision = decision.unwrap_or_else(|| Decision::hold(npc));
                self.commit(&decision, turn, &mut report);
                report.decisions.push(decision);
            }
        }

        self.state.turn_number += 1;
        self.state.current_turn = TurnPhase::Player;
        self.emit(TurnEvent::TurnAdvanced {
            turn_number: self.state.turn_number,
            phase: TurnPhase::Player,
        });

        log::debug!(
            "turn {}: {} moved, {} blocked, {} attacks, {} fallbacks",
            turn,
            report.moved,
            report.blocked,
            report.attacks,
            report.fallbacks
        );
        Ok(report)
    }

    /// Submits a command and, if it ended the player's turn, resolves the AI
    /// turn that follows.
    pub async fn play_turn(&mut self, command: PlayerCommand) -> DelveResult<TurnSummary> {
        let outcome = self.submit_player_action(command)?;
        let ai = if self.state.current_turn == TurnPhase::Ai {
            Some(self.resolve_ai_turn().await?)
        } else {
            None
        };
        Ok(TurnSummary { outcome, ai })
    }

    /// Applies one settled decision. A move into an occupied or blocked cell
    /// is a no-op; a move into the living player is an attack.
    fn commit(&mut self, decision: &Decision, turn: u64, report: &mut AiTurnReport) {
        let npc = decision.npc;
        let Some(from) = self.state.entities.position_of(npc) else {
            return;
        };

        if let Some(line) = &decision.dialog {
            self.emit(TurnEvent::NpcSpoke {
                npc,
                line: line.clone(),
            });
        }
        if decision.is_fallback() {
            report.fallbacks += 1;
        }

        let memory = if decision.direction.is_none() {
            format!("turn {turn}: waited at {from}")
        } else {
            let to = from.step(decision.direction);
            if !decision.direction.is_cardinal_or_none() {
                report.blocked += 1;
                format!("turn {turn}: could not move to {to}")
            } else if Some(to) == self.state.player_position() && self.state.is_player_alive() {
                let (damage, _) = self.attack(npc, self.state.player_id);
                report.attacks += 1;
                format!("turn {turn}: hit the player for {damage}")
            } else if self.state.grid.is_walkable(to) && self.state.entity_at(to).is_none() {
                self.move_entity(npc, to);
                report.moved += 1;
                format!("turn {turn}: moved to {to}")
            } else {
                report.blocked += 1;
                format!("turn {turn}: could not move to {to}")
            }
        };

        if let Some(ai) = self.state.entities.get_mut::<AiBehaviorComponent>(npc) {
            ai.remember(memory);
            if decision.consulted {
                ai.reset_cooldown(turn);
            }
        }
    }

    /// Melee hit of `attacker` on `target`. Returns the damage dealt and
    /// whether the hit was fatal. Dead NPCs leave the store; a dead player
    /// stays so the state remains inspectable.
    fn attack(&mut self, attacker: EntityId, target: EntityId) -> (u32, bool) {
        let damage = self.config.melee_damage;
        let Some(health) = self.state.entities.get_mut::<HealthComponent>(target) else {
            return (0, false);
        };
        if !health.is_alive() {
            return (0, false);
        }
        let dealt = health.take_damage(damage);
        let killed = !health.is_alive();

        self.emit(TurnEvent::Attacked {
            attacker,
            target,
            damage: dealt,
        });
        if killed {
            if target == self.state.player_id {
                log::info!("player killed by {} on turn {}", attacker, self.state.turn_number);
            } else {
                self.state.entities.destroy_entity(target);
            }
            self.emit(TurnEvent::EntityDied {
                entity: target,
                killer: Some(attacker),
            });
        }
        (dealt, killed)
    }

    fn move_entity(&mut self, id: EntityId, to: Position) {
        if let Some(position) = self.state.entities.get_mut::<PositionComponent>(id) {
            position.set_position(to);
        }
    }

    /// Moves the player to the next level. NPCs of the old level are
    /// despawned and a new set is placed.
    fn descend(&mut self) -> DelveResult<u32> {
        let next = self.state.dungeon_level + 1;
        let level = self
            .generator
            .generate_level(&self.config.generation, next, None)?;

        let player = self.state.player_id;
        let others: Vec<EntityId> = self
            .state
            .entities
            .ids()
            .filter(|&id| id != player)
            .collect();
        for id in others {
            self.state.entities.destroy_entity(id);
        }

        self.state
            .entities
            .add_component(player, PositionComponent::new(level.spawn, next as i32))?;
        self.state.dungeon_level = next;
        self.state.grid = Arc::new(level.grid.clone());
        self.state.stairs = level.stairs;
        self.state.current_turn = TurnPhase::Player;
        populate(&mut self.state, &level, &self.config)?;

        log::info!("descended to level {} (seed {})", next, level.seed);
        self.emit(TurnEvent::LevelEntered {
            level: next,
            seed: level.seed,
        });
        Ok(next)
    }
}

/// Places the NPCs of a freshly entered level.
fn populate(state: &mut GameState, level: &GeneratedLevel, config: &GameConfig) -> DelveResult<usize> {
    let mut rng = create_rng(level.seed.wrapping_add(ENCOUNTER_SEED_OFFSET));
    let mut encounters = EncounterGenerator::new(&level.grid, level.level_number).reserve(level.spawn);
    if let Some(stairs) = level.stairs {
        encounters = encounters.reserve(stairs);
    }

    let spawns = encounters.generate(&config.generation, &mut rng)?;
    for spawn in &spawns {
        state.entities.create_entity(spawn.components(
            level.level_number as i32,
            config.vision_range,
            config.decision_cooldown,
        ));
    }
    Ok(spawns.len())
}

/// Seed of the per-NPC seeds drawn for one AI turn.
fn turn_seed(base: u64, level: u32, turn: u64) -> u64 {
    level_seed(base, level)
        .rotate_left(17)
        .wrapping_add(turn.wrapping_mul(0x9E37_79B9_7F4A_7C15))
}
