//! # Decision Pipeline
//!
//! One decision per NPC per AI turn: optionally ask the suggestion provider
//! under a hard deadline, validate what comes back, and fall back to the
//! [`BehaviorSelector`] on any failure. Nothing in here returns an error to
//! the scheduler.

use crate::ai::{parse_action, AiAction, BehaviorSelector, CompactContext, DecisionError, Intent, Perception, SuggestionProvider};
use crate::config::DEFAULT_SUGGESTION_TIMEOUT_MS;
use crate::generation::utils::create_rng;
use crate::{AiBehaviorComponent, Direction, EntityId, GameState};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Settings for the suggestion step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Consult the provider at all
    pub enabled: bool,
    /// Deadline for one provider call
    pub suggestion_timeout_ms: u64,
    /// Memory lines included in the context
    pub memory_in_context: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suggestion_timeout_ms: DEFAULT_SUGGESTION_TIMEOUT_MS,
            memory_in_context: 3,
        }
    }
}

impl PipelineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.suggestion_timeout_ms)
    }
}

/// Where a decision's direction came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecisionSource {
    /// A validated suggestion
    Suggestion(Intent),
    /// The selector, without consulting a provider
    Rules,
    /// The selector, after the suggestion failed
    Fallback(DecisionError),
}

/// The outcome of one NPC decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub npc: EntityId,
    /// Always a cardinal step or [`Direction::NONE`]
    pub direction: Direction,
    pub source: DecisionSource,
    /// Line the NPC says this turn
    pub dialog: Option<String>,
    /// Whether the provider was called, which restarts the cooldown
    pub consulted: bool,
}

impl Decision {
    /// Stay in place, used for NPCs whose decision never settled.
    pub fn hold(npc: EntityId) -> Self {
        Self {
            npc,
            direction: Direction::NONE,
            source: DecisionSource::Rules,
            dialog: None,
            consulted: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.source, DecisionSource::Fallback(_))
    }
}

/// Suggestion-first, rules-always decision maker. Shared by every NPC task
/// of a turn.
pub struct DecisionPipeline {
    provider: Option<Arc<dyn SuggestionProvider>>,
    selector: BehaviorSelector,
    config: PipelineConfig,
}

impl std::fmt::Debug for DecisionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionPipeline")
            .field("provider", &self.provider.as_ref().map(|p| p.name()))
            .field("config", &self.config)
            .finish()
    }
}

impl DecisionPipeline {
    /// A pipeline with no provider: every decision comes from the rules.
    pub fn rules_only() -> Self {
        Self {
            provider: None,
            selector: BehaviorSelector::new(),
            config: PipelineConfig::default(),
        }
    }

    pub fn new(provider: Option<Arc<dyn SuggestionProvider>>, config: PipelineConfig) -> Self {
        Self {
            provider,
            selector: BehaviorSelector::new(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Decides the step of `npc` in `state`.
    ///
    /// `seed` feeds every random choice of this decision, which keeps the
    /// result independent of how concurrent decisions interleave.
    pub async fn decide(&self, state: &GameState, npc: EntityId, seed: u64) -> Decision {
        let mut rng = create_rng(seed);
        let Some(perception) = Perception::from_state(state, npc) else {
            return Decision::hold(npc);
        };

        let may_consult = self.config.enabled
            && state
                .entities
                .get::<AiBehaviorComponent>(npc)
                .map_or(false, |ai| ai.can_make_decision(state.turn_number));
        let provider = match &self.provider {
            Some(provider) if may_consult => provider,
            _ => {
                return Decision {
                    npc,
                    direction: self.selector.select(&perception, &mut rng),
                    source: DecisionSource::Rules,
                    dialog: None,
                    consulted: false,
                }
            }
        };

        let outcome = match CompactContext::build(state, npc, self.config.memory_in_context) {
            Some(context) => self.suggest(provider.as_ref(), &context).await,
            None => Err(DecisionError::Provider("no context for entity".to_string())),
        };

        let resolved = outcome.and_then(|action| {
            let direction = self.direction_for(&action, &perception, &mut rng)?;
            Ok((action, direction))
        });

        match resolved {
            Ok((action, direction)) => Decision {
                npc,
                direction,
                source: DecisionSource::Suggestion(action.intent),
                dialog: action.dialog,
                consulted: true,
            },
            Err(reason) => {
                log::debug!("NPC {} falls back to rules: {}", npc, reason);
                Decision {
                    npc,
                    direction: self.selector.select(&perception, &mut rng),
                    source: DecisionSource::Fallback(reason),
                    dialog: None,
                    consulted: true,
                }
            }
        }
    }

    /// Calls the provider under the deadline and validates its answer.
    pub async fn suggest(
        &self,
        provider: &dyn SuggestionProvider,
        context: &CompactContext,
    ) -> Result<AiAction, DecisionError> {
        if log::log_enabled!(log::Level::Debug) {
            log::debug!("prompt for NPC {}:\n{}", context.npc_id, context.to_prompt());
        }
        let text = tokio::time::timeout(self.config.timeout(), provider.suggest(context))
            .await
            .map_err(|_| DecisionError::Timeout(self.config.suggestion_timeout_ms))?
            .map_err(|err| DecisionError::Provider(err.to_string()))?;
        log::trace!("{} suggested for NPC {}: {}", provider.name(), context.npc_id, text);
        parse_action(&text)
    }

    /// Turns a validated action into a legal step.
    ///
    /// An explicit direction wins; otherwise the intent chooses: attack
    /// pursues, flee runs, explore wanders and trade holds.
    pub fn direction_for(
        &self,
        action: &AiAction,
        perception: &Perception<'_>,
        rng: &mut StdRng,
    ) -> Result<Direction, DecisionError> {
        if let Some(direction) = action.movement()? {
            return Ok(direction);
        }
        Ok(match action.intent {
            Intent::Attack => self.selector.pursue(perception, rng),
            Intent::Flee => self.selector.flee(perception, rng),
            Intent::Explore => self.selector.wander(perception, rng),
            Intent::Trade => Direction::NONE,
        })
    }
}
