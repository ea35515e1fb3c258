//! # Decision Context
//!
//! The compact, serializable summary of the game an NPC decision is based on.

use crate::utils::can_see;
use crate::{
    AiBehaviorComponent, BehaviorClass, ComponentKind, EntityId, GameState, HealthComponent,
    Position,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// What a suggestion provider gets to see about one NPC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactContext {
    pub dungeon_level: u32,
    pub turn_number: u64,
    pub player_position: Option<Position>,
    pub npc_id: EntityId,
    pub npc_position: Position,
    pub npc_behavior: BehaviorClass,
    pub npc_health: u32,
    /// Other entities within the NPC's vision range and line of sight
    pub visible_entities: usize,
    /// Most recent memory lines, oldest first
    pub recent_memory: Vec<String>,
}

impl CompactContext {
    /// Summarizes `npc` as seen in `state`. Returns `None` for entities
    /// without a position or AI profile.
    pub fn build(state: &GameState, npc: EntityId, memory_in_context: usize) -> Option<Self> {
        let ai = state.entities.get::<AiBehaviorComponent>(npc)?;
        let npc_position = state.entities.position_of(npc)?;
        let npc_health = state
            .entities
            .get::<HealthComponent>(npc)
            .map(HealthComponent::current)
            .unwrap_or(0);

        let visible_entities = state
            .entities
            .with_component(ComponentKind::Position)
            .filter(|&other| other != npc)
            .filter_map(|other| state.entities.position_of(other))
            .filter(|&pos| can_see(&state.grid, npc_position, pos, ai.vision_range))
            .count();

        Some(Self {
            dungeon_level: state.dungeon_level,
            turn_number: state.turn_number,
            player_position: state.player_position(),
            npc_id: npc,
            npc_position,
            npc_behavior: ai.behavior,
            npc_health,
            visible_entities,
            recent_memory: ai.recent_memory(memory_in_context),
        })
    }

    /// Renders the prompt sent to text-generating providers.
    pub fn to_prompt(&self) -> String {
        let player = self
            .player_position
            .map(|pos| format!("{{\"x\": {}, \"y\": {}}}", pos.x, pos.y))
            .unwrap_or_else(|| "unknown".to_string());

        let mut prompt = String::new();
        let _ = writeln!(prompt, "Given this roguelike game state:");
        let _ = writeln!(prompt, "- Dungeon level: {}", self.dungeon_level);
        let _ = writeln!(prompt, "- Player position: {player}");
        let _ = writeln!(
            prompt,
            "- NPC position: {{\"x\": {}, \"y\": {}}}",
            self.npc_position.x, self.npc_position.y
        );
        let _ = writeln!(prompt, "- NPC type: {}", self.npc_behavior);
        let _ = writeln!(prompt, "- NPC health: {}", self.npc_health);
        let _ = writeln!(prompt, "- Visible entities: {}", self.visible_entities);
        if !self.recent_memory.is_empty() {
            let _ = writeln!(prompt, "- Recent memory: {}", self.recent_memory.join("; "));
        }
        prompt.push('\n');
        prompt.push_str("Respond ONLY with a valid JSON object matching this schema:\n");
        prompt.push_str(
            "{ \"intent\": \"attack\"|\"explore\"|\"trade\"|\"flee\", \
             \"direction\": {\"x\": -1|0|1, \"y\": -1|0|1}, \
             \"dialog\": \"<optional, at most 140 chars>\", \
             \"intensity\": 0-10 }\n",
        );
        prompt.push_str("Do not include any explanation or extra text.\n");
        prompt
    }
}
