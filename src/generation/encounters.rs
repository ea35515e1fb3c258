//! # Encounter Generation
//!
//! NPC placement for a freshly generated level.

use crate::config::DEFAULT_NPC_HEALTH;
use crate::{
    AiBehaviorComponent, BehaviorClass, Component, DelveError, DelveResult, DungeonGrid,
    GenerationConfig, Generator, HealthComponent, Position, PositionComponent,
};
use rand::{rngs::StdRng, seq::SliceRandom, Rng};
use std::collections::HashSet;

/// Extra hit points an NPC gains per level below the first.
const HEALTH_PER_LEVEL: u32 = 5;

/// An NPC waiting to be inserted into the entity store.
#[derive(Debug, Clone, PartialEq)]
pub struct NpcSpawn {
    pub position: Position,
    pub behavior: BehaviorClass,
    pub health: u32,
}

impl NpcSpawn {
    /// The component set of this NPC on dungeon level `z`.
    pub fn components(&self, z: i32, vision_range: u32, decision_cooldown: u64) -> Vec<Component> {
        vec![
            PositionComponent::new(self.position, z).into(),
            HealthComponent::new(self.health).into(),
            AiBehaviorComponent::new(self.behavior, vision_range)
                .with_cooldown(decision_cooldown)
                .into(),
        ]
    }
}

/// Places NPCs on walkable cells of one level.
///
/// Level `n` receives `npcs_per_level + n - 1` NPCs, capped by the free cells
/// available. Behaviors are drawn hostile 50%, passive 30%, neutral 20%.
pub struct EncounterGenerator<'a> {
    pub grid: &'a DungeonGrid,
    /// Cells that must stay free (spawn, stairs)
    pub reserved: Vec<Position>,
    pub level_number: u32,
}

impl<'a> EncounterGenerator<'a> {
    pub fn new(grid: &'a DungeonGrid, level_number: u32) -> Self {
        Self {
            grid,
            reserved: Vec::new(),
            level_number,
        }
    }

    pub fn reserve(mut self, pos: Position) -> Self {
        self.reserved.push(pos);
        self
    }

    pub fn npc_count(&self, config: &GenerationConfig) -> usize {
        (config.npcs_per_level + self.level_number.saturating_sub(1)) as usize
    }

    fn roll_behavior(rng: &mut StdRng) -> BehaviorClass {
        let roll: f64 = rng.gen();
        if roll < 0.5 {
            BehaviorClass::Hostile
        } else if roll < 0.8 {
            BehaviorClass::Passive
        } else {
            BehaviorClass::Neutral
        }
    }
}

impl Generator<Vec<NpcSpawn>> for EncounterGenerator<'_> {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<Vec<NpcSpawn>> {
        let mut candidates: Vec<Position> = self
            .grid
            .walkable_cells()
            .into_iter()
            .filter(|pos| !self.reserved.contains(pos))
            .collect();

        let count = self.npc_count(config).min(candidates.len());
        let (chosen, _) = candidates.partial_shuffle(rng, count);
        let health = DEFAULT_NPC_HEALTH + HEALTH_PER_LEVEL * self.level_number.saturating_sub(1);

        let spawns: Vec<NpcSpawn> = chosen
            .iter()
            .map(|&position| NpcSpawn {
                position,
                behavior: Self::roll_behavior(rng),
                health,
            })
            .collect();

        log::debug!("placed {} NPCs on level {}", spawns.len(), self.level_number);
        self.validate(&spawns, config)?;
        Ok(spawns)
    }

    fn validate(&self, spawns: &Vec<NpcSpawn>, _config: &GenerationConfig) -> DelveResult<()> {
        let mut seen = HashSet::new();
        for spawn in spawns {
            if !self.grid.is_walkable(spawn.position) || self.reserved.contains(&spawn.position) {
                return Err(DelveError::GenerationFailed(format!(
                    "NPC placed on blocked cell {}",
                    spawn.position
                )));
            }
            if !seen.insert(spawn.position) {
                return Err(DelveError::GenerationFailed(format!(
                    "two NPCs placed on {}",
                    spawn.position
                )));
            }
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "EncounterGenerator"
    }
}
