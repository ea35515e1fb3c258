//! # Components
//!
//! The closed set of component types an entity can carry.
//!
//! Every component kind has a [`ComponentKind`] tag; the store keeps at most
//! one component per tag per entity. Typed access goes through the
//! [`ComponentData`] trait so callers never match on the enum by hand.

use crate::config::NPC_MEMORY_CAPACITY;
use crate::Position;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Tag identifying a component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    Position,
    Health,
    AiBehavior,
    Player,
}

impl ComponentKind {
    /// Number of component kinds.
    pub const COUNT: usize = 4;

    /// All kinds in slot order.
    pub const ALL: [ComponentKind; ComponentKind::COUNT] = [
        ComponentKind::Position,
        ComponentKind::Health,
        ComponentKind::AiBehavior,
        ComponentKind::Player,
    ];

    /// Slot index of this kind in an entity record.
    pub fn index(self) -> usize {
        match self {
            ComponentKind::Position => 0,
            ComponentKind::Health => 1,
            ComponentKind::AiBehavior => 2,
            ComponentKind::Player => 3,
        }
    }
}

/// A component value of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Component {
    Position(PositionComponent),
    Health(HealthComponent),
    AiBehavior(AiBehaviorComponent),
    Player(PlayerComponent),
}

impl Component {
    /// The tag of this component.
    pub fn kind(&self) -> ComponentKind {
        match self {
            Component::Position(_) => ComponentKind::Position,
            Component::Health(_) => ComponentKind::Health,
            Component::AiBehavior(_) => ComponentKind::AiBehavior,
            Component::Player(_) => ComponentKind::Player,
        }
    }
}

/// Typed view over one variant of [`Component`].
pub trait ComponentData: Sized + Into<Component> {
    const KIND: ComponentKind;

    fn from_component(component: &Component) -> Option<&Self>;

    fn from_component_mut(component: &mut Component) -> Option<&mut Self>;
}

macro_rules! component_data {
    ($ty:ty, $variant:ident) => {
        impl From<$ty> for Component {
            fn from(value: $ty) -> Self {
                Component::$variant(value)
            }
        }

        impl ComponentData for $ty {
            const KIND: ComponentKind = ComponentKind::$variant;

            fn from_component(component: &Component) -> Option<&Self> {
                match component {
                    Component::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn from_component_mut(component: &mut Component) -> Option<&mut Self> {
                match component {
                    Component::$variant(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

component_data!(PositionComponent, Position);
component_data!(HealthComponent, Health);
component_data!(AiBehaviorComponent, AiBehavior);
component_data!(PlayerComponent, Player);

/// Current grid location of an entity. `z` is the dungeon level it stands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionComponent {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl PositionComponent {
    pub fn new(position: Position, z: i32) -> Self {
        Self {
            x: position.x,
            y: position.y,
            z,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Position) {
        self.x = position.x;
        self.y = position.y;
    }
}

/// Hit points with the invariant `0 <= current <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthComponent {
    current: u32,
    max: u32,
    pub invulnerable: bool,
}

impl HealthComponent {
    /// Full health.
    pub fn new(max: u32) -> Self {
        Self {
            current: max,
            max,
            invulnerable: false,
        }
    }

    /// Health with an explicit current value, clamped to `max`.
    pub fn with_current(max: u32, current: u32) -> Self {
        Self {
            current: current.min(max),
            max,
            invulnerable: false,
        }
    }

    pub fn current(&self) -> u32 {
        self.current
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Applies damage unless invulnerable. Returns the damage actually taken.
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        if self.invulnerable {
            return 0;
        }
        let taken = amount.min(self.current);
        self.current -= taken;
        taken
    }

    /// Restores health up to `max`.
    pub fn heal(&mut self, amount: u32) {
        self.current = self.current.saturating_add(amount).min(self.max);
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0
    }

    /// Current health as a percentage of max.
    pub fn percentage(&self) -> f32 {
        if self.max == 0 {
            0.0
        } else {
            self.current as f32 / self.max as f32 * 100.0
        }
    }

    /// Whether the bounds invariant holds. Deserialized values may violate it.
    pub fn is_consistent(&self) -> bool {
        self.current <= self.max
    }
}

/// Behavior profile driving the rule-based selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorClass {
    /// Pursues the player on sight
    Hostile,
    /// Flees from the player on sight
    Passive,
    /// Always wanders
    Neutral,
}

impl fmt::Display for BehaviorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviorClass::Hostile => "hostile",
            BehaviorClass::Passive => "passive",
            BehaviorClass::Neutral => "neutral",
        };
        f.write_str(name)
    }
}

/// AI profile of an NPC.
///
/// The cooldown is measured in turns and gates how often the suggestion
/// provider is consulted; the rule-based selector runs every turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiBehaviorComponent {
    pub behavior: BehaviorClass,
    pub vision_range: u32,
    pub decision_cooldown: u64,
    pub last_decision_turn: Option<u64>,
    memory: VecDeque<String>,
}

impl AiBehaviorComponent {
    pub fn new(behavior: BehaviorClass, vision_range: u32) -> Self {
        Self {
            behavior,
            vision_range,
            decision_cooldown: 1,
            last_decision_turn: None,
            memory: VecDeque::with_capacity(NPC_MEMORY_CAPACITY),
        }
    }

    pub fn with_cooldown(mut self, turns: u64) -> Self {
        self.decision_cooldown = turns;
        self
    }

    /// Whether the cooldown has elapsed at `turn`.
    pub fn can_make_decision(&self, turn: u64) -> bool {
        match self.last_decision_turn {
            Some(last) => turn.saturating_sub(last) >= self.decision_cooldown,
            None => true,
        }
    }

    pub fn reset_cooldown(&mut self, turn: u64) {
        self.last_decision_turn = Some(turn);
    }

    /// Appends to the rolling memory, evicting the oldest entry when full.
    pub fn remember(&mut self, event: impl Into<String>) {
        while self.memory.len() >= NPC_MEMORY_CAPACITY {
            self.memory.pop_front();
        }
        self.memory.push_back(event.into());
    }

    pub fn memory(&self) -> impl ExactSizeIterator<Item = &str> {
        self.memory.iter().map(String::as_str)
    }

    /// The most recent `count` memories, oldest first.
    pub fn recent_memory(&self, count: usize) -> Vec<String> {
        let skip = self.memory.len().saturating_sub(count);
        self.memory.iter().skip(skip).cloned().collect()
    }
}

/// Player-only data carried alongside the shared components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerComponent {
    pub name: String,
    pub inventory: Vec<String>,
    pub experience: u32,
}

impl PlayerComponent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inventory: Vec::new(),
            experience: 0,
        }
    }
}
