//! # AI Module
//!
//! NPC decision making.
//!
//! Decisions are layered. The [`BehaviorSelector`] always has an answer; an
//! external [`SuggestionProvider`] may override it when it answers in time
//! with a schema-valid [`AiAction`]. The [`DecisionPipeline`] glues the two
//! together and absorbs every suggestion failure.

pub mod action;
pub mod behavior;
pub mod context;
pub mod pipeline;
pub mod provider;

pub use action::*;
pub use behavior::*;
pub use context::*;
pub use pipeline::*;
pub use provider::*;
