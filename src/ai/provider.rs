//! # Suggestion Providers
//!
//! The async boundary to whatever produces action suggestions. Providers do
//! not need to enforce deadlines; the pipeline wraps every call in its own
//! timeout.

use crate::ai::CompactContext;
use crate::{DelveError, DelveResult};
use async_trait::async_trait;
use std::path::Path;

/// Failure reported by a provider.
#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    /// The backing model or service is not reachable
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    /// A scripted provider has nothing to replay
    #[error("no scripted responses")]
    Empty,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces raw, untrusted text suggesting an NPC action.
///
/// Providers backed by a text model send [`CompactContext::to_prompt`] as
/// their request; the replay providers here ignore it.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// Suggest an action for the NPC described by `context`.
    async fn suggest(&self, context: &CompactContext) -> Result<String, ProviderError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Replays canned responses.
///
/// The response for a call is chosen by the context's turn number, so every
/// NPC sees the same line on a given turn and replays are independent of
/// task completion order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProvider {
    responses: Vec<String>,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
        }
    }

    /// Always answers with `response`.
    pub fn constant(response: impl Into<String>) -> Self {
        Self::new([response.into()])
    }

    /// Loads one response per non-empty line of a text file.
    pub fn from_file(path: impl AsRef<Path>) -> DelveResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let provider = Self::new(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
        if provider.responses.is_empty() {
            return Err(DelveError::Configuration(format!(
                "suggestion script {} has no responses",
                path.as_ref().display()
            )));
        }
        Ok(provider)
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}

#[async_trait]
impl SuggestionProvider for ScriptedProvider {
    async fn suggest(&self, context: &CompactContext) -> Result<String, ProviderError> {
        if self.responses.is_empty() {
            return Err(ProviderError::Empty);
        }
        let index = (context.turn_number % self.responses.len() as u64) as usize;
        Ok(self.responses[index].clone())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// A provider that never answers.
#[derive(Debug, Clone, Copy, Default)]
pub struct StalledProvider;

#[async_trait]
impl SuggestionProvider for StalledProvider {
    async fn suggest(&self, _context: &CompactContext) -> Result<String, ProviderError> {
        std::future::pending().await
    }

    fn name(&self) -> &'static str {
        "stalled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BehaviorClass, EntityId, Position};
    use std::io::Write;

    fn context(turn_number: u64) -> CompactContext {
        CompactContext {
            dungeon_level: 1,
            turn_number,
            player_position: Some(Position::new(1, 1)),
            npc_id: EntityId(2),
            npc_position: Position::new(4, 4),
            npc_behavior: BehaviorClass::Hostile,
            npc_health: 20,
            visible_entities: 1,
            recent_memory: Vec::new(),
        }
    }

    #[test]
    fn test_scripted_provider_cycles_by_turn() {
        let provider = ScriptedProvider::new(["a", "b"]);
        assert_eq!(tokio_test::block_on(provider.suggest(&context(0))).unwrap(), "a");
        assert_eq!(tokio_test::block_on(provider.suggest(&context(1))).unwrap(), "b");
        assert_eq!(tokio_test::block_on(provider.suggest(&context(2))).unwrap(), "a");
    }

    #[test]
    fn test_empty_script_fails() {
        let provider = ScriptedProvider::default();
        assert!(matches!(
            tokio_test::block_on(provider.suggest(&context(0))),
            Err(ProviderError::Empty)
        ));
    }

    #[test]
    fn test_script_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"intent": "flee"}}"#).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "garbage").unwrap();

        let provider = ScriptedProvider::from_file(file.path()).unwrap();
        assert_eq!(provider.len(), 2);

        let empty = tempfile::NamedTempFile::new().unwrap();
        assert!(ScriptedProvider::from_file(empty.path()).is_err());
    }

    #[tokio::test]
    async fn test_stalled_provider_never_answers() {
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            StalledProvider.suggest(&context(0)),
        )
        .await;
        assert!(result.is_err());
    }
}
