//! # Suggested Actions
//!
//! The schema an external suggestion must satisfy, and the parser that turns
//! untrusted provider text into a validated [`AiAction`].

use crate::config::{MAX_DIALOG_CHARS, MAX_TARGET_CHARS};
use crate::Direction;
use serde::{Deserialize, Serialize};

/// Why a suggestion was not used. Every variant leads to the rule-based fallback.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecisionError {
    #[error("suggestion timed out after {0} ms")]
    Timeout(u64),

    #[error("provider failed: {0}")]
    Provider(String),

    #[error("no JSON object found in suggestion")]
    NoJsonFound,

    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("illegal movement direction ({dx}, {dy})")]
    IllegalDirection { dx: i64, dy: i64 },
}

/// What the NPC wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Attack,
    #[serde(alias = "move")]
    Explore,
    Trade,
    Flee,
}

/// Direction as it appears on the wire: `{"x": -1|0|1, "y": -1|0|1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectionSpec {
    pub x: i64,
    pub y: i64,
}

/// A schema-valid suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AiAction {
    #[serde(alias = "action")]
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, alias = "dialogue", skip_serializing_if = "Option::is_none")]
    pub dialog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<DirectionSpec>,
}

impl AiAction {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            target: None,
            dialog: None,
            intensity: None,
            direction: None,
        }
    }

    /// Checks the value ranges serde cannot express.
    pub fn validate(&self) -> Result<(), DecisionError> {
        if let Some(intensity) = self.intensity {
            if !(0..=10).contains(&intensity) {
                return Err(DecisionError::SchemaViolation(format!(
                    "intensity {intensity} outside [0, 10]"
                )));
            }
        }
        if let Some(dialog) = &self.dialog {
            let len = dialog.chars().count();
            if len > MAX_DIALOG_CHARS {
                return Err(DecisionError::SchemaViolation(format!(
                    "dialog is {len} chars, limit {MAX_DIALOG_CHARS}"
                )));
            }
        }
        if let Some(target) = &self.target {
            if target.chars().count() > MAX_TARGET_CHARS
                || !target.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ')
            {
                return Err(DecisionError::SchemaViolation(format!(
                    "target '{target}' must be at most {MAX_TARGET_CHARS} letters, digits or spaces"
                )));
            }
        }
        if let Some(DirectionSpec { x, y }) = self.direction {
            if !(-1..=1).contains(&x) || !(-1..=1).contains(&y) {
                return Err(DecisionError::SchemaViolation(format!(
                    "direction ({x}, {y}) has an axis outside [-1, 1]"
                )));
            }
        }
        Ok(())
    }

    /// The movement step this action asks for, if it names one.
    ///
    /// Diagonal steps are schema-valid but never committed as movement.
    pub fn movement(&self) -> Result<Option<Direction>, DecisionError> {
        let Some(DirectionSpec { x, y }) = self.direction else {
            return Ok(None);
        };
        let in_range = (-1..=1).contains(&x) && (-1..=1).contains(&y);
        if !in_range || (x != 0 && y != 0) {
            return Err(DecisionError::IllegalDirection { dx: x, dy: y });
        }
        Ok(Some(Direction {
            dx: x as i32,
            dy: y as i32,
        }))
    }
}

/// Finds the first complete JSON object embedded in free text.
///
/// Every `{` is tried as a start position in order; the first one that parses
/// as a whole object wins, so prose around the object and nested objects
/// inside it are both fine.
pub fn extract_json(text: &str) -> Result<serde_json::Value, DecisionError> {
    let mut last_error = None;

    for (start, _) in text.match_indices('{') {
        let mut stream = serde_json::Deserializer::from_str(&text[start..]).into_iter::<serde_json::Value>();
        match stream.next() {
            Some(Ok(value)) if value.is_object() => return Ok(value),
            Some(Err(err)) => last_error = Some(err.to_string()),
            _ => {}
        }
    }

    match last_error {
        Some(err) => Err(DecisionError::MalformedJson(err)),
        None => Err(DecisionError::NoJsonFound),
    }
}

/// Parses and validates untrusted provider output.
///
/// # Examples
///
/// ```
/// use delve::{parse_action, Intent};
///
/// let action = parse_action(r#"Sure! {"action": "flee", "direction": {"x": 1, "y": 0}}"#).unwrap();
/// assert_eq!(action.intent, Intent::Flee);
///
/// assert!(parse_action(r#"{"intent": "dance"}"#).is_err());
/// ```
pub fn parse_action(text: &str) -> Result<AiAction, DecisionError> {
    let value = extract_json(text)?;
    let action: AiAction =
        serde_json::from_value(value).map_err(|err| DecisionError::SchemaViolation(err.to_string()))?;
    action.validate()?;
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_object_from_prose() {
        let text = r#"Here you go: {"intent": "attack", "direction": {"x": 0, "y": -1}} hope it helps"#;
        let action = parse_action(text).unwrap();
        assert_eq!(action.intent, Intent::Attack);
        assert_eq!(action.movement().unwrap(), Some(Direction::NORTH));
    }

    #[test]
    fn test_aliases() {
        let action =
            parse_action(r#"{"action": "move", "dialogue": "Who goes there?"}"#).unwrap();
        assert_eq!(action.intent, Intent::Explore);
        assert_eq!(action.dialog.as_deref(), Some("Who goes there?"));
    }

    #[test]
    fn test_no_json() {
        assert_eq!(parse_action("I think I'll attack."), Err(DecisionError::NoJsonFound));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_action(r#"{"intent": "attack", "#),
            Err(DecisionError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_skips_broken_object_before_valid_one() {
        let action = parse_action(r#"{oops} {"intent": "trade"}"#).unwrap();
        assert_eq!(action.intent, Intent::Trade);
    }

    #[test]
    fn test_schema_rejections() {
        for text in [
            r#"{"intent": "dance"}"#,
            r#"{"intent": "attack", "intensity": 11}"#,
            r#"{"intent": "attack", "intensity": -1}"#,
            r#"{"intent": "attack", "direction": {"x": 2, "y": 0}}"#,
            r#"{"intent": "attack", "mood": "grumpy"}"#,
            r#"{"intent": "attack", "target": "the_player"}"#,
            r#"{"direction": {"x": 1, "y": 0}}"#,
        ] {
            assert!(
                matches!(parse_action(text), Err(DecisionError::SchemaViolation(_))),
                "{text} should violate the schema"
            );
        }
    }

    #[test]
    fn test_dialog_length_limit() {
        let long = "a".repeat(MAX_DIALOG_CHARS + 1);
        let text = format!(r#"{{"intent": "explore", "dialog": "{long}"}}"#);
        assert!(matches!(parse_action(&text), Err(DecisionError::SchemaViolation(_))));

        let exact = "a".repeat(MAX_DIALOG_CHARS);
        let text = format!(r#"{{"intent": "explore", "dialog": "{exact}"}}"#);
        assert!(parse_action(&text).is_ok());
    }

    #[test]
    fn test_diagonal_direction_is_illegal_movement() {
        let action = parse_action(r#"{"intent": "explore", "direction": {"x": 1, "y": 1}}"#).unwrap();
        assert_eq!(
            action.movement(),
            Err(DecisionError::IllegalDirection { dx: 1, dy: 1 })
        );
    }

    #[test]
    fn test_zero_direction_is_hold() {
        let action = parse_action(r#"{"intent": "trade", "direction": {"x": 0, "y": 0}}"#).unwrap();
        assert_eq!(action.movement().unwrap(), Some(Direction::NONE));
    }
}
