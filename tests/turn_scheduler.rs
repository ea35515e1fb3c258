//! Integration tests for the turn loop, the suggestion fallback and
//! persistence.

use delve::{
    ActionOutcome, Autopilot, DecisionError, DecisionSource, Direction, GameConfig, GameState,
    PlayerCommand, ScriptedProvider, StalledProvider, SuggestionProvider, TurnEvent, TurnPhase,
    TurnScheduler,
};
use std::sync::Arc;
use std::time::Duration;

fn scheduler_with(provider: impl SuggestionProvider + 'static, timeout_ms: u64) -> TurnScheduler {
    let mut config = GameConfig::for_testing(42);
    config.pipeline.suggestion_timeout_ms = timeout_ms;
    TurnScheduler::with_provider(config, Some(Arc::new(provider))).unwrap()
}

fn legal(direction: Direction) -> bool {
    direction.is_none() || Direction::CARDINALS.contains(&direction)
}

#[tokio::test]
async fn turns_alternate_strictly() {
    let mut scheduler = TurnScheduler::new(GameConfig::for_testing(42)).unwrap();
    let mut events = scheduler.subscribe();

    for turn in 0..10 {
        assert_eq!(scheduler.state().current_turn, TurnPhase::Player);
        assert_eq!(scheduler.state().turn_number, turn);

        let outcome = scheduler.submit_player_action(PlayerCommand::Wait).unwrap();
        assert_eq!(outcome, ActionOutcome::Waited);
        assert_eq!(scheduler.state().current_turn, TurnPhase::Ai);
        assert_eq!(
            scheduler.submit_player_action(PlayerCommand::Wait).unwrap(),
            ActionOutcome::NotPlayerTurn
        );

        scheduler.resolve_ai_turn().await.unwrap();
        assert!(scheduler.resolve_ai_turn().await.is_err());
    }

    let mut advanced = 0;
    while let Ok(event) = events.try_recv() {
        if let TurnEvent::TurnAdvanced { phase, .. } = event {
            assert_eq!(phase, TurnPhase::Player);
            advanced += 1;
        }
    }
    assert_eq!(advanced, 10);
}

#[tokio::test]
async fn stalled_provider_falls_back_every_turn() {
    let mut scheduler = scheduler_with(StalledProvider, 20);
    let npcs = scheduler.state().npcs().len();
    assert!(npcs > 0);

    for _ in 0..3 {
        let report = scheduler.play_turn(PlayerCommand::Wait).await.unwrap().ai.unwrap();
        assert_eq!(report.decisions.len(), npcs);
        assert_eq!(report.fallbacks, npcs);
        for decision in &report.decisions {
            assert!(legal(decision.direction));
            assert_eq!(decision.source, DecisionSource::Fallback(DecisionError::Timeout(20)));
        }
        assert_eq!(scheduler.state().current_turn, TurnPhase::Player);
    }
}

#[tokio::test]
async fn garbage_suggestions_fall_back() {
    let mut scheduler = scheduler_with(
        ScriptedProvider::new([
            "I would rather dance",
            r#"{"intent": "dance"}"#,
            r#"{"intent": "attack", "intensity": 11}"#,
            r#"{"intent": "attack", "direction": {"x": 1, "y": 1}}"#,
        ]),
        500,
    );

    for _ in 0..4 {
        let report = scheduler.play_turn(PlayerCommand::Wait).await.unwrap().ai.unwrap();
        assert!(!report.decisions.is_empty());
        for decision in &report.decisions {
            assert!(decision.is_fallback(), "{:?}", decision.source);
            assert!(legal(decision.direction));
        }
    }
}

#[tokio::test]
async fn valid_suggestions_are_followed() {
    let mut scheduler = scheduler_with(
        ScriptedProvider::constant(
            r#"Sure! {"intent": "trade", "dialog": "Fine wares, traveller"} Anything else?"#,
        ),
        500,
    );
    let mut events = scheduler.subscribe();

    let report = scheduler.play_turn(PlayerCommand::Wait).await.unwrap().ai.unwrap();
    for decision in &report.decisions {
        assert!(matches!(decision.source, DecisionSource::Suggestion(_)));
        assert_eq!(decision.direction, Direction::NONE);
    }

    let spoken = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, TurnEvent::NpcSpoke { line, .. } if line == "Fine wares, traveller"))
        .count();
    assert_eq!(spoken, report.decisions.len());
}

#[tokio::test]
async fn shutdown_cancels_inflight_turn() {
    let mut scheduler = scheduler_with(StalledProvider, 60_000);
    let before = scheduler.snapshot();
    let handle = scheduler.shutdown_handle();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.shutdown();
    });

    let summary = tokio::time::timeout(
        Duration::from_secs(5),
        scheduler.play_turn(PlayerCommand::Wait),
    )
    .await
    .expect("shutdown must not wait for the provider")
    .unwrap();

    let report = summary.ai.unwrap();
    assert!(report.cancelled);
    assert!(report.decisions.is_empty());
    assert_eq!(scheduler.state().entities, before.entities);
    assert_eq!(scheduler.state().current_turn, TurnPhase::Player);
    assert!(scheduler.state().validate().is_ok());
}

#[tokio::test]
async fn same_seed_same_session() {
    async fn run() -> GameState {
        let mut scheduler = TurnScheduler::new(GameConfig::for_testing(9)).unwrap();
        let mut autopilot = Autopilot::new();
        for _ in 0..30 {
            let command = autopilot.next_command(scheduler.state()).unwrap();
            scheduler.play_turn(command).await.unwrap();
        }
        scheduler.snapshot()
    }

    assert_eq!(run().await, run().await);
}

#[test]
fn autopilot_session_keeps_invariants() {
    let mut scheduler = TurnScheduler::new(GameConfig::for_testing(3)).unwrap();
    let mut autopilot = Autopilot::new();

    for _ in 0..150 {
        let command = autopilot.next_command(scheduler.state()).unwrap();
        let summary = tokio_test::block_on(scheduler.play_turn(command)).unwrap();
        if summary.outcome == ActionOutcome::PlayerDead {
            break;
        }
        let state = scheduler.state();
        assert!(state.validate().is_ok());
        assert_eq!(state.current_turn, TurnPhase::Player);
    }
}

#[test]
fn snapshot_round_trips_through_a_file() {
    let mut scheduler = TurnScheduler::new(GameConfig::for_testing(42)).unwrap();
    tokio_test::block_on(scheduler.play_turn(PlayerCommand::Wait)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("save.json");
    let saved = scheduler.snapshot();
    saved.save_to_file(&path).unwrap();

    let loaded = GameState::load_from_file(&path).unwrap();
    assert_eq!(loaded, saved);

    scheduler.reset().unwrap();
    assert_eq!(scheduler.state().turn_number, 0);
    scheduler.restore(loaded).unwrap();
    assert_eq!(scheduler.snapshot(), saved);
}

#[test]
fn corrupt_snapshot_is_refused() {
    let mut scheduler = TurnScheduler::new(GameConfig::for_testing(42)).unwrap();
    let mut state = scheduler.snapshot();
    let player = state.player_id;
    state.entities.destroy_entity(player);

    assert!(scheduler.restore(state).is_err());
    assert!(scheduler.state().validate().is_ok());
}

#[test]
fn truncated_grid_in_save_is_refused() {
    let scheduler = TurnScheduler::new(GameConfig::for_testing(42)).unwrap();
    let json = scheduler.snapshot().save_to_json().unwrap();

    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    value["grid"]["tiles"] = serde_json::json!([]);
    let corrupt = serde_json::to_string(&value).unwrap();

    assert!(matches!(
        GameState::load_from_json(&corrupt),
        Err(delve::DelveError::InvalidState(_))
    ));
}
