//! # Delve Main Entry Point
//!
//! Runs a seeded, headless session: the autopilot walks the player toward the
//! stairs while the NPCs take their turns.

use clap::Parser;
use delve::{
    ActionOutcome, AiBehaviorComponent, Autopilot, BehaviorClass, DelveResult, GameConfig,
    GameState, LayoutStyle, ScriptedProvider, SuggestionProvider, TurnScheduler,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Command line arguments for Delve.
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(about = "Headless turn-based dungeon simulation with model-suggested NPC behavior")]
#[command(version)]
struct Args {
    /// Random seed for dungeon generation
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of player turns to simulate
    #[arg(short, long, default_value_t = 200)]
    turns: u32,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Level layout (rooms, caves, hybrid)
    #[arg(long)]
    layout: Option<LayoutStyle>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// File of canned suggestion responses, one per line
    #[arg(long)]
    suggestions: Option<PathBuf>,

    /// Print the map after every turn
    #[arg(long)]
    show_map: bool,
}

#[tokio::main]
async fn main() -> DelveResult<()> {
    let args = Args::parse();

    initialize_logging(&args.log_level)?;

    log::info!("Starting Delve v{}", delve::VERSION);

    let mut config = match &args.config {
        Some(path) => GameConfig::from_json_file(path)?,
        None => GameConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.generation.seed = seed;
    }
    if let Some(layout) = args.layout {
        config.generation.layout = layout;
    }

    let provider: Option<Arc<dyn SuggestionProvider>> = match &args.suggestions {
        Some(path) => Some(Arc::new(ScriptedProvider::from_file(path)?)),
        None => None,
    };

    run_session(&args, config, provider).await
}

/// Initializes the logging system based on the specified log level.
fn initialize_logging(log_level: &str) -> DelveResult<()> {
    #[cfg(feature = "dev-tools")]
    {
        let level = match log_level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "info" => tracing::Level::INFO,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        env_logger::Builder::new()
            .parse_filters(log_level)
            .format_timestamp(None)
            .init();
    }

    Ok(())
}

/// Plays up to `args.turns` turns, then prints the session statistics.
async fn run_session(
    args: &Args,
    config: GameConfig,
    provider: Option<Arc<dyn SuggestionProvider>>,
) -> DelveResult<()> {
    let mut scheduler = TurnScheduler::with_provider(config, provider)?;
    let mut autopilot = Autopilot::new();

    let shutdown = scheduler.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("interrupt received, cancelling the current turn");
            shutdown.shutdown();
        }
    });

    if args.show_map {
        println!("{}", render_map(scheduler.state()));
    }

    for _ in 0..args.turns {
        let command = autopilot.next_command(scheduler.state())?;
        let summary = scheduler.play_turn(command).await?;
        log::debug!("{} -> {:?}", command, summary.outcome);

        if summary.outcome == ActionOutcome::PlayerDead {
            log::info!("the player has died");
            break;
        }
        if summary.ai.as_ref().map_or(false, |report| report.cancelled) {
            break;
        }
        if args.show_map {
            println!("{}", render_map(scheduler.state()));
        }
    }

    let state = scheduler.state();
    let stats = &state.statistics;
    println!(
        "level {} after {} turns: {} steps, {} defeated, {} damage dealt, {} damage taken, health {}",
        state.dungeon_level,
        state.turn_number,
        stats.steps_taken,
        stats.enemies_defeated,
        stats.damage_dealt,
        stats.damage_taken,
        state.player_health().map_or(0, |health| health.current())
    );
    Ok(())
}

/// The ASCII map with entities drawn over the tiles.
fn render_map(state: &GameState) -> String {
    let width = state.grid.width() as usize;
    let mut cells: Vec<char> = state
        .grid
        .to_ascii()
        .chars()
        .filter(|&c| c != '\n')
        .collect();

    for id in state.entities.ids() {
        let Some(pos) = state.entities.position_of(id) else {
            continue;
        };
        let glyph = if id == state.player_id {
            '@'
        } else {
            match state.entities.get::<AiBehaviorComponent>(id).map(|ai| ai.behavior) {
                Some(BehaviorClass::Hostile) => 'h',
                Some(BehaviorClass::Passive) => 'p',
                Some(BehaviorClass::Neutral) => 'n',
                None => '?',
            }
        };
        if let Some(cell) = cells.get_mut(pos.y as usize * width + pos.x as usize) {
            *cell = glyph;
        }
    }

    cells
        .chunks(width.max(1))
        .map(|row| row.iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
