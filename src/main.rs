//! Planetoid Rush headless runner
//!
//! Plays one game with a simple autopilot and logs mission progress.
//!
//! Usage: `planetoid-rush [MODE] [PLAYERS] [SETTINGS] [--seed N]`

#[cfg(not(target_arch = "wasm32"))]
use std::path::PathBuf;

#[cfg(not(target_arch = "wasm32"))]
use clap::{Parser, ValueEnum};
#[cfg(not(target_arch = "wasm32"))]
use planetoid_rush::sim::ModeKind;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run(Cli::parse()) {
        log::error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The kernel is driven by the embedding host on the web
}

/// Simulated minutes before the demo stops
#[cfg(not(target_arch = "wasm32"))]
const DEMO_MINUTES: u32 = 5;

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    Classic,
    TimeTrial,
    Survival,
    AreaControl,
}

#[cfg(not(target_arch = "wasm32"))]
impl From<Mode> for ModeKind {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Classic => ModeKind::Classic,
            Mode::TimeTrial => ModeKind::TimeTrial,
            Mode::Survival => ModeKind::Survival,
            Mode::AreaControl => ModeKind::AreaControl,
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Parser)]
#[command(name = "planetoid-rush")]
#[command(about = "Run one headless Planetoid Rush game on autopilot")]
struct Cli {
    /// Game mode
    #[arg(value_enum, default_value_t = Mode::Classic)]
    mode: Mode,

    /// Number of players
    #[arg(default_value_t = 1)]
    players: usize,

    /// Settings file (JSON); defaults apply when omitted
    settings: Option<PathBuf>,

    /// RNG seed (defaults to the current time)
    #[arg(long)]
    seed: Option<u64>,
}

#[cfg(not(target_arch = "wasm32"))]
fn run(cli: Cli) -> planetoid_rush::Result<()> {
    use planetoid_rush::Settings;
    use planetoid_rush::consts::SIM_DT;
    use planetoid_rush::sim::{Game, GameEvent, GamePhase, PlayerInput};

    let mode = ModeKind::from(cli.mode);
    let players = cli.players;
    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let seed = cli.seed.unwrap_or_else(|| {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    });
    let mut game = Game::new(settings, seed, mode)?;
    game.start(players)?;
    log::info!(
        "Planetoid Rush (native) running {} headless, seed {seed}",
        mode.as_str()
    );

    let frames = DEMO_MINUTES * 60 * 60;
    for frame in 0..frames {
        // Autopilot: spin and shoot, shield every few seconds
        for player in 0..players {
            let turn = if player % 2 == 0 { 1.0 } else { -1.0 };
            game.set_input(
                player,
                PlayerInput {
                    thrust: frame % 120 < 30,
                    turn,
                    fire: true,
                    shield: frame % 300 == 0,
                    hyperspace: false,
                },
            );
        }
        game.tick(SIM_DT);

        for event in game.drain_events() {
            match event {
                GameEvent::MissionStarted { index, name } => {
                    log::info!("Mission {index}: {name}");
                }
                GameEvent::ShipLost { player, lives } => {
                    log::info!("Player {player} lost a ship, {lives} left");
                }
                GameEvent::GameOver => log::info!("Game over"),
                _ => {}
            }
        }
        if game.world().phase == GamePhase::Over {
            break;
        }
    }

    let hud = game.hud();
    let stats = game.queue_stats();
    log::info!(
        "Finished at frame {} ({:?}); scheduler queues: {} animated, {} deferred, {} periodic",
        hud.frame,
        hud.phase,
        stats.animated,
        stats.deferred,
        stats.periodic
    );
    println!("{}", serde_json::to_string_pretty(&hud)?);
    Ok(())
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["planetoid-rush"]).expect("defaults parse");
        assert_eq!(cli.mode, Mode::Classic);
        assert_eq!(cli.players, 1);
        assert!(cli.settings.is_none());
        assert!(cli.seed.is_none());
    }

    #[test]
    fn test_cli_full() {
        let cli = Cli::try_parse_from([
            "planetoid-rush",
            "time-trial",
            "2",
            "tuned.json",
            "--seed",
            "7",
        ])
        .expect("arguments parse");
        assert_eq!(ModeKind::from(cli.mode), ModeKind::TimeTrial);
        assert_eq!(cli.players, 2);
        assert_eq!(cli.settings, Some(PathBuf::from("tuned.json")));
        assert_eq!(cli.seed, Some(7));
    }

    #[test]
    fn test_cli_mode_names_match_kernel() {
        for mode in Mode::value_variants() {
            let name = mode.to_possible_value().expect("visible").get_name().to_string();
            assert_eq!(name, ModeKind::from(*mode).as_str());
        }
    }

    #[test]
    fn test_cli_help_and_bad_mode() {
        let help = Cli::try_parse_from(["planetoid-rush", "--help"]).expect_err("help exits");
        assert_eq!(help.kind(), clap::error::ErrorKind::DisplayHelp);
        assert!(Cli::try_parse_from(["planetoid-rush", "pong"]).is_err());
    }
}
