use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use flockstep::{
    config::{ScenarioLoader, SimConfig},
    engine::Simulation,
    io::{FrameRecorder, NullRenderer, Renderer, ScriptedInput},
    web::{self, WebServerConfig},
};

/// Round limit for headless runs when neither the scenario nor the CLI sets one
const DEFAULT_HEADLESS_ROUNDS: u64 = 600;

#[derive(Debug, Parser)]
#[command(name = "flockstep", version, about = "Lock-step boids simulation")]
struct Cli {
    /// Enable debug logging regardless of the scenario's level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run headless, playing back the scenario's scripted input
    Run {
        /// Path to the scenario YAML file
        #[arg(long, default_value = "scenarios/meadow.yaml")]
        scenario: PathBuf,

        /// Override the round count
        #[arg(long)]
        rounds: Option<u64>,

        /// Record frames as JSON lines to this file
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Override the worker thread count
        #[arg(long)]
        workers: Option<usize>,

        /// Override the random seed
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Serve the browser viewer; the cursor drives the predator
    Serve {
        /// Path to the scenario YAML file
        #[arg(long, default_value = "scenarios/meadow.yaml")]
        scenario: PathBuf,

        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Target frames per second
        #[arg(long, default_value_t = 30)]
        fps: u32,

        /// Override the round count; runs until quit when unset
        #[arg(long)]
        rounds: Option<u64>,
    },
}

fn load_scenario(path: &Path) -> Result<SimConfig> {
    ScenarioLoader::new(".").load(path)
}

fn init_logging(level: &str, verbose: bool) {
    let level = if verbose {
        Level::DEBUG
    } else {
        level.parse().unwrap_or(Level::INFO)
    };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            scenario,
            rounds,
            frames,
            workers,
            seed,
        } => {
            let mut config = load_scenario(&scenario)?;
            init_logging(&config.logging.level, cli.verbose);
            if let Some(workers) = workers {
                config.workers = workers;
            }
            if let Some(seed) = seed {
                config.random_seed = seed;
            }
            let rounds = config.rounds(rounds).unwrap_or(DEFAULT_HEADLESS_ROUNDS);

            let mut simulation = Simulation::new(&config)?;
            let mut input = ScriptedInput::new(config.script.clone());
            let mut renderer: Box<dyn Renderer> = match &frames {
                Some(path) => Box::new(FrameRecorder::create(
                    path,
                    &config.name,
                    config.recorder.every_rounds,
                )?),
                None => Box::new(NullRenderer),
            };

            let outcome = simulation.run(Some(rounds), &mut input, renderer.as_mut())?;
            if let Some(path) = &frames {
                info!(path = %path.display(), "frames written");
            }
            println!(
                "Scenario '{}' finished after {} rounds. Final population: {}",
                config.name,
                outcome.rounds(),
                simulation.snapshot().len()
            );
        }
        Commands::Serve {
            scenario,
            host,
            port,
            fps,
            rounds,
        } => {
            let config = load_scenario(&scenario)?;
            init_logging(&config.logging.level, cli.verbose);
            if !config.script.is_empty() {
                warn!("scripted input is ignored in serve mode");
            }
            let rounds = config.rounds(rounds);
            let frame_interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
            web::run(WebServerConfig {
                config,
                rounds,
                host,
                port,
                frame_interval,
            })
            .await?;
        }
    }
    Ok(())
}
