//! Glovelight - drive Hue light colors from MIDI CC sliders
//!
//! Loads the Glovelight file, checks the MIDI inputs, connects (or pairs)
//! with the Hue bridge and runs until Ctrl+C.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

use glovelight::bridge::pairing;
use glovelight::cli::{init_logging, Args};
use glovelight::midi::{discovery, MidirSource};
use glovelight::paths::ConfigLocation;
use glovelight::{Glovelight, GlovelightConfig};

/// Startup stage, each with its own exit status
#[derive(Debug, Clone, Copy)]
enum Stage {
    Config,
    Midi,
    Bridge,
    Start,
}

impl Stage {
    fn exit_code(self) -> ExitCode {
        ExitCode::from(match self {
            Stage::Config => 3,
            Stage::Midi => 4,
            Stage::Bridge => 5,
            Stage::Start => 6,
        })
    }

    fn describe(self) -> &'static str {
        match self {
            Stage::Config => "Could not read Glovelight file",
            Stage::Midi => "Could not connect to MIDI input",
            Stage::Bridge => "Could not connect to bridge",
            Stage::Start => "Unable to begin Glovelighting",
        }
    }
}

struct Failure {
    stage: Stage,
    error: anyhow::Error,
}

trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, Failure>;
}

impl<T, E: Into<anyhow::Error>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T, Failure> {
        self.map_err(|e| Failure {
            stage,
            error: e.into(),
        })
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    if let Err(e) = init_logging(args.log_filter()) {
        eprintln!("Failed to initialize logging: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure { stage, error }) => {
            error!("{}: {:#}", stage.describe(), error);
            stage.exit_code()
        }
    }
}

async fn run(args: Args) -> Result<(), Failure> {
    let midi = MidirSource::default();

    if args.list_ports {
        return discovery::log_input_ports(&midi).stage(Stage::Midi);
    }

    let location = ConfigLocation::resolve(args.config.as_deref());
    info!("Glovelight file: {}", location.path().display());

    let config = GlovelightConfig::load(location.path())
        .await
        .stage(Stage::Config)?;
    let mut glovelight = Glovelight::new(config);

    glovelight.connect_to_midi(&midi).stage(Stage::Midi)?;

    let mut stdin = BufReader::new(tokio::io::stdin());
    let bridge = pairing::establish(glovelight.config_mut(), &args.discovery_url, &mut stdin)
        .await
        .stage(Stage::Bridge)?;
    glovelight
        .connect_to_bridge(Arc::new(bridge))
        .await
        .stage(Stage::Bridge)?;

    let running = glovelight.start(&midi).await.stage(Stage::Start)?;
    info!("Glovelight started; awaiting SIGINT...");

    shutdown_signal().await;
    info!("Glovelight received SIGINT, shutting down...");
    running.shutdown();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C, shutting down: {}", e);
    }
}
