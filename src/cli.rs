//! Command-line arguments and logging setup

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bridge::hue::DISCOVERY_URL;

/// Glovelight - Drive Hue light colors from MIDI CC sliders
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the Glovelight file
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log available MIDI input ports and exit
    #[arg(long, alias = "just-log-ports")]
    pub list_ports: bool,

    /// Bridge discovery endpoint
    #[arg(long, env = "GLOVELIGHT_DISCOVERY_URL", default_value = DISCOVERY_URL)]
    pub discovery_url: String,
}

impl Args {
    /// Effective log filter; `--debug` overrides `--log-level`
    pub fn log_filter(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

/// Install the global tracing subscriber; `RUST_LOG` takes precedence over `level`
pub fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["glovelight"]).unwrap();

        assert_eq!(args.config, None);
        assert!(!args.debug);
        assert!(!args.list_ports);
        assert_eq!(args.discovery_url, DISCOVERY_URL);
    }

    #[test]
    fn test_debug_overrides_level() {
        let args = Args::try_parse_from([
            "glovelight",
            "--debug",
            "--log-level",
            "warn",
            "lights.yaml",
        ])
        .unwrap();

        assert_eq!(args.log_filter(), "debug");
        assert_eq!(args.config, Some(PathBuf::from("lights.yaml")));
    }

    #[test]
    fn test_list_ports_alias() {
        let args = Args::try_parse_from(["glovelight", "--just-log-ports"]).unwrap();
        assert!(args.list_ports);
    }

    #[test]
    fn test_invariants() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
