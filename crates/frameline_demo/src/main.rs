// SPDX-License-Identifier: MIT OR Apache-2.0
//! Frameline demo - headless animator scene player
//!
//! Drives the frameline animator from a simulated render loop:
//! - Headless labelled clips
//! - A console sound library with its own clock
//! - A character controller chaining segments
//! - Pause/resume, missing segments and sound-synced lines
//!
//! ## Usage
//!
//! `frameline_demo [SCENE.ron] [--config ANIMATOR.ron]`
//!
//! Without a scene file the built-in intro scene runs. Logging follows
//! `RUST_LOG`.

mod error;
mod scene;
mod sound;

use clap::Parser;
use error::Result;
use frameline_animator::AnimatorConfig;
use scene::{SceneDefinition, SceneRunner};
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene script; the built-in intro scene runs when omitted
    #[arg(value_name = "SCENE")]
    scene: Option<PathBuf>,

    /// Animator configuration file
    #[arg(long, value_name = "ANIMATOR")]
    config: Option<PathBuf>,
}

fn init_logging() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("frameline_animator=debug".parse()?)
        .add_directive("frameline_demo=debug".parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            tracing::info!("Loading animator config from {}", path.display());
            AnimatorConfig::load(path)?
        }
        None => AnimatorConfig::default(),
    };

    let scene = match &args.scene {
        Some(path) => {
            tracing::info!("Loading scene from {}", path.display());
            SceneDefinition::load(path)?
        }
        None => SceneDefinition::builtin()?,
    };

    let runner = SceneRunner::new(config, &scene);
    let report = runner.run(&scene)?;
    tracing::info!(
        "Scene finished after {} frames: {} completions, {} timelines and {} sounds still active",
        report.frames,
        report.completions.len(),
        report.active_timelines,
        report.sounds_playing
    );
    tracing::debug!(
        "Animator subscribed to the update loop: {}",
        runner.animator().is_subscribed()
    );
    Ok(())
}

fn main() {
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    tracing::info!("Starting frameline demo v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(Args::parse()) {
        tracing::error!("Demo failed: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse() {
        let args =
            Args::try_parse_from(["frameline_demo", "scene.ron", "--config", "animator.ron"])
                .unwrap();
        assert_eq!(args.scene, Some(PathBuf::from("scene.ron")));
        assert_eq!(args.config, Some(PathBuf::from("animator.ron")));
    }

    #[test]
    fn test_args_default_to_builtin_scene() {
        let args = Args::try_parse_from(["frameline_demo"]).unwrap();
        assert!(args.scene.is_none());
        assert!(args.config.is_none());
    }

    #[test]
    fn test_unknown_flag_is_rejected() {
        assert!(Args::try_parse_from(["frameline_demo", "--verbose"]).is_err());
    }

    #[test]
    fn test_shipped_config_loads() {
        let config = AnimatorConfig::from_ron(include_str!("../scenes/animator.ron")).unwrap();
        assert_eq!(config.update_alias, "Animator");
    }
}
