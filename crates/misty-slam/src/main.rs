//! misty-slam - map a room with a Misty II robot
//!
//! Resets SLAM, spins until the robot has a pose, traces a cross while
//! mapping and writes the resulting occupancy grid as a PGM image.

mod config;
mod render;
mod walkthrough;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;

#[derive(Parser)]
#[command(name = "misty-slam")]
#[command(author, version, about = "SLAM mapping walkthrough for a Misty II robot")]
struct Cli {
    /// Robot address (IP or hostname)
    #[arg(short, long, env = "MISTY_ROBOT")]
    robot: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "MISTY_SLAM_CONFIG")]
    config: Option<PathBuf>,

    /// Where to write the map image
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip printing the map to the terminal
    #[arg(long)]
    no_preview: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    let settings = config.merge_with_args(cli.robot.as_deref(), cli.output.as_deref())?;
    info!(robot = %settings.client.address, "Starting mapping walkthrough");

    let map = walkthrough::run(&settings).await?;

    render::write_pgm(&map, &settings.output)?;
    info!(path = %settings.output.display(), "Map written");

    if !cli.no_preview {
        println!("{}", render::ascii(&map));
    }

    Ok(())
}
