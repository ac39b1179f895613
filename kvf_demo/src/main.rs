//! kvf demo
//!
//! Opens a window, renders an offscreen pass or a small texture to the backbuffer and
//! draws a Dear ImGui overlay on top.

mod app;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use kvf::config::{Config, RenderDeviceConfig};

/// Command line options
#[derive(Debug)]
pub struct Args {
    /// Directory holding optional assets (`image.png`, `font.ttf`)
    pub assets: PathBuf,
    /// Render device config file (`.toml` or `.ron`)
    pub config: Option<PathBuf>,
    /// Open a fullscreen window on the primary monitor
    pub fullscreen: bool,
}

fn parse_args() -> Args {
    let matches = Command::new("kvf_demo")
        .about("Renders a texture and a Dear ImGui overlay with kvf")
        .arg(
            Arg::new("assets")
                .short('a')
                .long("assets")
                .value_name("DIR")
                .help("Directory with optional image.png and font.ttf")
                .default_value("."),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Render device config (.toml or .ron)"),
        )
        .arg(
            Arg::new("fullscreen")
                .short('f')
                .long("fullscreen")
                .help("Open a fullscreen window")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    Args {
        assets: matches
            .get_one::<String>("assets")
            .map_or_else(|| PathBuf::from("."), PathBuf::from),
        config: matches.get_one::<String>("config").map(PathBuf::from),
        fullscreen: matches.get_flag("fullscreen"),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<RenderDeviceConfig> {
    let Some(path) = path else {
        return Ok(RenderDeviceConfig::default());
    };
    let config = RenderDeviceConfig::load_from_file(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    log::info!("Loaded render device config from {}", path.display());
    Ok(config)
}

fn main() -> Result<()> {
    kvf::foundation::logging::init();

    let args = parse_args();
    log::info!("Starting kvf demo, assets: {}", args.assets.display());

    let config = load_config(args.config.as_ref())?;
    let mut app = app::App::new(&args, &config).context("Failed to initialize the demo")?;
    app.run()?;

    log::info!("kvf demo exited cleanly");
    Ok(())
}
