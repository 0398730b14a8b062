use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use formflow::carousel::{Carousel, CarouselState};
use formflow::config::Config;
use formflow::logging;
use formflow::script::{run_script, WizardScript};
use formflow::theme::PaletteCache;

#[derive(Parser)]
#[command(name = "formflow")]
#[command(about = "Drive form, carousel and palette state machines from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long)]
    config: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a wizard script (toml, json or yaml) and print the final form state
    Run {
        script: PathBuf,
    },

    /// Step a carousel through its slides and print each settled state
    Carousel {
        /// Comma-separated slide ids
        #[arg(short, long, value_delimiter = ',', required = true)]
        slides: Vec<String>,

        /// Number of transitions to run
        #[arg(short = 'n', long, default_value_t = 1)]
        steps: usize,

        /// Move backwards instead of forwards
        #[arg(long)]
        previous: bool,
    },

    /// Derive button palettes for one or more colors
    Palette {
        #[arg(required = true)]
        colors: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (needed for logging setup)
    let config = Config::load(cli.config.as_deref())?;
    let logging_handle = logging::init_logging(&config, cli.debug)?;

    match cli.command {
        Commands::Run { script } => cmd_run(&config, &script).await?,
        Commands::Carousel {
            slides,
            steps,
            previous,
        } => cmd_carousel(&config, slides, steps, previous).await?,
        Commands::Palette { colors } => cmd_palette(&config, &colors)?,
    }

    if let Some(log_path) = logging_handle.log_file_path {
        eprintln!("Session log: {}", log_path.display());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn cmd_run(config: &Config, path: &Path) -> Result<()> {
    let script = WizardScript::load(path)?;
    info!(script = %path.display(), steps = script.steps.len(), "running wizard script");
    let report = run_script(&script, config.form)
        .await
        .with_context(|| format!("Script {} failed", path.display()))?;
    print_json(&report)
}

async fn cmd_carousel(
    config: &Config,
    slides: Vec<String>,
    steps: usize,
    previous: bool,
) -> Result<()> {
    let carousel = Carousel::new(slides, None, &config.carousel)?;
    let mut states: Vec<CarouselState> = vec![carousel.state()];

    for _ in 0..steps {
        let started = if previous {
            carousel.previous()
        } else {
            carousel.next()
        };
        if !started {
            break;
        }
        states.push(carousel.settled().await);
    }
    print_json(&states)
}

fn cmd_palette(config: &Config, colors: &[String]) -> Result<()> {
    let mut cache = PaletteCache::new(config.theme);
    let mut palettes = Vec::with_capacity(colors.len());
    for color in colors {
        palettes.push(cache.palette(color)?);
    }
    print_json(&palettes)
}
