//! Coin Appraiser - command line front end
//!
//! Runs the analysis or identification pipeline on an image file and prints
//! the JSON result.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use coin_appraiser::config::{default_config_path, load_config, AppConfig};
use coin_appraiser::vision::ModelManager;
use coin_appraiser::{CoinPipeline, Response};

/// Coin detection, identification and value estimation
#[derive(Parser, Debug)]
#[command(name = "coin-appraiser")]
#[command(about = "Detects coins in a photo and estimates their type, year and value")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Skip the CLIP classifier and identify from OCR text only
    #[arg(long, global = true)]
    no_classifier: bool,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find and appraise every coin in a photo
    Analyze {
        /// Image file
        image: PathBuf,
    },
    /// Identify a photo showing a single coin
    Identify {
        /// Image file
        image: PathBuf,
    },
    /// Show model status
    Models {
        /// Download missing models
        #[arg(long)]
        download: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so stdout stays valid JSON
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let mut config = resolve_config(args.config.as_deref())?;
    if args.no_classifier {
        config.classifier.enabled = false;
    }

    match args.command {
        Command::Analyze { image } => {
            let bytes = read_image(&image)?;
            let response = CoinPipeline::from_config(&config).analyze_response(&bytes);
            print_response(&response, args.pretty)
        }
        Command::Identify { image } => {
            let bytes = read_image(&image)?;
            let response = CoinPipeline::from_config(&config).identify_response(&bytes);
            print_response(&response, args.pretty)
        }
        Command::Models { download } => {
            let manager = ModelManager::from_settings(config.classifier.models_dir.as_deref())?;
            if download {
                manager.ensure_all_models()?;
            }
            println!("Models directory: {}", manager.models_dir().display());
            for status in manager.model_status() {
                println!(
                    "  {:<20} {:<10} {}",
                    status.model_type.display_name(),
                    if status.available { "ready" } else { "missing" },
                    status
                        .size_bytes
                        .map(|b| format!("{:.1} MB", b as f64 / 1_000_000.0))
                        .unwrap_or_default()
                );
            }
            if !manager.are_models_ready() {
                println!("Classifier models incomplete; run with --download to fetch them");
            }
            Ok(())
        }
    }
}

/// Explicit path must load; the default path falls back to defaults when absent
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    if let Some(path) = path {
        return load_config(path).with_context(|| format!("Failed to load config {:?}", path));
    }

    match default_config_path() {
        Ok(path) if path.exists() => {
            info!("Loading config from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config {:?}", path))
        }
        Ok(_) => Ok(AppConfig::default()),
        Err(e) => {
            warn!("No config directory ({}), using defaults", e);
            Ok(AppConfig::default())
        }
    }
}

fn read_image(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read image {:?}", path))
}

fn print_response<T: Serialize>(response: &Response<T>, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(response)?
    } else {
        serde_json::to_string(response)?
    };
    println!("{}", json);

    if !response.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
