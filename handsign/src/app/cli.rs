//! Command-Line Interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Handsign - Two-handed gesture recognition from hand-landmark streams
#[derive(Parser, Debug)]
#[command(name = "handsign")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record labeled samples of one gesture
    Record {
        /// Gesture name (trimmed and lower-cased)
        class: String,

        /// Landmark stream, one JSON frame per line ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Number of samples to record
        #[arg(short = 'n', long, default_value = "1")]
        samples: usize,

        /// Frames per sample (overrides pipeline.sequence_length)
        #[arg(short, long)]
        length: Option<usize>,

        /// Corpus root (overrides dataset.root)
        #[arg(short, long)]
        root: Option<PathBuf>,
    },

    /// Recognize gestures continuously from a landmark stream
    Recognize {
        /// Landmark stream, one JSON frame per line ("-" for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Minimum confidence (0..1) for a label change
        #[arg(short, long)]
        threshold: Option<f32>,

        /// Frames per window (must match the model)
        #[arg(short, long)]
        length: Option<usize>,

        /// Remote predict URL instead of the local model
        #[arg(long)]
        remote: Option<String>,

        /// Do not speak label changes
        #[arg(long)]
        no_speech: bool,

        /// Pace the stream at the configured tick interval
        #[arg(long)]
        realtime: bool,
    },

    /// Check the corpus for corrupt samples
    Validate {
        /// Corpus root (overrides dataset.root)
        root: Option<PathBuf>,

        /// Move corrupt files into the quarantine directory
        #[arg(short, long)]
        quarantine: bool,

        /// Print the per-class distribution chart
        #[arg(long)]
        chart: bool,
    },

    /// Train a model and write the model/catalog pair
    Train {
        /// Corpus root (overrides dataset.root)
        root: Option<PathBuf>,

        /// Model output path (overrides artifacts.model_path)
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// Catalog output path (overrides artifacts.catalog_path)
        #[arg(long)]
        catalog_out: Option<PathBuf>,

        /// Split seed (overrides training.seed)
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Answer one predict request with the local model
    Predict {
        /// Request body {"features": [[...], ...]} ("-" for stdin)
        #[arg(default_value = "-")]
        request: PathBuf,
    },

    /// List the classes of the trained model
    Classes,

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "recognition.confidence_threshold")
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a specific configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// True when `path` names standard input
    pub fn is_stdin(path: &std::path::Path) -> bool {
        path.as_os_str() == "-"
    }
}
