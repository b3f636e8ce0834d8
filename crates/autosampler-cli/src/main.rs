//! Autosampler CLI - train a drum sound model and sample variations from it
//!
//! This binary provides commands for scanning a drum corpus, training the
//! conditional VAE, generating stereo variants from seed sounds, and
//! inspecting extracted features.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use autosampler_cli::commands;

/// Autosampler - Generative drum sampler
#[derive(Parser)]
#[command(name = "autosampler")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a corpus directory and report which audio files are usable
    Scan {
        /// Directory to scan recursively for .wav and .mp3 files
        #[arg(short, long)]
        input_dir: PathBuf,
    },

    /// Train a model on a corpus of drum sounds
    Train {
        /// Directory containing the training corpus
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Directory to write the model snapshot into
        #[arg(short, long, default_value = "./models")]
        models_dir: PathBuf,

        /// Number of training epochs (50 when omitted)
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Base seed for weight init and shuffling (random when omitted)
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Generate stereo variants of a seed sound with a trained model
    Generate {
        /// Seed audio file to derive variants from
        #[arg(short = 'f', long)]
        seed_file: PathBuf,

        /// Directory containing the model snapshot
        #[arg(short, long, default_value = "./models")]
        models_dir: PathBuf,

        /// Relative pitch shift applied to the condition, e.g. 0.1 or -0.2
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        pitch_shift: f32,

        /// Relative variation shift applied to the condition
        #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
        variation_shift: f32,

        /// Directory to write variant WAVs into
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Base seed for latent sampling and phase init (random when omitted)
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Inspect the features extracted from a single audio file
    Inspect {
        /// Audio file to analyze
        #[arg(short, long)]
        input: PathBuf,

        /// Output machine-readable JSON instead of colored text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Scan { input_dir } => commands::scan::run(&input_dir),
        Commands::Train {
            input_dir,
            models_dir,
            epochs,
            seed,
        } => commands::train::run(&input_dir, &models_dir, epochs, seed),
        Commands::Generate {
            seed_file,
            models_dir,
            pitch_shift,
            variation_shift,
            out_dir,
            seed,
        } => commands::generate::run(
            &seed_file,
            &models_dir,
            pitch_shift,
            variation_shift,
            &out_dir,
            seed,
        ),
        Commands::Inspect { input, json } => commands::inspect::run(&input, json),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {:#}", colored::Colorize::red("error"), e);
            ExitCode::from(1)
        }
    }
}
