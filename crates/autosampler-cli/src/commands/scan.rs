//! Scan command implementation
//!
//! Walks a corpus directory and reports which audio files would survive
//! dataset construction, probing each one without decoding it fully.

use anyhow::{Context, Result};
use autosampler::{audio, scan_corpus};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

/// Run the scan command
///
/// # Returns
/// Exit code: 0 success, 1 when the directory yields no audio files
pub fn run(input_dir: &Path) -> Result<ExitCode> {
    println!("{} {}", "Scanning:".cyan().bold(), input_dir.display());

    let paths = scan_corpus(input_dir)
        .with_context(|| format!("cannot scan corpus directory '{}'", input_dir.display()))?;

    if paths.is_empty() {
        println!("\n{} no .wav or .mp3 files found", "FAILED".red().bold());
        return Ok(ExitCode::from(1));
    }

    let mut usable = 0usize;
    for path in &paths {
        match audio::probe(path) {
            Ok(()) => {
                usable += 1;
                println!("  {} {}", "ok".green(), path.display());
            }
            Err(e) => {
                println!("  {} {} ({})", "!".yellow(), path.display(), e);
            }
        }
    }

    println!(
        "\n{} {} of {} file(s) usable",
        "Scanned".cyan().bold(),
        usable,
        paths.len()
    );
    Ok(ExitCode::SUCCESS)
}
