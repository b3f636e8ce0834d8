//! Generate command implementation
//!
//! Loads a trained snapshot and synthesizes four stereo variants of a seed
//! sound, writing them into the output directory.

use anyhow::{Context, Result};
use autosampler::model::snapshot::{load_snapshot, SNAPSHOT_FILE_NAME};
use autosampler::rng::create_component_rng;
use autosampler::{AudioConfig, ModelDims, Synthesizer, WavResult};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use super::resolve_seed;

/// Run the generate command
///
/// # Returns
/// Exit code: 0 success, 2 synthesis failure
pub fn run(
    seed_file: &Path,
    models_dir: &Path,
    pitch_shift: f32,
    variation_shift: f32,
    out_dir: &Path,
    seed: Option<u64>,
) -> Result<ExitCode> {
    let start = Instant::now();
    let config = AudioConfig::default();
    let seed = resolve_seed(seed);

    let snapshot_path = models_dir.join(SNAPSHOT_FILE_NAME);
    let model = load_snapshot(&snapshot_path, ModelDims::for_config(&config)).with_context(
        || format!("cannot load model snapshot from '{}'", snapshot_path.display()),
    )?;

    println!("{} {}", "Seed sound:".cyan().bold(), seed_file.display());
    println!("{} {}", "Seed:".cyan().bold(), seed);
    if pitch_shift != 0.0 || variation_shift != 0.0 {
        println!(
            "{} pitch {:+.3}, variation {:+.3}",
            "Shift:".cyan().bold(),
            pitch_shift,
            variation_shift
        );
    }

    let synthesizer = Synthesizer::new(model, config.clone())?;
    let variants = match synthesizer.generate(
        seed_file,
        pitch_shift,
        variation_shift,
        &mut create_component_rng(seed, "synth"),
    ) {
        Ok(variants) => variants,
        Err(e) => {
            println!("\n{} {}", "FAILED".red().bold(), e);
            return Ok(ExitCode::from(2));
        }
    };

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("cannot create output directory '{}'", out_dir.display()))?;

    let stem = seed_file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("variant");
    for (i, clip) in variants.iter().enumerate() {
        let wav = WavResult::from_stereo_sample(clip, config.sample_rate);
        let out_path = out_dir.join(format!("{stem}_variant_{i}.wav"));
        std::fs::write(&out_path, &wav.wav_data)
            .with_context(|| format!("cannot write '{}'", out_path.display()))?;
        println!(
            "  {} {} ({:.2}s, pcm {})",
            "wrote".green(),
            out_path.display(),
            wav.duration_seconds(),
            &wav.pcm_hash[..16]
        );
    }

    println!(
        "\n{} Generated {} variant(s) in {}ms",
        "SUCCESS".green().bold(),
        variants.len(),
        start.elapsed().as_millis()
    );
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_fails_without_snapshot() {
        let tmp = tempfile::tempdir().unwrap();
        let seed_file = tmp.path().join("kick.wav");
        std::fs::write(&seed_file, b"placeholder").unwrap();

        let err = run(&seed_file, tmp.path(), 0.0, 0.0, tmp.path(), Some(1)).unwrap_err();
        assert!(format!("{err:#}").contains("snapshot"));
    }
}
