//! Train command implementation
//!
//! Builds a dataset from a corpus directory, trains the conditional VAE,
//! and writes the resulting snapshot to disk.

use anyhow::{Context, Result};
use autosampler::model::snapshot::{save_snapshot, SNAPSHOT_FILE_NAME};
use autosampler::rng::create_component_rng;
use autosampler::{
    build_dataset, scan_corpus, train, AudioConfig, Cvae, FeatureExtractor, ModelDims, TrainConfig,
};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

use super::resolve_seed;

/// Run the train command
///
/// # Returns
/// Exit code: 0 success, 1 empty/unusable corpus, 2 training or snapshot failure
pub fn run(
    input_dir: &Path,
    models_dir: &Path,
    epochs: Option<usize>,
    seed: Option<u64>,
) -> Result<ExitCode> {
    let start = Instant::now();
    let config = AudioConfig::default();
    let mut train_config = TrainConfig::default();
    if let Some(epochs) = epochs {
        train_config.epochs = epochs;
    }
    train_config
        .validate()
        .context("invalid training configuration")?;
    let seed = resolve_seed(seed);

    println!("{} {}", "Corpus:".cyan().bold(), input_dir.display());
    println!("{} {}", "Seed:".cyan().bold(), seed);

    let paths = scan_corpus(input_dir)
        .with_context(|| format!("cannot scan corpus directory '{}'", input_dir.display()))?;

    let extractor = FeatureExtractor::new(config.clone());
    let (dataset, skipped) = build_dataset(&paths, &extractor);
    for skip in &skipped {
        println!(
            "  {} {} ({})",
            "!".yellow(),
            skip.path.display(),
            skip.reason
        );
    }
    if dataset.is_empty() {
        println!(
            "\n{} corpus contains no decodable audio",
            "FAILED".red().bold()
        );
        return Ok(ExitCode::from(1));
    }
    println!(
        "{} {} clip(s), {} skipped",
        "Dataset:".cyan().bold(),
        dataset.len(),
        skipped.len()
    );

    let dims = ModelDims::for_config(&config);
    let mut model = Cvae::random_init(dims, &mut create_component_rng(seed, "init"));
    println!(
        "{} {} parameters",
        "Model:".cyan().bold(),
        model.parameter_count()
    );

    let total_epochs = train_config.epochs;
    let train_result = train(
        &mut model,
        &dataset,
        &train_config,
        &mut create_component_rng(seed, "train"),
        |stats| {
            println!(
                "  epoch {:>3}/{}: mean loss {:.4}",
                stats.epoch, total_epochs, stats.mean_loss
            );
        },
    );
    if let Err(e) = train_result {
        println!("\n{} {}", "FAILED".red().bold(), e);
        return Ok(ExitCode::from(2));
    }

    let snapshot_path = models_dir.join(SNAPSHOT_FILE_NAME);
    if let Err(e) = save_snapshot(&model, &snapshot_path) {
        println!("\n{} {}", "FAILED".red().bold(), e);
        return Ok(ExitCode::from(2));
    }

    println!(
        "\n{} Trained {} epoch(s) in {}ms",
        "SUCCESS".green().bold(),
        total_epochs,
        start.elapsed().as_millis()
    );
    println!("{} {}", "Snapshot:".dimmed(), snapshot_path.display());
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosampler::wav::{samples_to_pcm16, write_wav_to_vec, WavFormat};

    fn write_burst(path: &Path, freq: f64) {
        let samples: Vec<f32> = (0..2400)
            .map(|i| {
                let t = i as f64 / 8000.0;
                ((2.0 * std::f64::consts::PI * freq * t).sin() * (-t * 9.0).exp() * 0.8) as f32
            })
            .collect();
        let wav = write_wav_to_vec(&WavFormat::mono(8000), &samples_to_pcm16(&samples));
        std::fs::write(path, wav).unwrap();
    }

    #[test]
    fn train_writes_snapshot_for_small_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let corpus = tmp.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        write_burst(&corpus.join("kick.wav"), 90.0);
        write_burst(&corpus.join("snare.wav"), 180.0);
        let models = tmp.path().join("models");

        let code = run(&corpus, &models, Some(1), Some(42)).unwrap();
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(models.join(SNAPSHOT_FILE_NAME).exists());
    }

    #[test]
    fn train_fails_on_empty_corpus() {
        let tmp = tempfile::tempdir().unwrap();
        let corpus = tmp.path().join("corpus");
        std::fs::create_dir_all(&corpus).unwrap();
        std::fs::write(corpus.join("broken.wav"), b"not audio").unwrap();

        let code = run(&corpus, &tmp.path().join("models"), Some(1), Some(42)).unwrap();
        assert_eq!(code, ExitCode::from(1));
    }

    #[test]
    fn train_rejects_zero_epochs() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(run(tmp.path(), tmp.path(), Some(0), Some(42)).is_err());
    }
}
