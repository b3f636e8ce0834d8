//! Inspect command implementation
//!
//! Extracts and prints the features the model conditions on for a single
//! audio file, as colored text or JSON.

use anyhow::{Context, Result};
use autosampler::{audio, AudioConfig, FeatureExtractor};
use colored::Colorize;
use std::path::Path;
use std::process::ExitCode;

/// Run the inspect command
pub fn run(input: &Path, json: bool) -> Result<ExitCode> {
    let config = AudioConfig::default();
    let extractor = FeatureExtractor::new(config.clone());
    let samples = audio::load_waveform(input, &config)
        .with_context(|| format!("cannot load '{}'", input.display()))?;

    let pitch_hz = extractor.pitch_hz(&samples);
    let condition = extractor.condition(&samples);
    let grid = extractor.spectrogram(&samples);

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    let mut sum = 0.0f64;
    for &v in grid.iter() {
        min = min.min(v);
        max = max.max(v);
        sum += v as f64;
    }
    let mean = sum / grid.len() as f64;

    if json {
        let out = serde_json::json!({
            "file": input.display().to_string(),
            "pitch_hz": pitch_hz,
            "condition": {
                "pitch": condition[0],
                "variation": condition[1],
            },
            "spectrogram": {
                "n_mels": config.n_mels,
                "time_steps": config.time_steps,
                "min": min,
                "max": max,
                "mean": mean,
            },
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{} {}", "File:".cyan().bold(), input.display());
        println!(
            "{} {:.2} Hz (normalized {:.4})",
            "Pitch:".cyan().bold(),
            pitch_hz,
            condition[0]
        );
        println!("{} {:.4}", "Variation:".cyan().bold(), condition[1]);
        println!(
            "{} {}x{}, min {:.3}, max {:.3}, mean {:.3}",
            "Mel grid:".cyan().bold(),
            config.n_mels,
            config.time_steps,
            min,
            max,
            mean
        );
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosampler::wav::{samples_to_pcm16, write_wav_to_vec, WavFormat};

    fn write_tone(path: &Path) {
        let samples: Vec<f32> = (0..4000)
            .map(|i| {
                let t = i as f64 / 8000.0;
                ((2.0 * std::f64::consts::PI * 220.0 * t).sin() * 0.5) as f32
            })
            .collect();
        let wav = write_wav_to_vec(&WavFormat::mono(8000), &samples_to_pcm16(&samples));
        std::fs::write(path, wav).unwrap();
    }

    #[test]
    fn inspect_prints_feature_summary() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("tone.wav");
        write_tone(&path);

        assert_eq!(run(&path, false).unwrap(), ExitCode::SUCCESS);
        assert_eq!(run(&path, true).unwrap(), ExitCode::SUCCESS);
    }

    #[test]
    fn inspect_errors_on_unreadable_input() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.wav");
        std::fs::write(&path, b"not audio").unwrap();

        assert!(run(&path, false).is_err());
    }
}
