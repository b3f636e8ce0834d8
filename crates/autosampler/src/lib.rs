//! Autosampler
//!
//! This crate learns a generative model of short percussive sounds and
//! resynthesizes new variations from it:
//!
//! - **Feature extraction** - Log-mel spectrograms plus a `[pitch, variation]`
//!   condition vector per clip
//! - **Conditional VAE** - A small fully-connected encoder/decoder trained
//!   with analytic gradients and Adam, no autograd framework
//! - **Spectral inversion** - Griffin-Lim phase reconstruction turns decoded
//!   spectrograms back into waveforms
//! - **Output** - 16-bit stereo WAV files, four variants per seed sound
//!
//! # Determinism
//!
//! Every run is reproducible. Given the same corpus, base seed, and platform,
//! training produces bit-identical weights and generation produces
//! byte-identical WAV files. All randomness flows through PCG32 streams whose
//! seeds are derived from the base seed via BLAKE3 hashing, one stream per
//! pipeline stage.
//!
//! # Example
//!
//! ```ignore
//! use autosampler::{
//!     build_dataset, scan_corpus, AudioConfig, Cvae, ModelDims, Synthesizer,
//!     TrainConfig, WavResult,
//! };
//! use autosampler::rng::create_component_rng;
//!
//! let config = AudioConfig::default();
//! let extractor = autosampler::FeatureExtractor::new(config.clone());
//! let paths = scan_corpus("drums/".as_ref())?;
//! let (dataset, _skipped) = build_dataset(&paths, &extractor);
//!
//! let mut model = Cvae::random_init(
//!     ModelDims::for_config(&config),
//!     &mut create_component_rng(42, "init"),
//! );
//! autosampler::train(
//!     &mut model,
//!     &dataset,
//!     &TrainConfig::default(),
//!     &mut create_component_rng(42, "train"),
//!     |stats| println!("epoch {}: {:.4}", stats.epoch, stats.mean_loss),
//! )?;
//!
//! let synth = Synthesizer::new(model, config)?;
//! let variants = synth.generate(
//!     "drums/kick_01.wav".as_ref(),
//!     0.0,
//!     0.0,
//!     &mut create_component_rng(42, "synth"),
//! )?;
//! for (i, clip) in variants.iter().enumerate() {
//!     let wav = WavResult::from_stereo_sample(clip, 44_100);
//!     std::fs::write(format!("variant_{i}.wav"), &wav.wav_data)?;
//! }
//! ```
//!
//! # Crate Structure
//!
//! - [`audio`] - Decoding, resampling, and length normalization
//! - [`config`] - Pipeline and model hyperparameters
//! - [`dataset`] - Corpus scanning and feature assembly
//! - [`features`] - Mel spectrograms and pitch estimation
//! - [`invert`] - Griffin-Lim spectrogram inversion
//! - [`model`] - CVAE parameters, forward passes, and snapshots
//! - [`rng`] - Deterministic RNG with seed derivation
//! - [`synth`] - Variant generation from seed sounds
//! - [`train`] - Backpropagation and the Adam optimizer
//! - [`wav`] - Deterministic WAV file writer

pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod invert;
pub mod model;
pub mod rng;
pub mod synth;
pub mod train;
pub mod wav;

// Re-export main types at crate root
pub use config::{AudioConfig, ModelDims, TrainConfig};
pub use dataset::{build_dataset, scan_corpus, Dataset};
pub use error::{SamplerError, SamplerResult};
pub use features::FeatureExtractor;
pub use model::snapshot::{load_snapshot, save_snapshot, SNAPSHOT_FILE_NAME};
pub use model::Cvae;
pub use synth::{StereoSample, Synthesizer, NUM_VARIANTS};
pub use train::{train, EpochStats};
pub use wav::WavResult;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use crate::rng::create_component_rng;
    use crate::wav::{samples_to_pcm16, write_wav_to_vec, WavFormat};
    use std::path::{Path, PathBuf};

    fn test_config() -> AudioConfig {
        AudioConfig {
            sample_rate: 8000,
            clip_seconds: 0.5,
            n_mels: 16,
            time_steps: 12,
            mel_fft_size: 1024,
            mel_hop_size: 256,
            invert_fft_size: 256,
            invert_hop_size: 64,
            griffin_lim_iters: 8,
            ..AudioConfig::default()
        }
    }

    fn test_dims(config: &AudioConfig) -> ModelDims {
        ModelDims {
            input: config.feature_len(),
            condition: 2,
            hidden: 24,
            latent: 6,
        }
    }

    fn test_train_config() -> TrainConfig {
        TrainConfig {
            epochs: 2,
            batch_size: 2,
            learning_rate: 1e-3,
        }
    }

    /// Write a decaying sine burst, a stand-in for a drum hit.
    fn write_drum_wav(path: &Path, freq: f64) {
        let sample_rate = 8000u32;
        let samples: Vec<f32> = (0..2400)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                ((2.0 * std::f64::consts::PI * freq * t).sin() * (-t * 9.0).exp() * 0.8) as f32
            })
            .collect();
        let wav = write_wav_to_vec(&WavFormat::mono(sample_rate), &samples_to_pcm16(&samples));
        std::fs::write(path, wav).unwrap();
    }

    fn write_corpus(dir: &Path) -> PathBuf {
        let corpus = dir.join("corpus");
        std::fs::create_dir_all(corpus.join("toms")).unwrap();
        write_drum_wav(&corpus.join("kick.wav"), 90.0);
        write_drum_wav(&corpus.join("snare.wav"), 180.0);
        write_drum_wav(&corpus.join("toms/tom.wav"), 140.0);
        std::fs::write(corpus.join("broken.wav"), b"not audio at all").unwrap();
        std::fs::write(corpus.join("notes.txt"), b"session notes").unwrap();
        corpus
    }

    #[test]
    fn test_corpus_to_model_to_audio() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let config = test_config();
        let extractor = FeatureExtractor::new(config.clone());

        let paths = scan_corpus(&corpus).expect("scan should succeed");
        assert_eq!(paths.len(), 4); // three playable files plus the broken one

        let (dataset, skipped) = build_dataset(&paths, &extractor);
        assert_eq!(dataset.len(), 3);
        assert_eq!(skipped.len(), 1);
        assert!(skipped[0].reason.contains("cannot decode"));
        assert_eq!(dataset.items()[0].feature.len(), config.feature_len());

        let mut model = Cvae::random_init(
            test_dims(&config),
            &mut create_component_rng(42, "init"),
        );
        let mut stats = Vec::new();
        train(
            &mut model,
            &dataset,
            &test_train_config(),
            &mut create_component_rng(42, "train"),
            |s| stats.push(s),
        )
        .expect("training should succeed");
        assert_eq!(stats.len(), 2);
        assert!(stats.iter().all(|s| s.mean_loss.is_finite()));

        // Persist and restore before synthesis, as the CLI does.
        let snapshot_path = dir.path().join("models").join(SNAPSHOT_FILE_NAME);
        save_snapshot(&model, &snapshot_path).expect("save should succeed");
        let restored =
            load_snapshot(&snapshot_path, test_dims(&config)).expect("load should succeed");
        assert_eq!(restored, model);

        let synth = Synthesizer::new(restored, config.clone()).expect("dims match config");
        let variants = synth
            .generate(
                &corpus.join("kick.wav"),
                0.0,
                0.0,
                &mut create_component_rng(42, "synth"),
            )
            .expect("generation should succeed");

        assert_eq!(variants.len(), NUM_VARIANTS);
        for clip in &variants {
            assert_eq!(clip.len(), config.expected_samples());
            assert_eq!(clip.left, clip.right);
            assert!(clip.left.iter().all(|s| s.is_finite() && s.abs() <= 1.0));
        }

        let wav = WavResult::from_stereo_sample(&variants[0], config.sample_rate);
        assert_eq!(&wav.wav_data[0..4], b"RIFF");
        assert_eq!(&wav.wav_data[8..12], b"WAVE");
        assert!(wav.is_stereo);
        assert_eq!(wav.pcm_hash.len(), 64);
    }

    #[test]
    fn test_pipeline_determinism_per_seed() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = write_corpus(dir.path());
        let config = test_config();
        let extractor = FeatureExtractor::new(config.clone());
        let paths = scan_corpus(&corpus).unwrap();
        let (dataset, _) = build_dataset(&paths, &extractor);

        let run = |seed: u64| {
            let mut model =
                Cvae::random_init(test_dims(&config), &mut create_component_rng(seed, "init"));
            let mut losses = Vec::new();
            train(
                &mut model,
                &dataset,
                &test_train_config(),
                &mut create_component_rng(seed, "train"),
                |s| losses.push(s.mean_loss),
            )
            .unwrap();
            let synth = Synthesizer::new(model, config.clone()).unwrap();
            let variants = synth
                .generate(
                    &corpus.join("snare.wav"),
                    0.0,
                    0.0,
                    &mut create_component_rng(seed, "synth"),
                )
                .unwrap();
            let hashes: Vec<String> = variants
                .iter()
                .map(|v| WavResult::from_stereo_sample(v, config.sample_rate).pcm_hash)
                .collect();
            (losses, hashes)
        };

        let (losses_a, hashes_a) = run(7);
        let (losses_b, hashes_b) = run(7);
        assert_eq!(losses_a, losses_b);
        assert_eq!(hashes_a, hashes_b);

        let (_, hashes_c) = run(8);
        assert_ne!(hashes_a, hashes_c);
    }
}
