//! Variant synthesis
//!
//! Encodes a seed sound once into its latent posterior, shifts the
//! condition vector, then decodes four independent latent draws and
//! inverts each into a fixed-length stereo clip.

use std::path::Path;

use rand_pcg::Pcg32;

use crate::audio;
use crate::config::AudioConfig;
use crate::error::{SamplerError, SamplerResult};
use crate::features::{flatten_grid, FeatureExtractor};
use crate::invert::SpectrogramInverter;
use crate::model::{self, Cvae};

/// Number of variants produced per generation call
pub const NUM_VARIANTS: usize = 4;

/// A two-channel clip
#[derive(Debug, Clone, PartialEq)]
pub struct StereoSample {
    /// Left channel samples
    pub left: Vec<f32>,
    /// Right channel samples
    pub right: Vec<f32>,
}

impl StereoSample {
    /// Duplicate a mono waveform onto both channels
    pub fn from_mono(samples: Vec<f32>) -> Self {
        Self {
            right: samples.clone(),
            left: samples,
        }
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Whether the clip holds no samples
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// Apply relative shifts to a condition vector
///
/// Each shift scales its component by `1 + shift`, so a zero shift is the
/// identity and a zero component stays zero regardless of the shift.
pub fn shift_condition(condition: [f32; 2], pitch_shift: f32, variation_shift: f32) -> [f32; 2] {
    [
        condition[0] * (1.0 + pitch_shift),
        condition[1] * (1.0 + variation_shift),
    ]
}

/// Generates conditioned variants of seed sounds with a trained model
pub struct Synthesizer {
    model: Cvae,
    extractor: FeatureExtractor,
    inverter: SpectrogramInverter,
}

impl std::fmt::Debug for Synthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synthesizer").finish_non_exhaustive()
    }
}

impl Synthesizer {
    /// Assemble a synthesizer from a trained model and its configuration
    ///
    /// Fails when the model's input width does not match the configured
    /// grid size.
    pub fn new(model: Cvae, config: AudioConfig) -> SamplerResult<Self> {
        if model.dims.input != config.feature_len() {
            return Err(SamplerError::shape_mismatch(
                "model.input",
                config.feature_len().to_string(),
                model.dims.input.to_string(),
            ));
        }
        let extractor = FeatureExtractor::new(config.clone());
        let inverter = SpectrogramInverter::new(config);
        Ok(Self {
            model,
            extractor,
            inverter,
        })
    }

    /// The model backing this synthesizer
    pub fn model(&self) -> &Cvae {
        &self.model
    }

    /// Generate four stereo variants of a seed sound
    ///
    /// The seed is featurized and encoded once; every variant draws its
    /// own latent sample and decodes under the shifted condition. Each
    /// clip comes back exactly `expected_samples` long with identical
    /// channels.
    pub fn generate(
        &self,
        seed_path: &Path,
        pitch_shift: f32,
        variation_shift: f32,
        rng: &mut Pcg32,
    ) -> SamplerResult<Vec<StereoSample>> {
        let config = self.extractor.config();
        let waveform = audio::load_waveform(seed_path, config)?;
        let grid = self.extractor.spectrogram(&waveform);
        let feature = flatten_grid(&grid);
        let condition = self.extractor.condition(&waveform);
        let (mean, log_var) = model::encode(&self.model.encoder, feature.view(), condition);
        let shifted = shift_condition(condition, pitch_shift, variation_shift);

        let expected = config.expected_samples();
        let shape = (config.n_mels, config.time_steps);
        let mut variants = Vec::with_capacity(NUM_VARIANTS);
        for _ in 0..NUM_VARIANTS {
            let latent = model::sample_latent(&mean, &log_var, rng);
            let decoded = model::decode(&self.model.decoder, latent.view(), shifted);
            let generated = decoded
                .into_shape(shape)
                .expect("decoder output width is validated at construction");
            let mono = self.inverter.invert(&generated, rng);
            variants.push(StereoSample::from_mono(audio::pad_or_truncate(mono, expected)));
        }
        Ok(variants)
    }
}
