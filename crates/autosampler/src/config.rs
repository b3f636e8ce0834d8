//! Pipeline configuration
//!
//! All analysis and synthesis parameters live in [`AudioConfig`]. The
//! defaults describe the production pipeline: 1 second clips at 44.1 kHz,
//! a 64x44 log-mel grid, and a 512-iteration Griffin-Lim inversion.
//! Model and optimizer shapes are derived from it via [`ModelDims`] and
//! [`TrainConfig`].

use crate::error::{SamplerError, SamplerResult};

/// Analysis and synthesis parameters shared across the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Target sample rate in Hz
    pub sample_rate: u32,
    /// Fixed clip length in seconds
    pub clip_seconds: f64,
    /// Number of mel bands in the analysis grid
    pub n_mels: usize,
    /// Number of spectrogram frames kept per clip
    pub time_steps: usize,
    /// FFT size of the analysis STFT
    pub mel_fft_size: usize,
    /// Hop size of the analysis STFT
    pub mel_hop_size: usize,
    /// Dynamic range kept below the spectrogram peak, in dB
    pub top_db: f64,
    /// Lower dB bound assumed when denormalizing a generated grid
    pub min_db: f64,
    /// Upper dB bound assumed when denormalizing a generated grid
    pub max_db: f64,
    /// Lowest fundamental considered by the pitch tracker, in Hz
    pub pitch_fmin: f64,
    /// Highest fundamental considered by the pitch tracker, in Hz
    pub pitch_fmax: f64,
    /// Divisor mapping a median f0 into condition space
    pub pitch_norm_hz: f64,
    /// Divisor mapping sample standard deviation into condition space
    pub variation_norm: f64,
    /// FFT size of the inversion STFT
    pub invert_fft_size: usize,
    /// Hop size of the inversion STFT
    pub invert_hop_size: usize,
    /// Number of Griffin-Lim phase recovery iterations
    pub griffin_lim_iters: usize,
    /// Momentum factor of the accelerated Griffin-Lim update
    pub griffin_lim_momentum: f64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            clip_seconds: 1.0,
            n_mels: 64,
            time_steps: 44,
            mel_fft_size: 2048,
            mel_hop_size: 512,
            top_db: 80.0,
            min_db: -40.0,
            max_db: 0.0,
            pitch_fmin: 65.41,
            pitch_fmax: 2093.0,
            pitch_norm_hz: 500.0,
            variation_norm: 0.1,
            invert_fft_size: 1024,
            invert_hop_size: 256,
            griffin_lim_iters: 512,
            griffin_lim_momentum: 0.99,
        }
    }
}

impl AudioConfig {
    /// Number of samples every loaded clip is padded or truncated to
    pub fn expected_samples(&self) -> usize {
        (self.sample_rate as f64 * self.clip_seconds).round() as usize
    }

    /// Length of the flattened feature vector fed to the model
    pub fn feature_len(&self) -> usize {
        self.n_mels * self.time_steps
    }

    /// Validate the configuration
    pub fn validate(&self) -> SamplerResult<()> {
        if self.sample_rate == 0 {
            return Err(SamplerError::invalid_config(
                "sample_rate",
                "must be greater than 0",
            ));
        }
        if !(self.clip_seconds.is_finite() && self.clip_seconds > 0.0) {
            return Err(SamplerError::invalid_config(
                "clip_seconds",
                "must be positive and finite",
            ));
        }
        if self.n_mels == 0 {
            return Err(SamplerError::invalid_config("n_mels", "must be at least 1"));
        }
        if self.time_steps == 0 {
            return Err(SamplerError::invalid_config(
                "time_steps",
                "must be at least 1",
            ));
        }
        for (name, fft, hop) in [
            ("mel_fft_size", self.mel_fft_size, self.mel_hop_size),
            ("invert_fft_size", self.invert_fft_size, self.invert_hop_size),
        ] {
            if !fft.is_power_of_two() {
                return Err(SamplerError::invalid_config(name, "must be a power of two"));
            }
            if hop == 0 || hop > fft {
                return Err(SamplerError::invalid_config(
                    name,
                    "hop size must be in 1..=fft size",
                ));
            }
        }
        let nyquist = self.sample_rate as f64 / 2.0;
        if !(self.pitch_fmin > 0.0 && self.pitch_fmin < self.pitch_fmax) {
            return Err(SamplerError::invalid_config(
                "pitch_fmin",
                "must satisfy 0 < fmin < fmax",
            ));
        }
        if self.pitch_fmax > nyquist {
            return Err(SamplerError::invalid_config(
                "pitch_fmax",
                "must not exceed the Nyquist frequency",
            ));
        }
        if self.pitch_norm_hz <= 0.0 {
            return Err(SamplerError::invalid_config(
                "pitch_norm_hz",
                "must be greater than 0",
            ));
        }
        if self.variation_norm <= 0.0 {
            return Err(SamplerError::invalid_config(
                "variation_norm",
                "must be greater than 0",
            ));
        }
        if self.max_db <= self.min_db {
            return Err(SamplerError::invalid_config(
                "max_db",
                "must be greater than min_db",
            ));
        }
        if self.top_db <= 0.0 {
            return Err(SamplerError::invalid_config(
                "top_db",
                "must be greater than 0",
            ));
        }
        if self.griffin_lim_iters == 0 {
            return Err(SamplerError::invalid_config(
                "griffin_lim_iters",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.griffin_lim_momentum) {
            return Err(SamplerError::invalid_config(
                "griffin_lim_momentum",
                "must be in [0, 1)",
            ));
        }
        Ok(())
    }
}

/// Layer dimensions of the conditional VAE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelDims {
    /// Flattened spectrogram length
    pub input: usize,
    /// Condition vector length
    pub condition: usize,
    /// Hidden layer width
    pub hidden: usize,
    /// Latent space width
    pub latent: usize,
}

impl ModelDims {
    /// Production dimensions for a given audio configuration
    pub fn for_config(config: &AudioConfig) -> Self {
        Self {
            input: config.feature_len(),
            condition: 2,
            hidden: 512,
            latent: 64,
        }
    }
}

/// Optimization parameters for a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Number of passes over the dataset
    pub epochs: usize,
    /// Mini-batch size; the final batch of an epoch may be smaller
    pub batch_size: usize,
    /// Adam learning rate
    pub learning_rate: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
            learning_rate: 1e-3,
        }
    }
}

impl TrainConfig {
    /// Validate the configuration
    pub fn validate(&self) -> SamplerResult<()> {
        if self.epochs == 0 {
            return Err(SamplerError::invalid_config("epochs", "must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(SamplerError::invalid_config(
                "batch_size",
                "must be at least 1",
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(SamplerError::invalid_config(
                "learning_rate",
                "must be positive and finite",
            ));
        }
        Ok(())
    }
}
