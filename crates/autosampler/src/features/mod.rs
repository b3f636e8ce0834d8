//! Feature extraction
//!
//! Turns a fixed-length waveform into the two things the model consumes:
//! a normalized log-mel grid and a `[pitch, variation]` condition vector.

mod mel;
mod pitch;

pub(crate) use mel::{hann_window, hz_to_mel, mel_filterbank, mel_to_hz, power_frames};

use std::sync::Arc;

use ndarray::{Array1, Array2};
use rustfft::{Fft, FftPlanner};

use crate::config::AudioConfig;

/// Extracts spectrogram grids and condition vectors from waveforms
///
/// Construction precomputes the analysis window, the mel filterbank and
/// the FFT plan; extraction itself is allocation-light and deterministic.
pub struct FeatureExtractor {
    config: AudioConfig,
    window: Vec<f64>,
    filterbank: Vec<Vec<f64>>,
    fft: Arc<dyn Fft<f64>>,
}

impl FeatureExtractor {
    /// Build an extractor for the given configuration
    pub fn new(config: AudioConfig) -> Self {
        let window = mel::hann_window(config.mel_fft_size);
        let filterbank = mel::mel_filterbank(
            config.mel_fft_size,
            config.n_mels,
            config.sample_rate,
            0.0,
            config.sample_rate as f64 / 2.0,
        );
        let fft = FftPlanner::new().plan_fft_forward(config.mel_fft_size);
        Self {
            config,
            window,
            filterbank,
            fft,
        }
    }

    /// The configuration this extractor was built for
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Normalized log-mel grid, shape `[n_mels, time_steps]`, values in [0, 1]
    ///
    /// Longer signals are truncated to `time_steps` frames, shorter ones
    /// are zero-padded. A flat signal produces an all-zero grid.
    pub fn spectrogram(&self, samples: &[f32]) -> Array2<f32> {
        let shape = (self.config.n_mels, self.config.time_steps);
        if samples.is_empty() {
            return Array2::zeros(shape);
        }
        let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let frames = mel::power_frames(&signal, &self.window, &self.fft, self.config.mel_hop_size);
        let mut grid = mel::apply_filterbank(&frames, &self.filterbank);
        mel::power_to_db_peak(&mut grid, self.config.top_db);
        let grid = mel::normalize_unit(&grid);

        let mut out = Array2::zeros(shape);
        for (m, row) in grid.iter().enumerate() {
            for (t, &v) in row.iter().take(self.config.time_steps).enumerate() {
                out[[m, t]] = v as f32;
            }
        }
        out
    }

    /// Median fundamental in Hz, 0.0 when no frame is voiced
    pub fn pitch_hz(&self, samples: &[f32]) -> f32 {
        pitch::median_f0(
            samples,
            self.config.sample_rate,
            self.config.pitch_fmin,
            self.config.pitch_fmax,
        ) as f32
    }

    /// Pitch component of the condition vector
    pub fn pitch(&self, samples: &[f32]) -> f32 {
        (self.pitch_hz(samples) as f64 / self.config.pitch_norm_hz) as f32
    }

    /// Variation component of the condition vector
    pub fn variation(&self, samples: &[f32]) -> f32 {
        (sample_std(samples) / self.config.variation_norm) as f32
    }

    /// Condition vector `[pitch, variation]`
    pub fn condition(&self, samples: &[f32]) -> [f32; 2] {
        [self.pitch(samples), self.variation(samples)]
    }
}

/// Flatten a grid into the model input layout, row-major
pub fn flatten_grid(grid: &Array2<f32>) -> Array1<f32> {
    Array1::from_iter(grid.iter().copied())
}

/// Population standard deviation of the raw samples
pub fn sample_std(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&s| {
            let d = s as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn test_config() -> AudioConfig {
        AudioConfig {
            sample_rate: 8000,
            clip_seconds: 1.0,
            n_mels: 16,
            time_steps: 12,
            mel_fft_size: 1024,
            mel_hop_size: 256,
            ..AudioConfig::default()
        }
    }

    fn sine(freq: f64, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / rate as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn test_spectrogram_shape() {
        let extractor = FeatureExtractor::new(test_config());
        let grid = extractor.spectrogram(&sine(440.0, 8000, 8000));
        assert_eq!(grid.shape(), &[16, 12]);
    }

    #[test]
    fn test_spectrogram_values_in_unit_range() {
        let extractor = FeatureExtractor::new(test_config());
        let grid = extractor.spectrogram(&sine(440.0, 8000, 8000));
        assert!(grid.iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Min-max normalization pins the extremes
        let max = grid.iter().fold(f32::MIN, |a, &b| a.max(b));
        let min = grid.iter().fold(f32::MAX, |a, &b| a.min(b));
        assert!((max - 1.0).abs() < 1e-6);
        assert!(min.abs() < 1e-6);
    }

    #[test]
    fn test_spectrogram_of_silence_is_zero() {
        let extractor = FeatureExtractor::new(test_config());
        let silence = vec![0.0; 8000];
        let grid = extractor.spectrogram(&silence);
        assert!(grid.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_spectrogram_deterministic() {
        let extractor = FeatureExtractor::new(test_config());
        let samples = sine(330.0, 8000, 8000);
        assert_eq!(extractor.spectrogram(&samples), extractor.spectrogram(&samples));
    }

    #[test]
    fn test_spectrogram_pads_short_signals() {
        let extractor = FeatureExtractor::new(test_config());
        // 512 samples yield 3 centered frames, the rest stays zero
        let grid = extractor.spectrogram(&sine(440.0, 8000, 512));
        assert_eq!(grid.shape(), &[16, 12]);
        for t in 4..12 {
            for m in 0..16 {
                assert_eq!(grid[[m, t]], 0.0);
            }
        }
    }

    #[test]
    fn test_default_grid_shape() {
        let extractor = FeatureExtractor::new(AudioConfig::default());
        let grid = extractor.spectrogram(&sine(200.0, 44_100, 44_100));
        assert_eq!(grid.shape(), &[64, 44]);
    }

    #[test]
    fn test_condition_vector_of_sine() {
        let extractor = FeatureExtractor::new(test_config());
        let samples = sine(440.0, 8000, 8000);
        let [pitch, variation] = extractor.condition(&samples);
        // 440 Hz over the 500 Hz norm
        assert!((pitch - 0.88).abs() < 0.03, "pitch {pitch}");
        // A unit sine has std 1/sqrt(2), over the 0.1 norm
        assert!((variation - 7.07).abs() < 0.1, "variation {variation}");
    }

    #[test]
    fn test_condition_of_silence_is_zero() {
        let extractor = FeatureExtractor::new(test_config());
        let silence = vec![0.0; 8000];
        let [pitch, variation] = extractor.condition(&silence);
        assert_eq!(pitch, 0.0);
        assert_eq!(variation, 0.0);
    }

    #[test]
    fn test_sample_std_of_square_wave() {
        let samples: Vec<f32> = (0..1000).map(|i| if i % 2 == 0 { 0.1 } else { -0.1 }).collect();
        assert!((sample_std(&samples) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_flatten_grid_row_major() {
        let grid = array![[1.0f32, 2.0], [3.0, 4.0]];
        let flat = flatten_grid(&grid);
        assert_eq!(flat.to_vec(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
