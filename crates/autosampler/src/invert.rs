//! Spectrogram inversion
//!
//! Turns a generated grid back into audio: denormalize to dB, dB to
//! power, project mel bands onto linear frequency bins by weighted
//! transpose, then recover phase with a momentum-accelerated Griffin-Lim
//! loop over a COLA-normalized inverse STFT.

use std::sync::Arc;

use ndarray::Array2;
use rand::Rng;
use rand_pcg::Pcg32;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::config::AudioConfig;
use crate::features::{hann_window, mel_filterbank};

/// Inverts normalized log-mel grids into mono waveforms
///
/// Construction precomputes the synthesis window, the inversion-side
/// filterbank and both FFT plans.
pub struct SpectrogramInverter {
    config: AudioConfig,
    window: Vec<f64>,
    /// Filterbank over the inversion FFT grid, `[n_mels][bins]`
    filterbank: Vec<Vec<f64>>,
    /// Per-bin filter weight totals for the transpose projection
    bin_weight: Vec<f64>,
    forward_fft: Arc<dyn Fft<f64>>,
    inverse_fft: Arc<dyn Fft<f64>>,
}

impl SpectrogramInverter {
    /// Build an inverter for the given configuration
    pub fn new(config: AudioConfig) -> Self {
        let mut planner = FftPlanner::new();
        let forward_fft = planner.plan_fft_forward(config.invert_fft_size);
        let inverse_fft = planner.plan_fft_inverse(config.invert_fft_size);
        let window = hann_window(config.invert_fft_size);
        let filterbank = mel_filterbank(
            config.invert_fft_size,
            config.n_mels,
            config.sample_rate,
            0.0,
            config.sample_rate as f64 / 2.0,
        );
        let mut bin_weight = vec![0.0; config.invert_fft_size / 2 + 1];
        for filter in &filterbank {
            for (slot, &w) in bin_weight.iter_mut().zip(filter.iter()) {
                *slot += w;
            }
        }
        Self {
            config,
            window,
            filterbank,
            bin_weight,
            forward_fft,
            inverse_fft,
        }
    }

    /// Invert a normalized grid into a mono waveform
    ///
    /// `rng` seeds the initial phases. The result keeps the natural
    /// overlap-add length `(frames - 1) * hop + fft_size`; a peak beyond
    /// full scale is normalized back to 0.95.
    pub fn invert(&self, grid: &Array2<f32>, rng: &mut Pcg32) -> Vec<f32> {
        let magnitude = self.linear_magnitude(grid);
        let audio = self.griffin_lim(&magnitude, rng);
        peak_guard(audio)
    }

    /// Denormalize to dB, convert to power, project onto FFT bins
    ///
    /// Bins covered by no filter stay at zero magnitude.
    fn linear_magnitude(&self, grid: &Array2<f32>) -> Vec<Vec<f64>> {
        let (n_mels, frames) = grid.dim();
        let n_bins = self.config.invert_fft_size / 2 + 1;
        let db_span = self.config.max_db - self.config.min_db;

        let mut mel_power = vec![vec![0.0f64; frames]; n_mels];
        for (row, power_row) in mel_power.iter_mut().enumerate() {
            for (t, slot) in power_row.iter_mut().enumerate() {
                let db = self.config.min_db + grid[[row, t]] as f64 * db_span;
                *slot = 10f64.powf(db / 10.0);
            }
        }

        let mut magnitude = vec![vec![0.0f64; frames]; n_bins];
        for (bin, row) in magnitude.iter_mut().enumerate() {
            let weight = self.bin_weight[bin];
            if weight <= 1e-12 {
                continue;
            }
            for (t, slot) in row.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (filter, power_row) in self.filterbank.iter().zip(mel_power.iter()) {
                    acc += filter[bin] * power_row[t];
                }
                *slot = (acc / weight).sqrt();
            }
        }
        magnitude
    }

    /// Momentum-accelerated Griffin-Lim phase recovery
    fn griffin_lim(&self, magnitude: &[Vec<f64>], rng: &mut Pcg32) -> Vec<f32> {
        let n_bins = magnitude.len();
        let frames = magnitude.first().map_or(0, |row| row.len());
        if frames == 0 {
            return Vec::new();
        }

        let mut spectrum: Vec<Vec<Complex<f64>>> = magnitude
            .iter()
            .map(|row| {
                row.iter()
                    .map(|&mag| {
                        let phase = rng.gen::<f64>() * 2.0 * std::f64::consts::PI;
                        Complex::from_polar(mag, phase)
                    })
                    .collect()
            })
            .collect();
        let mut previous = vec![vec![Complex::new(0.0, 0.0); frames]; n_bins];
        let momentum = self.config.griffin_lim_momentum;

        for _ in 0..self.config.griffin_lim_iters {
            let audio = self.overlap_add(&spectrum);
            let estimate = self.stft(&audio, frames);
            for bin in 0..n_bins {
                for t in 0..frames {
                    // Keep the target magnitude, adopt the estimated phase,
                    // then extrapolate along the step just taken
                    let proposal = Complex::from_polar(magnitude[bin][t], estimate[bin][t].arg());
                    spectrum[bin][t] = proposal + (proposal - previous[bin][t]) * momentum;
                    previous[bin][t] = proposal;
                }
            }
        }
        let audio = self.overlap_add(&spectrum);
        audio.into_iter().map(|v| v as f32).collect()
    }

    /// Forward STFT producing exactly `frames` columns, `[bins][frames]`
    fn stft(&self, audio: &[f64], frames: usize) -> Vec<Vec<Complex<f64>>> {
        let fft_size = self.config.invert_fft_size;
        let hop = self.config.invert_hop_size;
        let n_bins = fft_size / 2 + 1;
        let mut out = vec![vec![Complex::new(0.0, 0.0); frames]; n_bins];
        let mut buffer = vec![Complex::new(0.0, 0.0); fft_size];
        for t in 0..frames {
            let start = t * hop;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = audio.get(start + i).copied().unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }
            self.forward_fft.process(&mut buffer);
            for (bin, row) in out.iter_mut().enumerate() {
                row[t] = buffer[bin];
            }
        }
        out
    }

    /// COLA-normalized inverse STFT with conjugate-symmetric reconstruction
    fn overlap_add(&self, spectrum: &[Vec<Complex<f64>>]) -> Vec<f64> {
        let fft_size = self.config.invert_fft_size;
        let hop = self.config.invert_hop_size;
        let n_bins = fft_size / 2 + 1;
        let frames = spectrum[0].len();
        let out_len = (frames - 1) * hop + fft_size;

        let mut audio = vec![0.0f64; out_len];
        let mut window_sum = vec![0.0f64; out_len];
        let mut buffer = vec![Complex::new(0.0, 0.0); fft_size];

        for t in 0..frames {
            buffer[0] = spectrum[0][t];
            buffer[fft_size / 2] = spectrum[n_bins - 1][t];
            for bin in 1..fft_size / 2 {
                let value = spectrum[bin][t];
                buffer[bin] = value;
                buffer[fft_size - bin] = value.conj();
            }
            self.inverse_fft.process(&mut buffer);
            let start = t * hop;
            for (i, value) in buffer.iter().enumerate() {
                let sample = value.re / fft_size as f64;
                audio[start + i] += sample * self.window[i];
                window_sum[start + i] += self.window[i] * self.window[i];
            }
        }
        for (sample, &w) in audio.iter_mut().zip(window_sum.iter()) {
            if w > 1e-10 {
                *sample /= w;
            }
        }
        audio
    }
}

/// Scale a waveform down to 0.95 full scale when it clips
fn peak_guard(audio: Vec<f32>) -> Vec<f32> {
    let peak = audio.iter().fold(0.0f32, |a, &b| a.max(b.abs()));
    if peak > 1.0 {
        let scale = 0.95 / peak;
        audio.into_iter().map(|v| v * scale).collect()
    } else {
        audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

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

    #[test]
    fn test_invert_output_length_and_finiteness() {
        let config = test_config();
        let inverter = SpectrogramInverter::new(config.clone());
        let grid = Array2::from_elem((16, 12), 0.5f32);
        let mut rng = create_rng(4);
        let audio = inverter.invert(&grid, &mut rng);
        assert_eq!(audio.len(), 11 * 64 + 256);
        assert!(audio.iter().all(|v| v.is_finite()));
        assert!(audio.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_invert_deterministic_per_stream() {
        let inverter = SpectrogramInverter::new(test_config());
        let grid = Array2::from_elem((16, 12), 0.4f32);
        let mut a = create_rng(9);
        let mut b = create_rng(9);
        assert_eq!(inverter.invert(&grid, &mut a), inverter.invert(&grid, &mut b));
    }

    #[test]
    fn test_zero_grid_maps_to_floor_magnitudes() {
        let config = test_config();
        let inverter = SpectrogramInverter::new(config);
        let grid = Array2::zeros((16, 12));
        let magnitude = inverter.linear_magnitude(&grid);
        assert_eq!(magnitude.len(), 129);
        // Bin 0 sits below every filter's left edge
        assert_eq!(magnitude[0][0], 0.0);
        // Covered bins land on the -40 dB floor, i.e. 0.01 magnitude
        assert!((magnitude[64][0] - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_hot_band_dominates_output_spectrum() {
        let config = test_config();
        let hot = 8usize;
        let inverter = SpectrogramInverter::new(config.clone());
        let mut grid = Array2::zeros((16, 12));
        for t in 0..12 {
            grid[[hot, t]] = 1.0;
        }
        let mut rng = create_rng(2);
        let audio = inverter.invert(&grid, &mut rng);

        // Locate the dominant frequency of the result
        let signal: Vec<f64> = audio.iter().map(|&v| v as f64).collect();
        let window = crate::features::hann_window(256);
        let fft = FftPlanner::new().plan_fft_forward(256);
        let frames = crate::features::power_frames(&signal, &window, &fft, 64);
        let mut totals = vec![0.0f64; 129];
        for frame in &frames {
            for (bin, &p) in frame.iter().enumerate() {
                totals[bin] += p;
            }
        }
        let peak_bin = totals
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        let peak_hz = peak_bin as f64 * 8000.0 / 256.0;

        // The hot filter's support in Hz
        let mel_max = crate::features::hz_to_mel(4000.0);
        let left = crate::features::mel_to_hz(mel_max * hot as f64 / 17.0);
        let right = crate::features::mel_to_hz(mel_max * (hot + 2) as f64 / 17.0);
        assert!(
            peak_hz >= left && peak_hz <= right,
            "peak {peak_hz} Hz outside [{left}, {right}]"
        );
    }

    #[test]
    fn test_peak_guard_rescales_clipping_audio() {
        let audio = vec![0.5f32, -2.0, 1.0];
        let out = peak_guard(audio);
        assert!((out[1] + 0.95).abs() < 1e-6);
        assert!((out[0] - 0.2375).abs() < 1e-6);
    }

    #[test]
    fn test_peak_guard_leaves_quiet_audio_alone() {
        let audio = vec![0.5f32, -0.25];
        assert_eq!(peak_guard(audio.clone()), audio);
    }
}
