//! Mel spectrogram primitives
//!
//! Slaney-style mel filterbank, centered STFT power frames, peak-referenced
//! dB conversion and unit normalization. All intermediate math runs in f64.

use rustfft::num_complex::Complex;
use rustfft::Fft;
use std::sync::Arc;

/// Power floor applied before taking logs
pub(crate) const AMIN: f64 = 1e-10;

/// Below this dynamic range a grid is treated as flat and zeroed
pub(crate) const RANGE_EPS: f64 = 1e-8;

/// Periodic Hann window
pub(crate) fn hann_window(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / len as f64;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Hz to mel, Slaney scale: linear below 1 kHz, logarithmic above
pub(crate) fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    if hz >= MIN_LOG_HZ {
        let logstep = 6.4f64.ln() / 27.0;
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

/// Mel to Hz, inverse of [`hz_to_mel`]
pub(crate) fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    if mel >= MIN_LOG_MEL {
        let logstep = 6.4f64.ln() / 27.0;
        MIN_LOG_HZ * ((mel - MIN_LOG_MEL) * logstep).exp()
    } else {
        mel * F_SP
    }
}

/// Triangular mel filterbank, shape `[n_mels][n_fft / 2 + 1]`
///
/// Each filter is area-normalized by `2 / (right - left)` so that bands
/// of different widths contribute comparable energy.
pub(crate) fn mel_filterbank(
    n_fft: usize,
    n_mels: usize,
    sample_rate: u32,
    fmin: f64,
    fmax: f64,
) -> Vec<Vec<f64>> {
    let n_bins = n_fft / 2 + 1;
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    let hz_points: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filters = vec![vec![0.0; n_bins]; n_mels];
    for (m, filter) in filters.iter_mut().enumerate() {
        let left = hz_points[m];
        let center = hz_points[m + 1];
        let right = hz_points[m + 2];
        let norm = 2.0 / (right - left);
        for (bin, weight) in filter.iter_mut().enumerate() {
            let freq = bin as f64 * sample_rate as f64 / n_fft as f64;
            let ramp = if freq <= left || freq >= right {
                0.0
            } else if freq <= center {
                (freq - left) / (center - left)
            } else {
                (right - freq) / (right - center)
            };
            *weight = ramp * norm;
        }
    }
    filters
}

/// Mirror-pad a signal without repeating the edge samples
pub(crate) fn reflect_pad(signal: &[f64], pad: usize) -> Vec<f64> {
    if signal.is_empty() {
        return vec![0.0; 2 * pad];
    }
    let n = signal.len();
    let mut padded = Vec::with_capacity(n + 2 * pad);
    for i in (1..=pad).rev() {
        padded.push(signal[i.min(n - 1)]);
    }
    padded.extend_from_slice(signal);
    for i in 0..pad {
        let idx = n.saturating_sub(2).saturating_sub(i);
        padded.push(signal[idx]);
    }
    padded
}

/// Centered STFT power frames, shape `[frames][n_fft / 2 + 1]`
pub(crate) fn power_frames(
    signal: &[f64],
    window: &[f64],
    fft: &Arc<dyn Fft<f64>>,
    hop: usize,
) -> Vec<Vec<f64>> {
    let fft_size = window.len();
    let n_bins = fft_size / 2 + 1;
    let padded = reflect_pad(signal, fft_size / 2);

    let mut frames = Vec::new();
    let mut start = 0;
    while start + fft_size <= padded.len() {
        let mut buffer: Vec<Complex<f64>> = (0..fft_size)
            .map(|i| Complex::new(padded[start + i] * window[i], 0.0))
            .collect();
        fft.process(&mut buffer);
        frames.push(buffer[..n_bins].iter().map(|c| c.norm_sqr()).collect());
        start += hop;
    }
    frames
}

/// Project power frames through the filterbank, shape `[n_mels][frames]`
pub(crate) fn apply_filterbank(frames: &[Vec<f64>], filterbank: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n_frames = frames.len();
    let mut out = vec![vec![0.0; n_frames]; filterbank.len()];
    for (t, frame) in frames.iter().enumerate() {
        for (filter, row) in filterbank.iter().zip(out.iter_mut()) {
            let mut acc = 0.0;
            for (&w, &p) in filter.iter().zip(frame.iter()) {
                acc += w * p;
            }
            row[t] = acc;
        }
    }
    out
}

/// Convert power to dB relative to the grid peak, clamped to `top_db` below it
pub(crate) fn power_to_db_peak(grid: &mut [Vec<f64>], top_db: f64) {
    let mut reference = AMIN;
    for row in grid.iter() {
        for &v in row {
            if v > reference {
                reference = v;
            }
        }
    }
    let ref_db = 10.0 * reference.log10();

    let mut peak = f64::NEG_INFINITY;
    for row in grid.iter_mut() {
        for v in row.iter_mut() {
            *v = 10.0 * v.max(AMIN).log10() - ref_db;
            if *v > peak {
                peak = *v;
            }
        }
    }
    let floor = peak - top_db;
    for row in grid.iter_mut() {
        for v in row.iter_mut() {
            if *v < floor {
                *v = floor;
            }
        }
    }
}

/// Min-max normalize into [0, 1]; a flat grid collapses to all zeros
pub(crate) fn normalize_unit(grid: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for row in grid {
        for &v in row {
            min = min.min(v);
            max = max.max(v);
        }
    }
    let diff = max - min;
    if !diff.is_finite() || diff < RANGE_EPS {
        return grid.iter().map(|row| vec![0.0; row.len()]).collect();
    }
    grid.iter()
        .map(|row| row.iter().map(|&v| (v - min) / diff).collect())
        .collect()
}
