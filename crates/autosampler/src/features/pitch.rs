//! Fundamental frequency estimation
//!
//! YIN with cumulative mean normalization, an absolute voicing threshold
//! and parabolic lag refinement. A clip's pitch is the median f0 over its
//! voiced frames.

/// Analysis frame length in samples
pub(crate) const FRAME_SIZE: usize = 2048;

/// Hop between analysis frames in samples
pub(crate) const HOP_SIZE: usize = 512;

/// Frames whose normalized difference never dips below this are unvoiced
const VOICING_THRESHOLD: f64 = 0.15;

/// Median f0 in Hz over all voiced frames, or 0.0 when none are voiced
pub(crate) fn median_f0(samples: &[f32], sample_rate: u32, fmin: f64, fmax: f64) -> f64 {
    let window = FRAME_SIZE / 2;
    let tau_min = ((sample_rate as f64 / fmax).floor() as usize).max(2);
    let tau_max = ((sample_rate as f64 / fmin).ceil() as usize).min(window);
    if tau_min >= tau_max {
        return 0.0;
    }

    let mut voiced = Vec::new();
    let mut start = 0;
    while start + FRAME_SIZE <= samples.len() {
        if let Some(f0) = frame_f0(&samples[start..start + FRAME_SIZE], sample_rate, tau_min, tau_max)
        {
            voiced.push(f0);
        }
        start += HOP_SIZE;
    }
    median(&mut voiced)
}

/// f0 of a single frame, or None when the frame is unvoiced
fn frame_f0(frame: &[f32], sample_rate: u32, tau_min: usize, tau_max: usize) -> Option<f64> {
    let window = FRAME_SIZE / 2;

    let mut diff = vec![0.0f64; tau_max + 1];
    for (tau, slot) in diff.iter_mut().enumerate().skip(1) {
        let mut acc = 0.0f64;
        for j in 0..window {
            let d = frame[j] as f64 - frame[j + tau] as f64;
            acc += d * d;
        }
        *slot = acc;
    }

    // Cumulative mean normalized difference; d'(0) is defined as 1
    let mut cmndf = vec![1.0f64; tau_max + 1];
    let mut running_sum = 0.0f64;
    for tau in 1..=tau_max {
        running_sum += diff[tau];
        cmndf[tau] = if running_sum > 0.0 {
            diff[tau] * tau as f64 / running_sum
        } else {
            1.0
        };
    }

    for tau in tau_min..=tau_max {
        if cmndf[tau] < VOICING_THRESHOLD {
            // Walk forward to the bottom of the dip before refining
            let mut best = tau;
            while best + 1 <= tau_max && cmndf[best + 1] < cmndf[best] {
                best += 1;
            }
            return Some(sample_rate as f64 / refine_lag(&cmndf, best));
        }
    }
    None
}

/// Parabolic interpolation around the selected lag
fn refine_lag(cmndf: &[f64], tau: usize) -> f64 {
    if tau == 0 || tau + 1 >= cmndf.len() {
        return tau as f64;
    }
    let left = cmndf[tau - 1];
    let center = cmndf[tau];
    let right = cmndf[tau + 1];
    let denom = left - 2.0 * center + right;
    if denom.abs() < 1e-12 {
        return tau as f64;
    }
    let shift = 0.5 * (left - right) / denom;
    tau as f64 + shift.clamp(-1.0, 1.0)
}

/// Interpolating median; empty input yields 0.0
fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        values[mid]
    } else {
        0.5 * (values[mid - 1] + values[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;
    use rand::Rng;

    fn sine(freq: f64, rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / rate as f64).sin() as f32)
            .collect()
    }

    #[test]
    fn test_sine_pitch_recovered() {
        let samples = sine(440.0, 8000, 8000);
        let f0 = median_f0(&samples, 8000, 65.41, 2093.0);
        assert!((f0 - 440.0).abs() / 440.0 < 0.03, "got {f0}");
    }

    #[test]
    fn test_low_sine_pitch_recovered() {
        let samples = sine(110.0, 8000, 8000);
        let f0 = median_f0(&samples, 8000, 65.41, 2093.0);
        assert!((f0 - 110.0).abs() / 110.0 < 0.03, "got {f0}");
    }

    #[test]
    fn test_noise_is_unvoiced() {
        let mut rng = create_rng(7);
        let samples: Vec<f32> = (0..8000).map(|_| rng.gen_range(-1.0..1.0)).collect();
        assert_eq!(median_f0(&samples, 8000, 65.41, 2093.0), 0.0);
    }

    #[test]
    fn test_silence_is_unvoiced() {
        let samples = vec![0.0f32; 8000];
        assert_eq!(median_f0(&samples, 8000, 65.41, 2093.0), 0.0);
    }

    #[test]
    fn test_too_short_input_is_unvoiced() {
        let samples = sine(440.0, 8000, FRAME_SIZE - 1);
        assert_eq!(median_f0(&samples, 8000, 65.41, 2093.0), 0.0);
    }

    #[test]
    fn test_degenerate_band_is_unvoiced() {
        // fmin so high that the lag range collapses
        let samples = sine(440.0, 8000, 8000);
        assert_eq!(median_f0(&samples, 8000, 7000.0, 8000.0), 0.0);
    }

    #[test]
    fn test_median_interpolates_even_counts() {
        let mut values = vec![100.0, 200.0, 300.0, 400.0];
        assert_eq!(median(&mut values), 250.0);
    }
}
