//! Waveform loading
//!
//! Decodes compressed or PCM audio into a mono f32 waveform at the
//! configured sample rate. Multi-channel sources are averaged down to
//! mono, foreign sample rates are linearly resampled, and every clip is
//! padded or truncated to the fixed analysis length.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::config::AudioConfig;
use crate::error::{SamplerError, SamplerResult};

/// Load one clip: decode, downmix, resample, then fix the length
///
/// Always returns exactly `config.expected_samples()` samples.
pub fn load_waveform(path: &Path, config: &AudioConfig) -> SamplerResult<Vec<f32>> {
    let (samples, source_rate) = decode_mono(path, None)?;
    let samples = resample_linear(&samples, source_rate, config.sample_rate);
    Ok(pad_or_truncate(samples, config.expected_samples()))
}

/// Check that a file decodes, without keeping its contents
///
/// Decodes at most the first second so that scanning a large corpus
/// stays cheap.
pub fn probe(path: &Path) -> SamplerResult<()> {
    decode_mono(path, Some(1.0)).map(|_| ())
}

/// Decode a file into mono f32 samples at its source rate
fn decode_mono(path: &Path, limit_seconds: Option<f64>) -> SamplerResult<(Vec<f32>, u32)> {
    let file = File::open(path).map_err(|e| SamplerError::decode(path, e.to_string()))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| SamplerError::decode(path, e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| SamplerError::decode(path, "no default audio track"))?;
    let track_id = track.id;
    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SamplerError::decode(path, "source sample rate unknown"))?;
    let channels = track
        .codec_params
        .channels
        .map(|c| c.count())
        .unwrap_or(1)
        .max(1);
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SamplerError::decode(path, e.to_string()))?;

    let limit = limit_seconds.map(|s| (source_rate as f64 * s).ceil() as usize);
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut samples: Vec<f32> = Vec::new();

    loop {
        if let Some(limit) = limit {
            if samples.len() >= limit {
                break;
            }
        }
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            // End of stream surfaces as an IO error
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(SamplerError::decode(path, e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(SamplerError::decode(path, e.to_string())),
        };
        if sample_buf.is_none() {
            let spec = *decoded.spec();
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buf) = &mut sample_buf {
            buf.copy_interleaved_ref(decoded);
            for frame in buf.samples().chunks(channels) {
                let sum: f32 = frame.iter().sum();
                samples.push(sum / channels as f32);
            }
        }
    }

    if samples.is_empty() {
        return Err(SamplerError::decode(path, "stream contained no audio samples"));
    }
    Ok((samples, source_rate))
}

/// Linear interpolation resampler
///
/// Good enough for corpus normalization; percussive material carries
/// little content near Nyquist where linear interpolation degrades.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = pos - idx as f64;
        let a = samples[idx.min(last)] as f64;
        let b = samples[(idx + 1).min(last)] as f64;
        out.push((a + (b - a) * frac) as f32);
    }
    out
}

/// Fix a waveform to `target_len` samples, zero-padding the tail
pub fn pad_or_truncate(mut samples: Vec<f32>, target_len: usize) -> Vec<f32> {
    samples.resize(target_len, 0.0);
    samples
}
