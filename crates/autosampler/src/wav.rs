//! WAV file writing
//!
//! Minimal RIFF/WAVE writer for 16-bit PCM output, plus a result type
//! carrying the encoded bytes and a BLAKE3 digest of the PCM payload so
//! callers can verify deterministic generation.

use std::io::Write;

use crate::synth::StereoSample;

/// PCM format descriptor for an output file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    /// Number of interleaved channels
    pub channels: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample
    pub bits_per_sample: u16,
}

impl WavFormat {
    /// 16-bit mono format
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    /// 16-bit stereo format
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
        }
    }

    /// Bytes per single-channel sample
    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample / 8
    }

    /// Bytes per frame across all channels
    pub fn block_align(&self) -> u16 {
        self.channels * self.bytes_per_sample()
    }

    /// Bytes per second of audio
    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Convert samples to little-endian 16-bit PCM, clamping to full scale
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        pcm.extend_from_slice(&encode_sample(sample).to_le_bytes());
    }
    pcm
}

/// Interleave two channels into little-endian 16-bit PCM
///
/// Trailing samples of the longer channel are dropped.
pub fn stereo_to_pcm16(left: &[f32], right: &[f32]) -> Vec<u8> {
    let frames = left.len().min(right.len());
    let mut pcm = Vec::with_capacity(frames * 4);
    for i in 0..frames {
        pcm.extend_from_slice(&encode_sample(left[i]).to_le_bytes());
        pcm.extend_from_slice(&encode_sample(right[i]).to_le_bytes());
    }
    pcm
}

#[inline]
fn encode_sample(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16
}

/// Write a RIFF/WAVE container around raw PCM data
pub fn write_wav<W: Write>(
    writer: &mut W,
    format: &WavFormat,
    pcm_data: &[u8],
) -> std::io::Result<()> {
    let data_len = pcm_data.len() as u32;

    writer.write_all(b"RIFF")?;
    writer.write_all(&(36 + data_len).to_le_bytes())?;
    writer.write_all(b"WAVE")?;

    // fmt chunk, 16 bytes of PCM description
    writer.write_all(b"fmt ")?;
    writer.write_all(&16u32.to_le_bytes())?;
    writer.write_all(&1u16.to_le_bytes())?;
    writer.write_all(&format.channels.to_le_bytes())?;
    writer.write_all(&format.sample_rate.to_le_bytes())?;
    writer.write_all(&format.byte_rate().to_le_bytes())?;
    writer.write_all(&format.block_align().to_le_bytes())?;
    writer.write_all(&format.bits_per_sample.to_le_bytes())?;

    writer.write_all(b"data")?;
    writer.write_all(&data_len.to_le_bytes())?;
    writer.write_all(pcm_data)?;
    Ok(())
}

/// Encode a complete WAV file into a byte vector
pub fn write_wav_to_vec(format: &WavFormat, pcm_data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(44 + pcm_data.len());
    write_wav(&mut out, format, pcm_data).expect("writing to a Vec cannot fail");
    out
}

/// An encoded WAV file plus integrity metadata
#[derive(Debug, Clone)]
pub struct WavResult {
    /// Complete WAV file bytes, ready to write to disk
    pub wav_data: Vec<u8>,
    /// BLAKE3 hex digest of the PCM payload
    pub pcm_hash: String,
    /// Whether the file is stereo
    pub is_stereo: bool,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Frames per channel
    pub num_samples: usize,
}

impl WavResult {
    /// Encode a mono waveform
    pub fn from_mono(samples: &[f32], sample_rate: u32) -> Self {
        let pcm = samples_to_pcm16(samples);
        Self {
            pcm_hash: blake3::hash(&pcm).to_hex().to_string(),
            wav_data: write_wav_to_vec(&WavFormat::mono(sample_rate), &pcm),
            is_stereo: false,
            sample_rate,
            num_samples: samples.len(),
        }
    }

    /// Encode an interleaved stereo clip
    pub fn from_stereo(left: &[f32], right: &[f32], sample_rate: u32) -> Self {
        let pcm = stereo_to_pcm16(left, right);
        Self {
            pcm_hash: blake3::hash(&pcm).to_hex().to_string(),
            wav_data: write_wav_to_vec(&WavFormat::stereo(sample_rate), &pcm),
            is_stereo: true,
            sample_rate,
            num_samples: left.len().min(right.len()),
        }
    }

    /// Encode a generated stereo sample
    pub fn from_stereo_sample(sample: &StereoSample, sample_rate: u32) -> Self {
        Self::from_stereo(&sample.left, &sample.right, sample_rate)
    }

    /// Clip duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.num_samples as f64 / self.sample_rate as f64
    }
}
