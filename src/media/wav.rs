use std::io::Cursor;

use crate::error::{AppError, Result};

const HEADER_LEN: usize = 44;
const CHANNELS: u16 = 1;
const MAX_SAMPLE_RATE: u32 = 384_000;
const SAMPLE_WIDTHS: [u16; 4] = [8, 16, 24, 32];

/// Sample layout of raw PCM audio, as described by a MIME type such as
/// `audio/L16;rate=24000`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub bits_per_sample: u16,
    pub sample_rate: u32,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            bits_per_sample: 16,
            sample_rate: 24_000,
        }
    }
}

impl AudioFormat {
    /// Parse bits and rate from the MIME type. Anything missing or
    /// unparsable keeps the default; numbers no WAV header can describe are
    /// rejected.
    pub fn from_mime(mime_type: &str) -> Result<Self> {
        let mut format = Self::default();

        for param in mime_type.split(';').map(str::trim) {
            let lower = param.to_ascii_lowercase();
            if let Some(rate) = lower.strip_prefix("rate=") {
                if let Ok(rate) = rate.trim().parse::<u64>() {
                    format.sample_rate = u32::try_from(rate)
                        .ok()
                        .filter(|rate| (1..=MAX_SAMPLE_RATE).contains(rate))
                        .ok_or_else(|| {
                            AppError::parse(format!("unsupported sample rate in {}", mime_type))
                        })?;
                }
            } else if let Some(bits) = lower.strip_prefix("audio/l") {
                if let Ok(bits) = bits.trim().parse::<u64>() {
                    format.bits_per_sample = u16::try_from(bits)
                        .ok()
                        .filter(|bits| SAMPLE_WIDTHS.contains(bits))
                        .ok_or_else(|| {
                            AppError::parse(format!("unsupported sample width in {}", mime_type))
                        })?;
                }
            }
        }

        Ok(format)
    }

    fn block_align(&self) -> u16 {
        CHANNELS * (self.bits_per_sample / 8)
    }
}

/// True for raw PCM MIME types (`audio/L16`, `audio/L24`, ...).
pub fn is_raw_pcm(mime_type: &str) -> bool {
    mime_type.trim().to_ascii_lowercase().starts_with("audio/l")
}

/// Prefix mono PCM samples with a canonical 44-byte RIFF/WAVE header.
pub fn wrap_pcm(pcm: &[u8], format: AudioFormat) -> Result<Vec<u8>> {
    let data_len = u32::try_from(pcm.len())
        .ok()
        .filter(|len| len.checked_add(36).is_some())
        .ok_or_else(|| {
            AppError::parse(format!("{} bytes of PCM do not fit a WAV file", pcm.len()))
        })?;
    let block_align = format.block_align();
    let byte_rate = format
        .sample_rate
        .checked_mul(u32::from(block_align))
        .ok_or_else(|| {
            AppError::parse(format!("byte rate overflows at {} Hz", format.sample_rate))
        })?;

    let mut wav = Vec::with_capacity(HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&format.bits_per_sample.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    Ok(wav)
}

/// Playback length of a WAV file in whole seconds (rounded).
pub fn duration_secs(wav: &[u8]) -> Result<u32> {
    let reader = hound::WavReader::new(Cursor::new(wav))?;
    let sample_rate = reader.spec().sample_rate;
    if sample_rate == 0 {
        return Err(AppError::parse("WAV file has a sample rate of 0"));
    }
    let frames = f64::from(reader.duration());
    Ok((frames / f64::from(sample_rate)).round() as u32)
}
