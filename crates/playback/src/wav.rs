//! RIFF/WAVE container parser for the streaming engine.
//!
//! Validates the strict subset the DAC path can play — uncompressed PCM,
//! mono, 8 or 16-bit — and extracts the playback geometry: sample rate,
//! sample width, and the extent of the `data` chunk.
//!
//! # Layout requirement
//!
//! The parser expects the canonical minimal layout:
//!
//! ```text
//!   "RIFF" <riff_size> "WAVE" "fmt " <fmt_size> <fmt record> "data" <len> ...
//! ```
//!
//! Files with chunks between `fmt ` and `data` (LIST/INFO metadata, cue
//! points) are rejected. This is a documented limitation of the engine, not
//! an oversight — chunk skipping is out of scope.

use platform::storage::File;
use thiserror_no_std::Error;

/// Fixed capacity of the format record: the 16-byte PCM record plus the
/// 2-byte `extra_params` count some encoders append.
const FORMAT_RECORD_CAPACITY: usize = 18;

/// WAVE `audio_format` tag for uncompressed linear PCM.
const FORMAT_PCM: u16 = 1;

/// Container validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaveError {
    /// The file does not begin with a `RIFF` tag.
    #[error("not a RIFF container")]
    NotRiff,
    /// The RIFF form type / first chunk is not `WAVEfmt `.
    #[error("not a WAVE file with a leading fmt chunk")]
    NotWave,
    /// The declared format record exceeds the 18-byte capacity.
    #[error("format record larger than 18 bytes")]
    OversizedFormatRecord,
    /// `audio_format` is not linear PCM.
    #[error("unsupported encoding (only PCM is playable)")]
    UnsupportedEncoding,
    /// More than one channel.
    #[error("unsupported channel count (mono only)")]
    TooManyChannels,
    /// Sample width is not 8 or 16 bits.
    #[error("unsupported bits per sample (8 or 16 only)")]
    UnsupportedBitDepth,
    /// An 18-byte format record declared nonzero extra parameters.
    #[error("nonzero extra format parameters")]
    NonzeroExtraParams,
    /// The chunk after `fmt ` is not `data`.
    #[error("fmt chunk not immediately followed by data chunk")]
    MissingDataChunk,
    /// The container ended before a required field.
    #[error("file truncated inside the header")]
    Truncated,
    /// The underlying file reported a read failure.
    #[error("read failure while parsing header")]
    Io,
}

/// Validated format fields of a playable file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveFormat {
    /// Channel count (always ≤ 1 after validation).
    pub channels: u16,
    /// Sample rate in Hz, straight from the container.
    pub sample_rate: u32,
    /// Bits per sample (8 or 16 after validation).
    pub bits_per_sample: u16,
}

/// Everything `play()` needs to stream the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WaveInfo {
    /// The validated format record.
    pub format: WaveFormat,
    /// Sample width in bytes (1 or 2).
    pub bytes_per_sample: u8,
    /// Absolute file offset of the first sample byte.
    pub data_start: u64,
    /// Length of the `data` chunk in bytes.
    pub file_length: u32,
}

/// Read exactly `buf.len()` bytes or fail.
fn read_exact<F: File>(file: &mut F, buf: &mut [u8]) -> Result<(), WaveError> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let rest = buf.get_mut(filled..).ok_or(WaveError::Truncated)?;
        let n = file.read(rest).map_err(|_| WaveError::Io)?;
        if n == 0 {
            return Err(WaveError::Truncated);
        }
        filled = filled.saturating_add(n);
    }
    Ok(())
}

/// Parse and validate a WAVE header from a file positioned at offset 0.
///
/// On success the file is positioned at `data_start`, ready for the first
/// block load.
///
/// # Errors
///
/// A [`WaveError`] naming the first validation that failed.
pub fn parse<F: File>(file: &mut F) -> Result<WaveInfo, WaveError> {
    // "RIFF" <riff_size:4> "WAVE" then the fmt tag — 16 bytes.
    let mut header = [0u8; 16];
    read_exact(file, &mut header)?;
    if !header.starts_with(b"RIFF") {
        return Err(WaveError::NotRiff);
    }
    if header.get(8..16) != Some(b"WAVEfmt ".as_slice()) {
        return Err(WaveError::NotWave);
    }

    let mut size_bytes = [0u8; 4];
    read_exact(file, &mut size_bytes)?;
    let format_size = u32::from_le_bytes(size_bytes);
    if format_size as usize > FORMAT_RECORD_CAPACITY {
        return Err(WaveError::OversizedFormatRecord);
    }

    let mut record = [0u8; FORMAT_RECORD_CAPACITY];
    {
        let span = record
            .get_mut(..format_size as usize)
            .ok_or(WaveError::Truncated)?;
        // The bytes-read count is deliberately not compared against
        // format_size here; a short read leaves trailing zeros in the
        // record. Long-standing behavior, kept as is.
        let _ = file.read(span).map_err(|_| WaveError::Io)?;
    }

    let [af0, af1, ch0, ch1, sr0, sr1, sr2, sr3, _, _, _, _, _, _, bps0, bps1, xp0, xp1] = record;
    let audio_format = u16::from_le_bytes([af0, af1]);
    let channels = u16::from_le_bytes([ch0, ch1]);
    let sample_rate = u32::from_le_bytes([sr0, sr1, sr2, sr3]);
    let bits_per_sample = u16::from_le_bytes([bps0, bps1]);
    let extra_params = u16::from_le_bytes([xp0, xp1]);

    if audio_format != FORMAT_PCM {
        return Err(WaveError::UnsupportedEncoding);
    }
    if channels > 1 {
        return Err(WaveError::TooManyChannels);
    }
    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(WaveError::UnsupportedBitDepth);
    }
    if format_size as usize == FORMAT_RECORD_CAPACITY && extra_params != 0 {
        return Err(WaveError::NonzeroExtraParams);
    }

    let mut data_tag = [0u8; 4];
    read_exact(file, &mut data_tag)?;
    if &data_tag != b"data" {
        return Err(WaveError::MissingDataChunk);
    }

    let mut len_bytes = [0u8; 4];
    read_exact(file, &mut len_bytes)?;
    let file_length = u32::from_le_bytes(len_bytes);

    // 16-byte header + 4-byte size + record + "data" + 4-byte length.
    let data_start = 28u64.saturating_add(u64::from(format_size));

    #[allow(clippy::cast_possible_truncation)] // bits_per_sample validated to 8 or 16
    let bytes_per_sample = (bits_per_sample / 8) as u8;

    Ok(WaveInfo {
        format: WaveFormat {
            channels,
            sample_rate,
            bits_per_sample,
        },
        bytes_per_sample,
        data_start,
        file_length,
    })
}
