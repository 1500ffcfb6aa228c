//! Signed-to-unsigned sample conditioning.
//!
//! WAV stores 16-bit PCM as signed two's-complement; the DAC data register
//! expects unsigned, left-adjusted values. The two representations differ
//! only in the sign bit, so the conversion is a bias flip: XOR each sample
//! with 0x8000 — in byte terms, flip bit 7 of the high (second,
//! little-endian) byte of every pair.
//!
//! The flip is applied in place, exactly once per loaded byte range, after a
//! block is read and before the DMA emits it. It is its own inverse, so a
//! second application would corrupt the audio — the streaming engine never
//! reconditions a range it already converted.
//!
//! 8-bit blocks pass through untouched: the 8-bit WAV payload is already
//! unsigned and matches the DAC's 8-bit format directly.

use platform::dma::BeatSize;

/// Flip the sign bit of every 16-bit little-endian sample in `block`.
///
/// An odd trailing byte (not a full sample) is left as is.
pub fn bias_flip_16(block: &mut [u8]) {
    for pair in block.chunks_exact_mut(2) {
        if let Some(high) = pair.get_mut(1) {
            *high ^= 0x80;
        }
    }
}

/// Condition a freshly loaded byte range for the DAC.
pub fn condition(beat: BeatSize, block: &mut [u8]) {
    match beat {
        BeatSize::Byte => {}
        BeatSize::HalfWord => bias_flip_16(block),
    }
}
