//! Double-buffered DMA block streaming.
//!
//! [`FileStream`] owns a pair of 512-byte sample blocks and their DMA
//! descriptors, linked into a 2-entry ring: while the hardware plays one
//! block, the background refill reloads the other from the file. The only
//! progress signal is the free-running block counter — one increment per
//! block the DMA consumes — compared against the stream's high-water mark of
//! loaded blocks. There is no completion interrupt.
//!
//! ```text
//!           ┌──────────────┐   next   ┌──────────────┐
//!   DMA ──▶ │ primary desc │ ───────▶ │ secondary    │ ──┐
//!           └──────────────┘          └──────────────┘   │
//!                  ▲                                     │
//!                  └─────────────────────────────────────┘
//! ```
//!
//! Block *n* (1-based) always lands in the primary buffer when *n* is odd
//! and the secondary when even — the same order the ring was linked in — so
//! the refill target is derived from the loaded-block count, which stays
//! correct even when a late maintenance tick has to catch up one block at a
//! time.
//!
//! End of stream (non-looping) is handled by patching the in-flight ring:
//! the descriptor of the final, possibly partial block gets its beat count
//! trimmed to the bytes actually read and its next-link cleared, so the
//! channel halts naturally after emitting exactly the remaining samples.

use platform::arena::{ArenaError, AudioHardwareArena};
use platform::audio::AudioHardware;
use platform::dma::{BeatSize, BufferId, DescriptorId, DmaDescriptor, BLOCK_LENGTH};
use platform::storage::File;
use thiserror_no_std::Error;

use crate::conditioner::condition;
use crate::wav::WaveInfo;

/// Failure while starting a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// Descriptor allocation failed.
    #[error("resource failure: {0}")]
    Arena(#[from] ArenaError),
    /// The file refused a seek or read during prefill.
    #[error("read failure while loading a block")]
    Io,
}

/// Outcome of one background maintenance tick.
///
/// Returned rather than logged: the refill path runs where output is
/// forbidden, so the scheduler decides what (if anything) to do with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Refill {
    /// Nothing to do (buffers ahead of playback, or stream not refillable).
    Idle,
    /// One block was loaded and conditioned.
    Loaded {
        /// 1-based number of the block just loaded.
        block: u32,
        /// Bytes placed in the buffer.
        bytes: usize,
    },
    /// The final block was loaded and its descriptor patched; the DMA chain
    /// will halt after it plays.
    Finished {
        /// 1-based number of the final block.
        block: u32,
        /// Bytes in the final block.
        bytes: usize,
    },
}

/// Double-buffered file streamer for one playback session.
pub struct FileStream<F: File> {
    file: F,
    data_start: u64,
    file_length: u32,
    beat: BeatSize,

    bytes_remaining: u32,
    last_loaded_block: u32,
    looping: bool,
    ended: bool,

    buffers: [[u8; BLOCK_LENGTH]; 2],
    descs: Option<[DescriptorId; 2]>,
}

impl<F: File> FileStream<F> {
    /// Wrap a parsed file. No hardware is touched until [`FileStream::begin`].
    #[must_use]
    pub fn new(file: F, info: &WaveInfo) -> Self {
        Self {
            file,
            data_start: info.data_start,
            file_length: info.file_length,
            // The parser only admits 1 or 2-byte samples.
            beat: BeatSize::from_bytes_per_sample(info.bytes_per_sample)
                .unwrap_or(BeatSize::Byte),
            bytes_remaining: 0,
            last_loaded_block: 0,
            looping: false,
            ended: false,
            buffers: [[0; BLOCK_LENGTH]; 2],
            descs: None,
        }
    }

    /// Build the descriptor ring, rewind to the data chunk, and prefill both
    /// buffers. Returns the descriptor the DMA job starts at.
    ///
    /// The prefill runs the same block-load routine the background refill
    /// uses, so `last_loaded_block == 2` afterwards (or 1 for a sub-block
    /// file, whose chain is already terminated).
    ///
    /// # Errors
    ///
    /// [`StreamError::Arena`] when no descriptor slot is free and
    /// [`StreamError::Io`] on seek/read failure. Any descriptor already
    /// allocated is freed before the error surfaces.
    #[allow(clippy::arithmetic_side_effects)] // beat.bytes() is 1 or 2, never zero
    #[allow(clippy::cast_possible_truncation)] // BLOCK_LENGTH / beat ≤ 512 fits u16
    pub fn begin<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        looping: bool,
    ) -> Result<DescriptorId, StreamError> {
        self.looping = looping;
        self.ended = false;
        self.last_loaded_block = 0;
        self.bytes_remaining = self.file_length;
        self.file
            .seek(self.data_start)
            .map_err(|_| StreamError::Io)?;

        let full_block = DmaDescriptor {
            src: BufferId::Primary,
            len_bytes: BLOCK_LENGTH,
            beat: self.beat,
            block_transfer_count: (BLOCK_LENGTH / self.beat.bytes()) as u16,
            next: None,
        };
        let primary = arena.alloc_descriptor(full_block)?;
        let secondary = match arena.alloc_descriptor(DmaDescriptor {
            src: BufferId::Secondary,
            ..full_block
        }) {
            Ok(id) => id,
            Err(e) => {
                arena.free_descriptor(primary);
                return Err(e.into());
            }
        };
        if let Some(d) = arena.descriptors_mut().get_mut(primary) {
            d.next = Some(secondary);
        }
        if let Some(d) = arena.descriptors_mut().get_mut(secondary) {
            d.next = Some(primary);
        }
        self.descs = Some([primary, secondary]);

        for idx in 0..2 {
            if !self.ended && self.load_block(arena, idx).is_err() {
                self.release(arena);
                return Err(StreamError::Io);
            }
        }
        Ok(primary)
    }

    /// One background maintenance tick: reload at most one consumed block.
    ///
    /// No-op unless the block counter has crossed the double-buffer
    /// watermark (fewer than two loaded blocks ahead of playback). Never
    /// blocks, never prints; the caller may log the returned [`Refill`].
    ///
    /// # Errors
    ///
    /// The file's own error on a failed seek/read. The stream stays
    /// consistent; a subsequent `stop()` is always safe.
    pub fn service<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        block_counter: u32,
    ) -> Result<Refill, F::Error> {
        if self.ended || self.descs.is_none() {
            return Ok(Refill::Idle);
        }
        if block_counter.saturating_add(2) <= self.last_loaded_block {
            return Ok(Refill::Idle);
        }
        // Block n lands in buffer (n−1) % 2; the next block is
        // last_loaded_block + 1.
        #[allow(clippy::cast_possible_truncation)] // value is 0 or 1
        let idx = (self.last_loaded_block % 2) as usize;
        let (bytes, finished) = self.load_block(arena, idx)?;
        let block = self.last_loaded_block;
        Ok(if finished {
            Refill::Finished { block, bytes }
        } else {
            Refill::Loaded { block, bytes }
        })
    }

    /// Load one block into buffer `idx`, condition it, and advance the
    /// loaded-block count.
    ///
    /// Looping streams wrap to `data_start` whenever the remaining count
    /// hits zero and keep filling until the block is fully populated (a file
    /// shorter than a block wraps several times). Non-looping streams patch
    /// the target descriptor at end of data so the chain terminates.
    #[allow(clippy::arithmetic_side_effects)] // filled ≤ BLOCK_LENGTH and got ≤ want ≤ remaining by construction
    #[allow(clippy::cast_possible_truncation)] // want ≤ BLOCK_LENGTH = 512
    fn load_block<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        idx: usize,
    ) -> Result<(usize, bool), F::Error> {
        let mut filled = 0usize;
        let mut finished = false;
        loop {
            let want = self
                .bytes_remaining
                .min((BLOCK_LENGTH - filled) as u32) as usize;
            if want > 0 {
                let span = self
                    .buffers
                    .get_mut(idx)
                    .and_then(|b| b.get_mut(filled..filled + want));
                let got = match span {
                    Some(span) => self.file.read(span)?,
                    None => 0,
                };
                filled += got;
                self.bytes_remaining -= got as u32;
                if got < want {
                    // Short read: silent truncation — the stream ends here.
                    self.bytes_remaining = 0;
                }
                if got == 0 {
                    // The media holds nothing at this offset: a header that
                    // declares more data than the file carries. Terminate
                    // even when looping, or the wrap-and-retry below would
                    // spin forever on an empty data chunk.
                    self.patch_final(arena, idx, filled);
                    self.ended = true;
                    finished = true;
                    break;
                }
            }
            if self.bytes_remaining == 0 {
                if self.looping && self.file_length > 0 {
                    self.file.seek(self.data_start)?;
                    self.bytes_remaining = self.file_length;
                    if filled == BLOCK_LENGTH {
                        break;
                    }
                    continue;
                }
                self.patch_final(arena, idx, filled);
                self.ended = true;
                finished = true;
                break;
            }
            if filled == BLOCK_LENGTH {
                break;
            }
        }
        if let Some(loaded) = self
            .buffers
            .get_mut(idx)
            .and_then(|b| b.get_mut(..filled))
        {
            condition(self.beat, loaded);
        }
        self.last_loaded_block += 1;
        Ok((filled, finished))
    }

    /// Trim the target descriptor to the bytes actually read and clear its
    /// next-link so the DMA halts after this block.
    #[allow(clippy::arithmetic_side_effects)] // beat.bytes() is 1 or 2, never zero
    #[allow(clippy::cast_possible_truncation)] // bytes ≤ BLOCK_LENGTH = 512
    fn patch_final<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        idx: usize,
        bytes: usize,
    ) {
        let Some(descs) = self.descs else { return };
        let Some(&id) = descs.get(idx) else { return };
        if let Some(d) = arena.descriptors_mut().get_mut(id) {
            d.len_bytes = bytes;
            d.block_transfer_count = (bytes / self.beat.bytes()) as u16;
            d.next = None;
        }
    }

    /// Free the descriptor pair (playback stopped or superseded).
    pub fn release<H: AudioHardware>(&mut self, arena: &mut AudioHardwareArena<H>) {
        if let Some([a, b]) = self.descs.take() {
            arena.free_descriptor(a);
            arena.free_descriptor(b);
        }
    }

    /// First descriptor of the ring, when built.
    #[must_use]
    pub fn first_descriptor(&self) -> Option<DescriptorId> {
        self.descs.map(|[a, _]| a)
    }

    /// Bytes of the data chunk not yet loaded into a buffer.
    #[must_use]
    pub fn bytes_remaining(&self) -> u32 {
        self.bytes_remaining
    }

    /// Blocks loaded since `begin()` (prefill included); strictly increasing
    /// while streaming.
    #[must_use]
    pub fn last_loaded_block(&self) -> u32 {
        self.last_loaded_block
    }

    /// Whether the final descriptor has been patched (no further refills).
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Beat size derived from the file's sample width.
    #[must_use]
    pub fn beat(&self) -> BeatSize {
        self.beat
    }

    /// Diagnostic view of a sample buffer's first `len` bytes.
    #[must_use]
    pub fn buffer(&self, idx: usize, len: usize) -> Option<&[u8]> {
        self.buffers.get(idx).and_then(|b| b.get(..len))
    }
}
