//! DMA descriptor arena for the audio streaming channel.
//!
//! The audio engine drives a single DMA channel whose transfer program is a
//! small linked list of descriptors: each descriptor names a source buffer,
//! a beat size, a beat count, and an optional successor. Double-buffered
//! playback links two descriptors into a 2-entry ring; one-shot playback
//! terminates the chain with `next = None`.
//!
//! Descriptors live in a fixed-capacity [`DescriptorArena`] and are addressed
//! by [`DescriptorId`] — there is no raw address arithmetic anywhere. The
//! hardware backend receives the arena by reference when a job starts and is
//! free to translate descriptors into whatever register format it needs.

/// One streaming block: the refill granularity in bytes.
///
/// 512 bytes is one full descriptor's worth of samples (512 beats at 8-bit,
/// 256 beats at 16-bit). At 8 kHz / 16-bit the refill tick has
/// `256 samples / 8000 Hz` = 32 ms to reload a block — comfortably above any
/// maintenance-tick period.
pub const BLOCK_LENGTH: usize = 512;

/// Capacity of the descriptor arena.
///
/// A double-buffered file session needs two descriptors and a raw-buffer
/// session needs one; four slots leave room for a superseded session whose
/// descriptors have not been freed yet.
pub const DESCRIPTOR_SLOTS: usize = 4;

/// One DMA transfer unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeatSize {
    /// 1-byte beats (8-bit samples).
    Byte,
    /// 2-byte beats (16-bit samples, little-endian).
    HalfWord,
}

impl BeatSize {
    /// Beat width in bytes.
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
        }
    }

    /// Map a sample width in bytes to a beat size.
    ///
    /// Only 1 and 2-byte samples exist in this engine.
    #[must_use]
    pub const fn from_bytes_per_sample(bytes: u8) -> Option<Self> {
        match bytes {
            1 => Some(Self::Byte),
            2 => Some(Self::HalfWord),
            _ => None,
        }
    }
}

/// Which sample buffer a descriptor reads from.
///
/// The destination is not recorded here: every descriptor in this engine
/// targets the DAC data register, the only DMA sink the channel serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferId {
    /// The session's first inline sample block.
    Primary,
    /// The session's second inline sample block.
    Secondary,
    /// A caller-owned raw sample buffer (one-shot / self-looping playback).
    External,
}

/// Handle to a descriptor slot in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DescriptorId(u8);

impl DescriptorId {
    /// Slot index inside the arena (stable for the descriptor's lifetime).
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// A DMA transfer record: source region, beat geometry, and successor link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaDescriptor {
    /// Source buffer the beats are fetched from.
    pub src: BufferId,
    /// Valid bytes at the start of `src` covered by this descriptor.
    pub len_bytes: usize,
    /// Transfer unit width.
    pub beat: BeatSize,
    /// Number of beats to emit (`len_bytes / beat.bytes()`).
    pub block_transfer_count: u16,
    /// Next descriptor in the chain; `None` halts the channel after this one.
    pub next: Option<DescriptorId>,
}

/// Fixed-capacity descriptor storage.
///
/// Slots are allocated and freed individually. Ids are plain indices, not
/// generations — the engine frees descriptors only on `stop()`/`deinit()`,
/// so a stale handle cannot outlive its session.
pub struct DescriptorArena<const N: usize> {
    slots: [Option<DmaDescriptor>; N],
}

impl<const N: usize> DescriptorArena<N> {
    /// Create an empty arena.
    #[must_use]
    pub const fn new() -> Self {
        Self { slots: [None; N] }
    }

    /// Allocate a slot for `desc`, returning its id.
    ///
    /// Returns `None` when every slot is occupied.
    #[allow(clippy::cast_possible_truncation)] // N is a small compile-time capacity, never > u8::MAX
    pub fn alloc(&mut self, desc: DmaDescriptor) -> Option<DescriptorId> {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.is_none() {
                *slot = Some(desc);
                return Some(DescriptorId(i as u8));
            }
        }
        None
    }

    /// Release a slot. Freeing an already-free slot is a no-op.
    pub fn free(&mut self, id: DescriptorId) {
        if let Some(slot) = self.slots.get_mut(id.index()) {
            *slot = None;
        }
    }

    /// Borrow a descriptor.
    #[must_use]
    pub fn get(&self, id: DescriptorId) -> Option<&DmaDescriptor> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutably borrow a descriptor (the refill path patches the final
    /// descriptor in place through this).
    pub fn get_mut(&mut self, id: DescriptorId) -> Option<&mut DmaDescriptor> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    /// Number of occupied slots.
    #[must_use]
    pub fn occupied(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl<const N: usize> Default for DescriptorArena<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
