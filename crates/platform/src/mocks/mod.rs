//! Mock implementations for testing.
//!
//! Host-side stand-ins for the audio hardware backend and the sample file,
//! used by unit and integration tests across the workspace. Enabled for this
//! crate's own tests and for downstream crates via the `std` feature.
//!
//! The mocks stay `no_std`-clean (heapless backing stores) so they compile
//! for any target the real crates do.

#![cfg(any(test, feature = "std"))]

use heapless::Vec;

use crate::audio::{AudioHardware, Descriptors};
use crate::dma::DescriptorId;
use crate::storage::File;
use crate::timer::ClockDivisor;

/// Error type shared by the mock peripherals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHwError;

/// One recorded sample-timer register operation.
///
/// The clock programming sequence is order-sensitive (disable before divisor,
/// sync-wait after every write), so the mock records the exact op stream for
/// tests to assert against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerOp {
    /// `timer_set_enabled(bool)`.
    Enabled(bool),
    /// `timer_set_divisor(_)`.
    Divisor(ClockDivisor),
    /// `timer_set_top(_)`.
    Top(u16),
    /// `timer_wait_sync()`.
    WaitSync,
}

/// Scriptable [`AudioHardware`] backend.
///
/// Fields are public: tests both inspect state (`dac_enabled`, `dma_running`)
/// and drive the simulation (`advance_blocks`, `finish_dma`, `fail_init`).
#[derive(Debug, Default)]
pub struct MockAudioHardware {
    /// Times `init()` succeeded.
    pub init_calls: u32,
    /// Times `deinit()` ran.
    pub deinit_calls: u32,
    /// Make the next `init()` fail (partial-acquisition unwind tests).
    pub fail_init: bool,
    /// Event-crossbar links wired (set by `init`, cleared by `deinit`).
    pub links_wired: bool,

    /// DAC out of standby.
    pub dac_enabled: bool,

    /// Sample timer running.
    pub timer_enabled: bool,
    /// Last programmed prescaler divisor.
    pub divisor: Option<ClockDivisor>,
    /// Last programmed top/compare value.
    pub top: Option<u16>,
    /// Ordered log of timer register operations.
    pub timer_ops: Vec<TimerOp, 64>,

    /// Block counter running.
    pub counter_enabled: bool,
    counter: u32,

    /// DMA channel busy.
    pub dma_running: bool,
    /// First descriptor of the most recent job.
    pub dma_first: Option<DescriptorId>,
    /// Times a job was aborted.
    pub dma_aborts: u32,
}

impl MockAudioHardware {
    /// A quiescent backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the hardware consuming `blocks` DMA blocks: bumps the block
    /// counter (when running). The DMA busy flag is left untouched — a ring
    /// job stays busy until aborted or explicitly finished.
    pub fn advance_blocks(&mut self, blocks: u32) {
        if self.counter_enabled {
            self.counter = self.counter.saturating_add(blocks);
        }
    }

    /// Simulate the DMA channel running off the end of a terminated chain.
    pub fn finish_dma(&mut self) {
        self.dma_running = false;
    }

    fn log(&mut self, op: TimerOp) {
        // Log truncation is acceptable in a mock; tests inspect early ops.
        let _ = self.timer_ops.push(op);
    }
}

impl AudioHardware for MockAudioHardware {
    type Error = MockHwError;

    fn init(&mut self) -> Result<(), Self::Error> {
        if self.fail_init {
            return Err(MockHwError);
        }
        self.init_calls = self.init_calls.saturating_add(1);
        self.links_wired = true;
        Ok(())
    }

    fn deinit(&mut self) {
        self.deinit_calls = self.deinit_calls.saturating_add(1);
        self.links_wired = false;
    }

    fn dac_enable(&mut self) -> Result<(), Self::Error> {
        self.dac_enabled = true;
        Ok(())
    }

    fn dac_disable(&mut self) {
        self.dac_enabled = false;
    }

    fn timer_set_enabled(&mut self, enabled: bool) {
        self.timer_enabled = enabled;
        self.log(TimerOp::Enabled(enabled));
    }

    fn timer_set_divisor(&mut self, divisor: ClockDivisor) {
        self.divisor = Some(divisor);
        self.log(TimerOp::Divisor(divisor));
    }

    fn timer_set_top(&mut self, top: u16) {
        self.top = Some(top);
        self.log(TimerOp::Top(top));
    }

    fn timer_wait_sync(&mut self) {
        self.log(TimerOp::WaitSync);
    }

    fn counter_set_enabled(&mut self, enabled: bool) {
        self.counter_enabled = enabled;
    }

    fn counter_reset(&mut self) {
        self.counter = 0;
    }

    fn counter_value(&self) -> u32 {
        self.counter
    }

    fn dma_start(
        &mut self,
        descriptors: &Descriptors,
        first: DescriptorId,
    ) -> Result<(), Self::Error> {
        if descriptors.get(first).is_none() {
            return Err(MockHwError);
        }
        self.dma_first = Some(first);
        self.dma_running = true;
        Ok(())
    }

    fn dma_abort(&mut self) {
        if self.dma_running {
            self.dma_aborts = self.dma_aborts.saturating_add(1);
        }
        self.dma_running = false;
    }

    fn dma_busy(&self) -> bool {
        self.dma_running
    }
}

/// Capacity of [`MemFile`]'s backing store.
pub const MEM_FILE_CAPACITY: usize = 16_384;

/// In-memory [`File`] backed by a heapless vector.
#[derive(Debug, Clone, Default)]
pub struct MemFile {
    data: Vec<u8, MEM_FILE_CAPACITY>,
    pos: usize,
}

impl MemFile {
    /// Wrap `bytes` as a readable file.
    ///
    /// Returns `None` when `bytes` exceeds [`MEM_FILE_CAPACITY`].
    #[must_use]
    pub fn new(bytes: &[u8]) -> Option<Self> {
        Vec::from_slice(bytes)
            .ok()
            .map(|data| Self { data, pos: 0 })
    }

    /// Current read position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.pos
    }
}

impl File for MemFile {
    type Error = core::convert::Infallible;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let remaining = self.data.get(self.pos..).unwrap_or(&[]);
        let n = remaining.len().min(buf.len());
        if let (Some(dst), Some(src)) = (buf.get_mut(..n), remaining.get(..n)) {
            dst.copy_from_slice(src);
        }
        self.pos = self.pos.saturating_add(n);
        Ok(n)
    }

    fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        let clamped = usize::try_from(pos).unwrap_or(usize::MAX).min(self.data.len());
        self.pos = clamped;
        Ok(clamped as u64)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Error reported by [`FlakyFile`] once its read budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlakyIo;

/// [`File`] wrapper that fails every read after the first `fail_after`
/// successful ones — exercises the refill error-propagation path.
#[derive(Debug, Clone)]
pub struct FlakyFile {
    inner: MemFile,
    fail_after: u32,
    reads: u32,
}

impl FlakyFile {
    /// Wrap `inner`, allowing `fail_after` successful reads.
    #[must_use]
    pub fn new(inner: MemFile, fail_after: u32) -> Self {
        Self {
            inner,
            fail_after,
            reads: 0,
        }
    }
}

impl File for FlakyFile {
    type Error = FlakyIo;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        if self.reads >= self.fail_after {
            return Err(FlakyIo);
        }
        self.reads = self.reads.saturating_add(1);
        self.inner.read(buf).map_err(|_| FlakyIo)
    }

    fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.inner.seek(pos).map_err(|_| FlakyIo)
    }

    fn size(&self) -> u64 {
        self.inner.size()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
