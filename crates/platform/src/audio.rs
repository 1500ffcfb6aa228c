//! Audio output hardware abstraction.
//!
//! [`AudioHardware`] bundles every register-level operation the playback
//! engine performs on the shared DAC / sample-timer / DMA trio. One backend
//! instance models the whole singleton; the engine never talks to a
//! peripheral except through this trait, which keeps the streaming logic
//! testable on the host with [`crate::mocks::MockAudioHardware`].
//!
//! # Event wiring
//!
//! The "concurrency" of playback lives in hardware: [`AudioHardware::init`]
//! wires two event-crossbar links —
//!
//! ```text
//!   sample timer overflow ──▶ DAC start-conversion
//!   DAC data-register empty ──▶ DMA beat transfer
//! ```
//!
//! — so no software interrupt handler participates in steady-state playback.
//! The only software-visible progress signal is the free-running block
//! counter, which increments once per consumed block.
//!
//! # Register synchronization
//!
//! The sample timer sits in a slow clock domain: after each register write
//! the peripheral raises a sync-busy flag until the value has crossed
//! domains, and the next write is only legal once it clears. Callers must
//! follow every `timer_set_*` call with [`AudioHardware::timer_wait_sync`]
//! before touching the timer again. This is a peripheral constraint, not a
//! discretionary busy-wait.

use crate::dma::{DescriptorArena, DescriptorId, DESCRIPTOR_SLOTS};
use crate::timer::ClockDivisor;

/// The process-wide descriptor arena type handed to DMA jobs.
pub type Descriptors = DescriptorArena<DESCRIPTOR_SLOTS>;

/// Register-level operations on the shared audio output hardware.
pub trait AudioHardware {
    /// Backend error type (peripheral init / job start failures).
    type Error: core::fmt::Debug;

    /// Claim the shared peripherals (DAC, sample timer, block counter, DMA
    /// channel) and wire the two event-crossbar links.
    ///
    /// Called exactly once per arena lifetime, when the session refcount goes
    /// 0 → 1.
    ///
    /// # Errors
    ///
    /// Any peripheral that cannot be claimed or configured. The backend must
    /// leave no partial claim behind on failure.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Release everything [`AudioHardware::init`] claimed and unwire the
    /// event links. Called when the session refcount returns to 0.
    fn deinit(&mut self);

    /// Power up the DAC output channel.
    ///
    /// # Errors
    ///
    /// The backend may fail if the DAC cannot be brought out of standby.
    fn dac_enable(&mut self) -> Result<(), Self::Error>;

    /// Put the DAC back into standby. Idempotent.
    fn dac_disable(&mut self);

    /// Start or stop the sample timer. The timer must be disabled while the
    /// prescaler divisor is rewritten.
    fn timer_set_enabled(&mut self, enabled: bool);

    /// Program the prescaler divisor. Only legal while the timer is disabled.
    fn timer_set_divisor(&mut self, divisor: ClockDivisor);

    /// Program the 16-bit top/compare value (overflow period).
    fn timer_set_top(&mut self, top: u16);

    /// Block until the timer's pending register write has synchronized.
    ///
    /// Must be called after every `timer_set_*` operation before the next
    /// timer access (see module docs).
    fn timer_wait_sync(&mut self);

    /// Start or stop the free-running block counter.
    fn counter_set_enabled(&mut self, enabled: bool);

    /// Reset the block counter to zero (done once per `play()`).
    fn counter_reset(&mut self);

    /// Blocks consumed by the DMA since the last reset.
    fn counter_value(&self) -> u32;

    /// Launch a DMA job at `first`, following `next` links through
    /// `descriptors` until a cleared link halts the channel.
    ///
    /// # Errors
    ///
    /// `first` does not name a live descriptor, or the channel refuses the
    /// job.
    fn dma_start(
        &mut self,
        descriptors: &Descriptors,
        first: DescriptorId,
    ) -> Result<(), Self::Error>;

    /// Abort the running DMA job immediately. No drain, idempotent.
    fn dma_abort(&mut self);

    /// Whether the DMA channel is still busy with a job.
    fn dma_busy(&self) -> bool;
}
