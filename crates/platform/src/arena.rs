//! Refcounted ownership of the shared audio output hardware.
//!
//! The DAC, sample timer, block counter, event links and DMA channel form a
//! process-wide singleton: any number of playback sessions may exist, but
//! only one drives the hardware at a time. [`AudioHardwareArena`] makes that
//! structure explicit — the host owns the arena, sessions are *attached* to
//! it (claiming their output pin and a refcount share) and at most one is
//! marked *active*.
//!
//! Mutual exclusion is structural, not lock-based: every session operation
//! takes `&mut` to the arena, and the single-threaded cooperative scheduler
//! never runs two sessions concurrently.

use heapless::Vec;
use thiserror_no_std::Error;

use crate::audio::{AudioHardware, Descriptors};
use crate::dma::{DescriptorId, DmaDescriptor};

/// Maximum simultaneously claimed output pins.
pub const MAX_CLAIMED_PINS: usize = 8;

/// A DAC-capable output pin, identified by its package number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinId(pub u8);

impl core::fmt::Display for PinId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "pin {}", self.0)
    }
}

/// Handle identifying an attached session. Monotonically assigned; never
/// reused within an arena's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SessionId(u32);

/// Resource acquisition failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ArenaError {
    /// The requested pin is already claimed by another session.
    #[error("{0} is already claimed")]
    PinClaimed(PinId),
    /// The pin claim table is full.
    #[error("pin claim table is full")]
    PinTableFull,
    /// The shared audio peripherals could not be initialised.
    #[error("audio peripheral initialisation failed")]
    HwInit,
    /// Every DMA descriptor slot is occupied.
    #[error("no free DMA descriptor slot")]
    NoFreeDescriptor,
}

/// Owner of the shared audio hardware, its descriptor arena, and the
/// claimed-pin bookkeeping.
pub struct AudioHardwareArena<H: AudioHardware> {
    hw: H,
    descriptors: Descriptors,
    claimed: Vec<PinId, MAX_CLAIMED_PINS>,
    sessions: u8,
    active: Option<SessionId>,
    next_session: u32,
}

impl<H: AudioHardware> AudioHardwareArena<H> {
    /// Wrap a hardware backend. No peripheral is touched until the first
    /// session attaches.
    pub fn new(hw: H) -> Self {
        Self {
            hw,
            descriptors: Descriptors::new(),
            claimed: Vec::new(),
            sessions: 0,
            active: None,
            next_session: 0,
        }
    }

    /// Attach a new session: claim `pin` and take a refcount share of the
    /// shared hardware, initialising it on the 0 → 1 transition.
    ///
    /// # Errors
    ///
    /// [`ArenaError::PinClaimed`] when the pin is taken,
    /// [`ArenaError::PinTableFull`] when the claim table is exhausted, and
    /// [`ArenaError::HwInit`] when peripheral bring-up fails. On any error
    /// every partial acquisition is unwound — a failed attach leaks nothing.
    pub fn attach(&mut self, pin: PinId) -> Result<SessionId, ArenaError> {
        if self.claimed.contains(&pin) {
            return Err(ArenaError::PinClaimed(pin));
        }
        if self.claimed.push(pin).is_err() {
            return Err(ArenaError::PinTableFull);
        }
        if self.sessions == 0 && self.hw.init().is_err() {
            // Unwind the pin claim before surfacing.
            self.claimed.retain(|p| *p != pin);
            return Err(ArenaError::HwInit);
        }
        self.sessions = self.sessions.saturating_add(1);
        let id = SessionId(self.next_session);
        self.next_session = self.next_session.wrapping_add(1);
        Ok(id)
    }

    /// Detach a session: release its pin and refcount share, tearing the
    /// shared hardware down on the 1 → 0 transition.
    ///
    /// The caller must have halted its own playback first; the arena still
    /// clears a stale active marker defensively.
    pub fn detach(&mut self, session: SessionId, pin: PinId) {
        self.claimed.retain(|p| *p != pin);
        if self.active == Some(session) {
            self.halt_playback();
            self.active = None;
        }
        self.sessions = self.sessions.saturating_sub(1);
        if self.sessions == 0 {
            self.hw.deinit();
        }
    }

    /// Whether `session` currently drives the hardware.
    #[must_use]
    pub fn is_active(&self, session: SessionId) -> bool {
        self.active == Some(session)
    }

    /// Make `session` the active one, superseding whatever was playing.
    ///
    /// Any running job is halted first (abort, never drain) so the new
    /// session finds the hardware quiescent.
    pub fn activate(&mut self, session: SessionId) {
        if self.active.is_some() {
            self.halt_playback();
        }
        self.active = Some(session);
    }

    /// Clear the active marker if it names `session`.
    pub fn deactivate(&mut self, session: SessionId) {
        if self.active == Some(session) {
            self.active = None;
        }
    }

    /// Stop every playback-related peripheral: abort the DMA job, stop both
    /// timers, put the DAC in standby. Descriptors are left to their owning
    /// session to free.
    pub fn halt_playback(&mut self) {
        self.hw.dma_abort();
        self.hw.timer_set_enabled(false);
        self.hw.timer_wait_sync();
        self.hw.counter_set_enabled(false);
        self.hw.dac_disable();
    }

    /// Allocate a DMA descriptor slot.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NoFreeDescriptor`] when the arena is full.
    pub fn alloc_descriptor(&mut self, desc: DmaDescriptor) -> Result<DescriptorId, ArenaError> {
        self.descriptors
            .alloc(desc)
            .ok_or(ArenaError::NoFreeDescriptor)
    }

    /// Free a DMA descriptor slot.
    pub fn free_descriptor(&mut self, id: DescriptorId) {
        self.descriptors.free(id);
    }

    /// Borrow the descriptor arena.
    #[must_use]
    pub fn descriptors(&self) -> &Descriptors {
        &self.descriptors
    }

    /// Mutably borrow the descriptor arena (refill patches descriptors
    /// through this).
    pub fn descriptors_mut(&mut self) -> &mut Descriptors {
        &mut self.descriptors
    }

    /// Borrow the hardware backend.
    #[must_use]
    pub fn hw(&self) -> &H {
        &self.hw
    }

    /// Mutably borrow the hardware backend.
    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Start a DMA job over the arena's descriptors.
    ///
    /// # Errors
    ///
    /// Propagated from the backend when the job cannot start.
    pub fn start_dma(&mut self, first: DescriptorId) -> Result<(), H::Error> {
        self.hw.dma_start(&self.descriptors, first)
    }

    /// Number of currently attached sessions.
    #[must_use]
    pub fn session_count(&self) -> u8 {
        self.sessions
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
