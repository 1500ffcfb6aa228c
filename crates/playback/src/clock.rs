//! Sample clock solver and programmer.
//!
//! Maps a requested playback frequency onto the sample timer's
//! (prescale divisor, 16-bit top) pair and programs it through the
//! [`AudioHardware`] trait, honoring the timer's register synchronization
//! protocol (see `platform::audio` module docs).
//!
//! The solver walks the divisor table smallest-first and takes the first
//! divisor whose top value fits in 16 bits, which maximises the timer
//! resolution and therefore the achieved-rate accuracy:
//!
//! ```text
//!   top = SOURCE / divisor / frequency − 1      (must be < 65 536)
//!   achieved = SOURCE / divisor / (top + 1)
//! ```

use platform::audio::AudioHardware;
use platform::timer::{
    ClockDivisor, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ, SAMPLE_TIMER_SOURCE_HZ,
};
use thiserror_no_std::Error;

/// A frequency outside the supported playback range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("frequency {value} Hz outside supported range {min}..={max}")]
pub struct RangeError {
    /// The rejected frequency.
    pub value: u32,
    /// Inclusive minimum.
    pub min: u32,
    /// Inclusive maximum.
    pub max: u32,
}

impl RangeError {
    fn new(value: u32) -> Self {
        Self {
            value,
            min: MIN_SAMPLE_RATE_HZ,
            max: MAX_SAMPLE_RATE_HZ,
        }
    }
}

/// Choose the smallest divisor whose top value fits in 16 bits.
///
/// # Errors
///
/// [`RangeError`] when `frequency` is 0 or above the 350 kHz ceiling.
#[allow(clippy::arithmetic_side_effects)] // divisor.value() and frequency are nonzero here
pub fn solve(frequency: u32) -> Result<(ClockDivisor, u16), RangeError> {
    if !(MIN_SAMPLE_RATE_HZ..=MAX_SAMPLE_RATE_HZ).contains(&frequency) {
        return Err(RangeError::new(frequency));
    }
    for divisor in ClockDivisor::ALL {
        let ticks = SAMPLE_TIMER_SOURCE_HZ / divisor.value() / frequency;
        if let Some(top) = ticks.checked_sub(1) {
            if let Ok(top) = u16::try_from(top) {
                return Ok((divisor, top));
            }
        }
    }
    // The divisor table proves a solution for every in-range frequency
    // (platform::timer module docs); this arm cannot be taken.
    Err(RangeError::new(frequency))
}

/// Programs and caches the sample timer rate.
///
/// Caches the last divisor so that frequency changes which only move the top
/// value skip the disable/divisor/enable dance entirely.
#[derive(Debug, Default)]
pub struct SampleClock {
    programmed: Option<ClockDivisor>,
}

impl SampleClock {
    /// A clock that has not programmed any divisor yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { programmed: None }
    }

    /// Program the timer for `frequency`.
    ///
    /// The divisor is rewritten only when it differs from the cached value;
    /// the prescaler field is only writable while the timer is disabled, so
    /// a divisor change disables the timer and — when `resume` is set —
    /// re-enables it afterwards (live frequency change during playback).
    /// The top value is always rewritten. Every register write is followed
    /// by a sync wait, as the peripheral requires.
    ///
    /// # Errors
    ///
    /// [`RangeError`] when `frequency` is unsupported; the timer is left
    /// untouched in that case.
    pub fn program<H: AudioHardware>(
        &mut self,
        hw: &mut H,
        frequency: u32,
        resume: bool,
    ) -> Result<(), RangeError> {
        let (divisor, top) = solve(frequency)?;
        if self.programmed != Some(divisor) {
            hw.timer_set_enabled(false);
            hw.timer_wait_sync();
            hw.timer_set_divisor(divisor);
            hw.timer_wait_sync();
            if resume {
                hw.timer_set_enabled(true);
                hw.timer_wait_sync();
            }
            self.programmed = Some(divisor);
        }
        hw.timer_set_top(top);
        hw.timer_wait_sync();
        Ok(())
    }
}
