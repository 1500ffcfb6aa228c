//! Sample timer clocking constants and the prescaler divisor table.
//!
//! The sample timer paces DAC conversions: every overflow event triggers one
//! conversion through the event crossbar, so the playback rate is
//!
//! ```text
//!   sample_rate = SOURCE_CLOCK / divisor / (top + 1)
//! ```
//!
//! with `top` a 16-bit compare value and `divisor` one of eight hardware
//! prescaler settings. The clock solver searches the divisors in increasing
//! order and takes the smallest for which `top` fits in 16 bits, keeping the
//! timer resolution (and therefore the rate accuracy) as high as possible.
//!
//! # Range check
//!
//! The supported playback range is 1 Hz – 350 kHz:
//!
//! ```text
//!   f = 350 000 Hz: divisor 1,    top = 48e6 / 350 000 − 1 = 136      ✓ < 65 536
//!   f = 1 Hz:       divisor 1024, top = 48e6 / 1024 / 1 − 1 = 46 874  ✓ < 65 536
//! ```
//!
//! Every frequency in between admits some divisor from the table, so a
//! 16-bit top value always exists inside the supported range.

/// Sample timer source clock in Hz (undivided peripheral clock).
pub const SAMPLE_TIMER_SOURCE_HZ: u32 = 48_000_000;

/// Lowest supported playback rate in Hz.
pub const MIN_SAMPLE_RATE_HZ: u32 = 1;

/// Highest supported playback rate in Hz.
pub const MAX_SAMPLE_RATE_HZ: u32 = 350_000;

/// Hardware prescaler settings for the sample timer.
///
/// The prescaler field offers exactly these eight power-of-two ratios — there
/// is no 32, 128, or 512. Variants are ordered smallest-first so the solver
/// can walk [`ClockDivisor::ALL`] front to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivisor {
    /// Source clock / 1.
    Div1,
    /// Source clock / 2.
    Div2,
    /// Source clock / 4.
    Div4,
    /// Source clock / 8.
    Div8,
    /// Source clock / 16.
    Div16,
    /// Source clock / 64.
    Div64,
    /// Source clock / 256.
    Div256,
    /// Source clock / 1024.
    Div1024,
}

impl ClockDivisor {
    /// Every divisor the prescaler supports, in increasing order.
    pub const ALL: [Self; 8] = [
        Self::Div1,
        Self::Div2,
        Self::Div4,
        Self::Div8,
        Self::Div16,
        Self::Div64,
        Self::Div256,
        Self::Div1024,
    ];

    /// Numeric division ratio.
    #[must_use]
    pub const fn value(self) -> u32 {
        match self {
            Self::Div1 => 1,
            Self::Div2 => 2,
            Self::Div4 => 4,
            Self::Div8 => 8,
            Self::Div16 => 16,
            Self::Div64 => 64,
            Self::Div256 => 256,
            Self::Div1024 => 1024,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
