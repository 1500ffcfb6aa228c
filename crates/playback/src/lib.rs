//! WAV streaming playback engine — header parsing, sample-clock programming,
//! double-buffered DMA streaming and the playback session state machine.
//!
//! The engine is hardware-free: everything below it goes through the
//! `platform` crate's [`AudioHardware`](platform::AudioHardware) trait, so
//! the whole crate runs (and is tested) on the host against mocks.
//!
//! # Modules
//!
//! - [`wav`] — RIFF/WAVE container parsing and validation
//! - [`clock`] — sample-rate → (divisor, top) solver and timer programmer
//! - [`conditioner`] — signed→unsigned bias flip for 16-bit blocks
//! - [`stream`] — the double-buffered block streamer and background refill
//! - [`audioout`] — playback sessions and their lifecycle

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::print_stdout)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod audioout;
pub mod clock;
pub mod conditioner;
pub mod stream;
pub mod wav;

pub use audioout::{
    AudioOut, AudioOutError, PlaybackState, RawSample, RawSampleError,
    DEFAULT_RAW_SAMPLE_RATE_HZ,
};
pub use clock::{RangeError, SampleClock};
pub use stream::{FileStream, Refill, StreamError};
pub use wav::{WaveError, WaveFormat, WaveInfo};
