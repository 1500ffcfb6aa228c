//! Hardware abstraction layer for the WAV playback engine.
//!
//! This crate provides trait-based abstractions for the shared audio output
//! hardware, enabling development and testing without physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Host / interpreter loop (out of scope)
//!         ↓
//! Playback engine (playback crate)
//!         ↓
//! Platform HAL (this crate — arena, traits, descriptor storage)
//!         ↓
//! Hardware backend (AudioHardware impl; mocks on the host)
//! ```
//!
//! # Modules
//!
//! - [`arena`] — refcounted ownership of the shared DAC/timer/DMA singleton
//! - [`audio`] — the [`AudioHardware`] register-level trait
//! - [`dma`] — descriptor arena, beat sizes, the 512-byte block constant
//! - [`timer`] — sample-timer clocking constants and the prescaler table
//! - [`storage`] — synchronous file access trait
//! - [`mocks`] — host-side backends for tests (`std` feature)
//!
//! # Features
//!
//! - `std`: expose the mock implementations to downstream test suites
//! - `defmt`: enable defmt::Format derives on all platform types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // register and signal names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors — callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod arena;
pub mod audio;
pub mod dma;
pub mod mocks;
pub mod storage;
pub mod timer;

// Re-export the high-level types
pub use arena::{ArenaError, AudioHardwareArena, PinId, SessionId, MAX_CLAIMED_PINS};
pub use audio::{AudioHardware, Descriptors};
pub use dma::{
    BeatSize, BufferId, DescriptorArena, DescriptorId, DmaDescriptor, BLOCK_LENGTH,
    DESCRIPTOR_SLOTS,
};
pub use storage::{File, NoStorage};
pub use timer::{
    ClockDivisor, MAX_SAMPLE_RATE_HZ, MIN_SAMPLE_RATE_HZ, SAMPLE_TIMER_SOURCE_HZ,
};
