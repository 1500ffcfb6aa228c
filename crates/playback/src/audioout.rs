//! Playback sessions and the playback state machine.
//!
//! [`AudioOut`] is one playback session: it claims a DAC pin, holds a sample
//! source (a parsed file stream or a caller-owned raw buffer) and moves
//! through a small state machine:
//!
//! ```text
//!   Idle ──play()──▶ Playing ──stop() / chain exhausted──▶ Stopped
//!     │                  │                                    │
//!     │                  └──────────play()─────────◀──────────┘
//!     └────────────────deinit()──▶ Deinitialized ◀────────────┘
//! ```
//!
//! The hardware never reports completion; a session discovers that its job
//! ended (or was superseded by another session) lazily, the next time
//! [`AudioOut::get_playing`] is asked. Every hardware interaction goes
//! through the shared [`AudioHardwareArena`], which the host passes into
//! each call.

use platform::arena::{ArenaError, AudioHardwareArena, PinId, SessionId};
use platform::audio::AudioHardware;
use platform::dma::{BeatSize, BufferId, DescriptorId, DmaDescriptor};
use platform::storage::{File, NoStorage};
use thiserror_no_std::Error;

use crate::clock::{self, RangeError, SampleClock};
use crate::stream::{FileStream, Refill, StreamError};
use crate::wav::{self, WaveError};

/// Sample rate assumed for raw buffers until the caller overrides it.
pub const DEFAULT_RAW_SAMPLE_RATE_HZ: u32 = 8_000;

/// Lifecycle of one playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PlaybackState {
    /// Constructed, never played.
    Idle,
    /// A DMA job was started and has not been observed to end.
    Playing,
    /// Played at least once; hardware released.
    Stopped,
    /// Pin and refcount share returned; the session is inert.
    Deinitialized,
}

/// Rejected raw sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RawSampleError {
    /// Only 8 and 16-bit samples can reach the DAC.
    #[error("unsupported bits per sample: {0}")]
    UnsupportedBitDepth(u16),
    /// An empty buffer would program a zero-beat DMA job.
    #[error("sample buffer is empty")]
    Empty,
    /// 16-bit buffers must hold a whole number of samples.
    #[error("16-bit sample buffer has an odd length")]
    Misaligned,
}

/// A caller-owned, pre-conditioned sample buffer.
///
/// Unlike file streams, raw buffers are played in place: the engine never
/// copies or rewrites them, so 16-bit data must already be biased for the
/// DAC by whoever produced it.
#[derive(Debug, Clone, Copy)]
pub struct RawSample<'a> {
    data: &'a [u8],
    beat: BeatSize,
}

impl<'a> RawSample<'a> {
    /// Wrap a sample buffer of the given width.
    ///
    /// # Errors
    ///
    /// [`RawSampleError`] when the depth is unsupported or the buffer shape
    /// does not match it.
    pub fn new(data: &'a [u8], bits_per_sample: u16) -> Result<Self, RawSampleError> {
        let beat = match bits_per_sample {
            8 => BeatSize::Byte,
            16 => BeatSize::HalfWord,
            other => return Err(RawSampleError::UnsupportedBitDepth(other)),
        };
        if data.is_empty() {
            return Err(RawSampleError::Empty);
        }
        if beat == BeatSize::HalfWord && data.len() % 2 != 0 {
            return Err(RawSampleError::Misaligned);
        }
        Ok(Self { data, beat })
    }

    /// Buffer length in bytes.
    #[must_use]
    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }

    /// DMA beat size matching the sample width.
    #[must_use]
    pub fn beat(&self) -> BeatSize {
        self.beat
    }
}

/// Everything a playback session can fail with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AudioOutError {
    /// The file is not a playable WAV.
    #[error("invalid wave file: {0}")]
    Wave(#[from] WaveError),
    /// Pin, refcount or descriptor acquisition failed.
    #[error("resource failure: {0}")]
    Resource(#[from] ArenaError),
    /// The requested sample rate cannot be programmed.
    #[error("{0}")]
    Frequency(#[from] RangeError),
    /// The raw sample buffer was rejected.
    #[error("{0}")]
    Sample(#[from] RawSampleError),
    /// The storage backend refused a seek or read.
    #[error("storage read failure")]
    Io,
    /// The hardware backend refused an operation.
    #[error("audio hardware fault")]
    Hw,
    /// The session was deinitialised and cannot be used again.
    #[error("session is deinitialised")]
    Deinitialized,
}

impl From<StreamError> for AudioOutError {
    fn from(e: StreamError) -> Self {
        match e {
            StreamError::Arena(e) => Self::Resource(e),
            StreamError::Io => Self::Io,
        }
    }
}

enum Source<'a, F: File> {
    Stream(FileStream<F>),
    Raw {
        sample: RawSample<'a>,
        desc: Option<DescriptorId>,
    },
}

/// One playback session bound to a DAC pin.
pub struct AudioOut<'a, F: File = NoStorage> {
    pin: PinId,
    session: SessionId,
    state: PlaybackState,
    frequency: u32,
    clock: SampleClock,
    source: Source<'a, F>,
}

impl<F: File> AudioOut<'_, F> {
    /// Open a WAV file for streaming playback on `pin`.
    ///
    /// The file is parsed before any resource is claimed, so a malformed
    /// file costs nothing. The session's sample rate starts at the rate the
    /// file declares.
    ///
    /// # Errors
    ///
    /// [`AudioOutError::Wave`] for a malformed or unsupported file, and
    /// [`AudioOutError::Resource`] when the pin is taken or the shared
    /// hardware cannot be brought up.
    pub fn from_file<H: AudioHardware>(
        arena: &mut AudioHardwareArena<H>,
        pin: PinId,
        mut file: F,
    ) -> Result<Self, AudioOutError> {
        let info = wav::parse(&mut file)?;
        let session = arena.attach(pin)?;
        Ok(Self {
            pin,
            session,
            state: PlaybackState::Idle,
            frequency: info.format.sample_rate,
            clock: SampleClock::new(),
            source: Source::Stream(FileStream::new(file, &info)),
        })
    }
}

impl<'a> AudioOut<'a, NoStorage> {
    /// Open a caller-owned sample buffer for playback on `pin`.
    ///
    /// The buffer is played as-is (see [`RawSample`]); its sample rate
    /// defaults to [`DEFAULT_RAW_SAMPLE_RATE_HZ`] until
    /// [`AudioOut::set_frequency`] says otherwise.
    ///
    /// # Errors
    ///
    /// [`AudioOutError::Sample`] for a rejected buffer and
    /// [`AudioOutError::Resource`] for pin or hardware acquisition failures.
    pub fn from_buffer<H: AudioHardware>(
        arena: &mut AudioHardwareArena<H>,
        pin: PinId,
        data: &'a [u8],
        bits_per_sample: u16,
    ) -> Result<Self, AudioOutError> {
        let sample = RawSample::new(data, bits_per_sample)?;
        let session = arena.attach(pin)?;
        Ok(Self {
            pin,
            session,
            state: PlaybackState::Idle,
            frequency: DEFAULT_RAW_SAMPLE_RATE_HZ,
            clock: SampleClock::new(),
            source: Source::Raw { sample, desc: None },
        })
    }
}

impl<'a, F: File> AudioOut<'a, F> {
    /// Start (or restart) playback, superseding whatever session was using
    /// the hardware.
    ///
    /// Any failure past the point where peripherals were touched unwinds
    /// completely: hardware quiescent, descriptors freed, session inactive.
    ///
    /// # Errors
    ///
    /// Descriptor exhaustion, storage failures during prefill, an
    /// out-of-range sample rate, or a hardware fault. Also
    /// [`AudioOutError::Deinitialized`] on a dead session.
    pub fn play<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        looping: bool,
    ) -> Result<(), AudioOutError> {
        if self.state == PlaybackState::Deinitialized {
            return Err(AudioOutError::Deinitialized);
        }
        // Restarting: drop our own previous job and buffers first.
        self.stop(arena);
        arena.activate(self.session);

        let first = match self.build_job(arena, looping) {
            Ok(first) => first,
            Err(e) => {
                arena.deactivate(self.session);
                return Err(e);
            }
        };
        if let Err(e) = self.start_hardware(arena, first) {
            self.unwind_failed_start(arena);
            return Err(e);
        }
        self.state = PlaybackState::Playing;
        Ok(())
    }

    /// Build the DMA descriptor chain for this session's source and prefill
    /// its buffers. Returns the descriptor the job starts at.
    #[allow(clippy::arithmetic_side_effects)] // beat.bytes() is 1 or 2, never zero
    fn build_job<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        looping: bool,
    ) -> Result<DescriptorId, AudioOutError> {
        match &mut self.source {
            Source::Stream(stream) => Ok(stream.begin(arena, looping)?),
            Source::Raw { sample, desc } => {
                let beats = sample.len_bytes() / sample.beat().bytes();
                let count =
                    u16::try_from(beats).map_err(|_| ArenaError::NoFreeDescriptor);
                // A raw buffer longer than one descriptor can express is a
                // caller error surfaced as resource exhaustion.
                let count = count?;
                let id = arena.alloc_descriptor(DmaDescriptor {
                    src: BufferId::External,
                    len_bytes: sample.len_bytes(),
                    beat: sample.beat(),
                    block_transfer_count: count,
                    next: None,
                })?;
                if looping {
                    if let Some(d) = arena.descriptors_mut().get_mut(id) {
                        d.next = Some(id);
                    }
                }
                *desc = Some(id);
                Ok(id)
            }
        }
    }

    /// Program the clock and bring the peripherals up in dependency order:
    /// timer last, so no conversion fires before the DMA job is armed.
    fn start_hardware<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        first: DescriptorId,
    ) -> Result<(), AudioOutError> {
        self.clock
            .program(arena.hw_mut(), self.frequency, false)?;
        let hw = arena.hw_mut();
        hw.counter_reset();
        hw.dac_enable().map_err(|_| AudioOutError::Hw)?;
        arena.start_dma(first).map_err(|_| AudioOutError::Hw)?;
        let hw = arena.hw_mut();
        hw.counter_set_enabled(true);
        hw.timer_set_enabled(true);
        hw.timer_wait_sync();
        Ok(())
    }

    fn unwind_failed_start<H: AudioHardware>(&mut self, arena: &mut AudioHardwareArena<H>) {
        arena.halt_playback();
        self.release_source(arena);
        arena.deactivate(self.session);
    }

    /// Stop playback immediately. The DMA job is aborted, not drained: any
    /// samples still buffered are discarded. Idempotent.
    pub fn stop<H: AudioHardware>(&mut self, arena: &mut AudioHardwareArena<H>) {
        if self.state == PlaybackState::Deinitialized {
            return;
        }
        if arena.is_active(self.session) {
            arena.halt_playback();
            arena.deactivate(self.session);
        }
        self.release_source(arena);
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Whether this session is still audibly playing.
    ///
    /// This is where a session converges with reality: a job that ran to
    /// completion, or one that another session superseded, is noticed here
    /// and the session's resources are released before `false` is returned.
    pub fn get_playing<H: AudioHardware>(&mut self, arena: &mut AudioHardwareArena<H>) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        if !arena.is_active(self.session) {
            // Superseded while we were not looking.
            self.release_source(arena);
            self.state = PlaybackState::Stopped;
            return false;
        }
        if arena.hw().dma_busy() {
            return true;
        }
        // The chain's final descriptor had no next-link and the channel
        // halted on its own.
        arena.halt_playback();
        self.release_source(arena);
        arena.deactivate(self.session);
        self.state = PlaybackState::Stopped;
        false
    }

    /// One cooperative maintenance tick: refill at most one consumed block.
    ///
    /// Safe to call at any time; does nothing unless this session is the
    /// active one, streaming from a file, with a block to reload. A storage
    /// failure stops playback (abort, not drain) before surfacing.
    ///
    /// # Errors
    ///
    /// [`AudioOutError::Io`] when the file refuses a seek or read.
    pub fn background_tick<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
    ) -> Result<Refill, AudioOutError> {
        if self.state != PlaybackState::Playing || !arena.is_active(self.session) {
            return Ok(Refill::Idle);
        }
        let counter = arena.hw().counter_value();
        let outcome = match &mut self.source {
            Source::Stream(stream) => stream
                .service(arena, counter)
                .map_err(|_| AudioOutError::Io),
            Source::Raw { .. } => return Ok(Refill::Idle),
        };
        if outcome.is_err() {
            self.stop(arena);
        }
        outcome
    }

    /// Change the sample rate, live if this session is currently playing.
    ///
    /// A live change keeps the timer running across a pure period rewrite;
    /// only a prescaler change pauses it, and then only for the rewrite.
    ///
    /// # Errors
    ///
    /// [`AudioOutError::Frequency`] when `frequency` is outside the
    /// supported range; the previous rate stays in effect.
    pub fn set_frequency<H: AudioHardware>(
        &mut self,
        arena: &mut AudioHardwareArena<H>,
        frequency: u32,
    ) -> Result<(), AudioOutError> {
        if self.state == PlaybackState::Deinitialized {
            return Err(AudioOutError::Deinitialized);
        }
        if self.state == PlaybackState::Playing && arena.is_active(self.session) {
            self.clock.program(arena.hw_mut(), frequency, true)?;
        } else {
            clock::solve(frequency)?;
        }
        self.frequency = frequency;
        Ok(())
    }

    /// The session's current sample rate in Hz.
    #[must_use]
    pub fn get_frequency(&self) -> u32 {
        self.frequency
    }

    /// Tear the session down: stop playback, return the pin and the
    /// refcount share. The session is unusable afterwards; repeated calls
    /// are no-ops.
    pub fn deinit<H: AudioHardware>(&mut self, arena: &mut AudioHardwareArena<H>) {
        if self.state == PlaybackState::Deinitialized {
            return;
        }
        self.stop(arena);
        arena.detach(self.session, self.pin);
        self.state = PlaybackState::Deinitialized;
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// The claimed output pin.
    #[must_use]
    pub fn pin(&self) -> PinId {
        self.pin
    }

    /// This session's arena handle.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// The file stream behind this session, when it has one.
    #[must_use]
    pub fn stream(&self) -> Option<&FileStream<F>> {
        match &self.source {
            Source::Stream(s) => Some(s),
            Source::Raw { .. } => None,
        }
    }

    fn release_source<H: AudioHardware>(&mut self, arena: &mut AudioHardwareArena<H>) {
        match &mut self.source {
            Source::Stream(stream) => stream.release(arena),
            Source::Raw { desc, .. } => {
                if let Some(id) = desc.take() {
                    arena.free_descriptor(id);
                }
            }
        }
    }
}
