//! Storage abstraction for sample files.
//!
//! The playback engine reads WAV data through this synchronous [`File`]
//! trait. It is deliberately *not* async: the background refill runs from a
//! cooperative maintenance tick that must never block or re-enter the
//! scheduler, so every read is a bounded, already-buffered filesystem
//! operation from the engine's point of view.

/// Read / seek access to an open file.
pub trait File {
    /// Error type.
    type Error: core::fmt::Debug;

    /// Read from the current position into `buf`, returning the number of
    /// bytes actually read. Short reads are legal (end of file, partial
    /// cluster).
    ///
    /// # Errors
    ///
    /// Media-level read failures.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Seek to an absolute byte offset, returning the resulting position.
    ///
    /// # Errors
    ///
    /// Media-level seek failures.
    fn seek(&mut self, pos: u64) -> Result<u64, Self::Error>;

    /// Total file size in bytes.
    fn size(&self) -> u64;
}

/// Uninhabited [`File`] for sessions that never touch storage.
///
/// Raw-buffer playback (`AudioOut::from_buffer`) needs no file, but the
/// session type is generic over one; `NoStorage` fills the parameter with a
/// type that provably cannot be constructed or read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoStorage {}

impl File for NoStorage {
    type Error = core::convert::Infallible;

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Self::Error> {
        match *self {}
    }

    fn seek(&mut self, _pos: u64) -> Result<u64, Self::Error> {
        match *self {}
    }

    fn size(&self) -> u64 {
        match *self {}
    }
}
