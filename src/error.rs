//! Error types for the zdeflate library.

use thiserror::Error;

/// Result type alias for zdeflate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compressing.
///
/// Every variant describes misuse of the streaming protocol or a broken
/// internal invariant; none of them are retryable.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was supplied after `finish()` was requested.
    #[error("deflater already finished")]
    AlreadyFinished,
    /// The deflater was closed and can no longer be used.
    #[error("deflater already closed")]
    AlreadyClosed,
    /// `set_input` was called while previous input is still unconsumed.
    #[error("previous input was not processed")]
    NotProcessed,
    /// An argument was out of range (level, buffer offset/count, buffer size).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    /// The compression function id is not stored, fast, or slow.
    #[error("unknown compression function {0}")]
    UnknownCompressionFunction(u8),
    /// Huffman tree construction ended with an inconsistent heap.
    #[error("huffman heap invariant violated")]
    HuffmanHeapInvariantViolated,
    /// The deflater stalled before all pending output could be drained.
    #[error("deflater could not flush all pending output")]
    IncompleteFlush,
    /// The underlying sink failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(inner) => inner,
            other => std::io::Error::new(std::io::ErrorKind::Other, other),
        }
    }
}
