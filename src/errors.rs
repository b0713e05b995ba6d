//! Custom error types.

use thiserror::Error;

/// Errors raised while demultiplexing an MPEG-2 Program Stream.
///
/// Apart from [`DemuxError::WrongPrivateStream`], which is caught by the
/// recognizer loop in [`crate::private::recognize`], every error is fatal:
/// a malformed header aborts the parse with no resynchronization.
#[derive(Debug, Error)]
pub enum DemuxError {
    /// A field whose value is dictated by the standard does not match.
    #[error("invalid fixed bits in {0}")]
    InvalidFixedBits(&'static str),

    /// A marker bit required to be 1 was read as 0.
    #[error("invalid marker bit in {0}")]
    InvalidMarker(&'static str),

    /// The stream uses a layout this crate does not handle.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(&'static str),

    /// A non-zero byte was found while skipping padding before a start
    /// code in strict mode.
    #[error("malformed video stream: non-zero padding byte 0x{0:02X} before start code")]
    MalformedVideoStream(u8),

    /// A private-stream recognizer rejected the stream. Recoverable by
    /// trying another recognizer.
    #[error("not the expected kind of private stream")]
    WrongPrivateStream,

    /// A stream was requested by a name that maps to no stream id.
    #[error("unknown stream name '{0}'")]
    UnknownStream(String),

    /// A stream was requested by an id that never occurred in the file.
    #[error("stream id 0x{0:02X} is not present")]
    StreamNotPresent(u8),

    /// A bit read was requested with a width outside `1..=32`.
    #[error("bit reads must be between 1 and 32 bits, got {0}")]
    InvalidBitCount(u32),

    /// The underlying reader failed or ended early.
    #[error("read failed")]
    Io(#[from] std::io::Error),
}
