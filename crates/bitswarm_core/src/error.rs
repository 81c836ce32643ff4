//! # Codec Errors
//!
//! Failures reported by the guarded read paths of the bit codec.
//!
//! Unguarded reads treat an overrun as a programming fault and panic;
//! every `try_*` read reports one of these instead.

use thiserror::Error;

/// Errors produced while decoding a bit buffer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A read asked for more bits than the buffer holds.
    #[error("Read past end of buffer: requested {requested} bits, {remaining} remaining")]
    ReadPastEnd {
        /// Bits requested by the read.
        requested: usize,
        /// Bits left before the declared length.
        remaining: usize,
    },

    /// A variable-length integer ran past ten bytes.
    #[error("Variable-length integer exceeds 64 bits")]
    VarIntOverflow,

    /// String bytes were not valid UTF-8.
    #[error("String payload is not valid UTF-8")]
    InvalidUtf8,

    /// The 3-bit padding header does not fit the frame.
    #[error("Invalid frame header: {len} bytes with {padding} padding bits")]
    InvalidFrameHeader {
        /// Frame length in bytes.
        len: usize,
        /// Padding count read from the header.
        padding: u8,
    },

    /// A ranged read decoded a value outside its declared bounds.
    #[error("Ranged value {value} outside [{min}, {max}]")]
    OutOfRange {
        /// Decoded value.
        value: i64,
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;
