//! Error types for kalandra-common.

use thiserror::Error;

/// Errors from low-level buffer reads.
#[derive(Debug, Error)]
pub enum Error {
    /// A read or seek ran past the end of the buffer.
    #[error("unexpected end of buffer at offset {offset}: needed {needed} bytes but only {available} available")]
    UnexpectedEof {
        offset: usize,
        needed: usize,
        available: usize,
    },

    /// Text was not valid UTF-8.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// No zero byte between the offset and the end of the buffer.
    #[error("string at offset {0} has no null terminator")]
    MissingNullTerminator(usize),
}

impl Error {
    /// Whether this error reports a read past the end of a buffer.
    #[inline]
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self, Error::UnexpectedEof { .. })
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
