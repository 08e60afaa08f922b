//! Error types for dat decoding.

use thiserror::Error;

use crate::ValueKind;

/// Errors that can occur when decoding dat files or reading records.
#[derive(Debug, Error)]
pub enum Error {
    /// Common library error (out-of-bounds reads land here).
    #[error("{0}")]
    Common(#[from] kalandra_common::Error),

    /// The 8-byte sentinel after the row table is missing.
    #[error("missing sentinel at offset {offset}: found {found:#018x}")]
    MissingSentinel { offset: usize, found: u64 },

    /// No sentinel was found at any candidate stride.
    #[error("no row stride found for {row_count} rows in {len} bytes")]
    StrideNotFound { row_count: usize, len: usize },

    /// A UTF-16 string was not followed by its second zero unit.
    #[error("string ending at offset {offset} is not terminated")]
    UnterminatedString { offset: usize },

    /// A schema names a type this decoder does not know.
    #[error("unknown field type: '{0}'")]
    UnknownType(String),

    /// Declared fields consume more bytes than the row holds.
    #[error("row {row} overconsumed by {overrun} bytes at field {field_index} ('{field}')")]
    SchemaMismatch {
        row: usize,
        field_index: usize,
        field: String,
        overrun: usize,
    },

    /// A field was requested as the wrong kind of value.
    #[error("field '{field}' holds {actual}, requested {expected}")]
    TypeMismatch {
        field: String,
        expected: ValueKind,
        actual: ValueKind,
    },

    /// A record has no field with the requested id.
    #[error("field '{0}' not found")]
    FieldNotFound(String),

    /// A field failed to decode.
    #[error("row {row}, field '{field}': {source}")]
    Row {
        row: usize,
        field: String,
        source: Box<Error>,
    },

    /// Schema JSON could not be parsed.
    #[cfg(feature = "json")]
    #[error("schema JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// The innermost error, looking through row context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Row { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether the root cause is a read past the end of the buffer.
    pub fn is_out_of_bounds(&self) -> bool {
        matches!(self.root_cause(), Error::Common(e) if e.is_out_of_bounds())
    }
}

/// Result type for dat operations.
pub type Result<T> = std::result::Result<T, Error>;
