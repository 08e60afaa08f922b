//! Error types for the bundle crate.

use thiserror::Error;

/// Errors that can occur when reading bundle containers and the archive index.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Common library error (out-of-bounds reads land here).
    #[error("{0}")]
    Common(#[from] kalandra_common::Error),

    /// The decompression primitive rejected a chunk.
    #[error("decompression error in chunk {chunk}: {message}")]
    Decompression { chunk: usize, message: String },

    /// The decompression primitive produced the wrong number of bytes.
    #[error("chunk {chunk} decompressed to {actual} bytes, expected {expected}")]
    SizeMismatch {
        chunk: usize,
        expected: usize,
        actual: usize,
    },

    /// The header's declared sizes do not describe a valid chunk layout.
    #[error("invalid chunk layout: {0}")]
    ChunkLayout(String),

    /// A file-table entry names a bundle that does not exist.
    #[error("file entry {file} references bundle {bundle_index} but only {bundle_count} bundles exist")]
    BundleIndexOutOfRange {
        file: usize,
        bundle_index: u32,
        bundle_count: usize,
    },

    /// A file-table hash has no matching path in the catalog.
    #[error("no catalog path for hash {hash:#018x} (bundle {bundle_index}, offset {offset}, size {size})")]
    MissingPath {
        hash: u64,
        bundle_index: u32,
        offset: u32,
        size: u32,
    },

    /// A file handle's byte range lies outside its container.
    #[error("file '{path}' spans {offset}..{end} but container '{container}' holds {len} bytes")]
    FileOutOfBounds {
        path: String,
        container: String,
        offset: usize,
        end: usize,
        len: usize,
    },

    /// A file handle was not issued by this archive.
    #[error("file '{0}' does not belong to this archive")]
    ForeignHandle(String),
}

impl Error {
    /// Whether this error reports a read or range past the end of a buffer.
    pub fn is_out_of_bounds(&self) -> bool {
        match self {
            Error::Common(e) => e.is_out_of_bounds(),
            Error::FileOutOfBounds { .. } => true,
            _ => false,
        }
    }
}

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, Error>;
