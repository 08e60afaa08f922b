//! Bundle archive reader.
//!
//! Game assets are packed into *bundles*: chunk-compressed containers that
//! each hold many files back to back. A master index container lists the
//! bundles, the byte range of every file, and a compact catalog of path
//! strings. This crate reads all three:
//!
//! - [`container`] - container framing and chunk reassembly
//! - [`catalog`] - the prefix-sharing path catalog bytecode
//! - [`ArchiveIndex`] - the master index with paths resolved by hash
//! - [`Archive`] - on-disk access with lazily decompressed, shared containers
//!
//! The chunk codec is supplied by the caller through [`Decompressor`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kalandra_bundle::{Archive, ZstdDecompressor};
//!
//! let archive = Archive::open("Bundles2", Arc::new(ZstdDecompressor))?;
//!
//! for handle in archive.find_file(|p| p.ends_with(".datc64")) {
//!     let bytes = archive.read(handle)?;
//!     println!("{}: {} bytes", handle.path(), bytes.len());
//! }
//! # Ok::<(), kalandra_bundle::Error>(())
//! ```

mod archive;
mod decompress;
mod error;
mod index;

pub mod catalog;
pub mod container;

pub use archive::{Archive, ArchiveConfig, Container, FileHandle};
pub use container::{ChunkEncoding, ContainerHeader, CHUNK_SIZE};
pub use decompress::{DeflateDecompressor, Decompressor, ZstdDecompressor};
pub use error::{Error, Result};
pub use index::{ArchiveIndex, BundleInfo, FileRecord, IndexedFile, PathSection};
