//! Kalandra - game asset archive reader and schema-driven dat decoder.
//!
//! This crate ties the Kalandra crates together.
//!
//! # Crates
//!
//! - [`kalandra_common`] - Binary reading and the path content hash
//! - [`kalandra_bundle`] - Bundle containers, the master index and archive access
//! - [`kalandra_dat`] - Field types, schemas and the dat record decoder
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use kalandra::prelude::*;
//!
//! let archive = Archive::open("Bundles2", Arc::new(ZstdDecompressor))?;
//! let decoder = RecordDecoder::new();
//! let schemas = SchemaSet::from_json(&std::fs::read_to_string("schema.json")?, decoder.registry())?;
//!
//! if let Some(handle) = archive.find("Data/Mods.dat64") {
//!     let dat = kalandra::decode_dat(&archive, handle, &schemas, &decoder)?;
//!     for record in &dat.records {
//!         println!("{}", record.display("Id"));
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use kalandra_bundle::{Archive, FileHandle};
use kalandra_dat::{DatFile, RecordDecoder, SchemaSet};
use tracing::debug;

pub use kalandra_bundle as bundle;
pub use kalandra_common as common;
pub use kalandra_dat as dat;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use kalandra_bundle::{
        Archive, ArchiveConfig, Decompressor, DeflateDecompressor, FileHandle, ZstdDecompressor,
    };
    pub use kalandra_common::{hash::path_hash, BinaryReader};
    pub use kalandra_dat::{
        DatFile, FieldType, RawBytes, Record, RecordDecoder, RecordSchema, SchemaSet, TypeRegistry,
        Value,
    };
}

/// Errors from operations that span the archive and the dat decoder.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Bundle(#[from] kalandra_bundle::Error),

    #[error(transparent)]
    Dat(#[from] kalandra_dat::Error),

    /// No schema matches the file's name.
    #[error("no schema for '{0}'")]
    NoSchema(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Read a dat file from the archive and decode it with the schema named after it.
pub fn decode_dat(
    archive: &Archive,
    handle: &FileHandle,
    schemas: &SchemaSet,
    decoder: &RecordDecoder,
) -> Result<DatFile> {
    let schema = schemas
        .for_path(handle.path())
        .ok_or_else(|| Error::NoSchema(handle.path().to_string()))?;

    let data = archive.read(handle)?;
    debug!(path = handle.path(), bytes = data.len(), schema = schema.name(), "decoding dat");

    Ok(decoder.decode(&data, schema)?)
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
