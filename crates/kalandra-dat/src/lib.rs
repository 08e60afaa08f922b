//! Schema-driven decoder for dat record tables.
//!
//! A dat file is a table of fixed-size rows followed by a data section of
//! variable-length payloads. Rows hold scalars in place and pointers into
//! the data section for strings and lists. The row size is not stored; it is
//! recovered by scanning for a sentinel.
//!
//! Row layouts come from the caller as a [`RecordSchema`]: an ordered list
//! of field ids and type names such as `int`, `ref|string` or
//! `ref|list|ulong`. Type names are parsed once into [`FieldType`] trees and
//! cached in a [`TypeRegistry`].
//!
//! # Example
//!
//! ```no_run
//! use kalandra_dat::RecordDecoder;
//!
//! let decoder = RecordDecoder::new();
//! let schema = decoder.schema("Mods.dat64", [("Id", "ref|string"), ("Level", "int")])?;
//!
//! let data = std::fs::read("Mods.dat64")?;
//! for record in decoder.decode_records(&data, &schema)? {
//!     let id: String = record.get("Id")?;
//!     println!("{} {}", id, record.display("Level"));
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::hash::BuildHasherDefault;

use hashbrown::{HashMap as FastHashMap, HashSet as FastHashSet};
use rustc_hash::FxHasher;

mod decoder;
mod error;
mod record;
mod registry;
mod schema;
mod types;
mod value;

pub use decoder::{data_section_offset, find_stride, DatFile, RecordDecoder, MAGIC};
pub use error::{Error, Result};
pub use record::{Record, RecordField, REMAINDER_KEY};
pub use registry::TypeRegistry;
pub use schema::{FieldDefinition, RecordSchema, SchemaSet};
pub use types::{FieldType, PrimitiveKind, MAX_BYTE_ARRAY};
pub use value::{FromValue, RawBytes, Value, ValueKind};

pub(crate) type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxHashSet<K> = FastHashSet<K, BuildHasherDefault<FxHasher>>;
