//! Master index parsing.
//!
//! The index is itself a chunked container. Its payload holds, in order:
//!
//! 1. the bundle table: `u32` count, then `{u32 name_length, name, u32 uncompressed_size}`
//! 2. the file table: `u32` count, then [`FileRecord`]s
//! 3. the path section table: `u32` count, then [`PathSection`]s
//! 4. a nested container holding the path catalog bytecode
//!
//! File records carry only a path hash. Paths are recovered by decoding the
//! catalog and hashing every string it yields.

use std::hash::BuildHasherDefault;
use std::sync::Arc;

use hashbrown::HashMap as FastHashMap;
use kalandra_common::hash::path_hash;
use kalandra_common::BinaryReader;
use rustc_hash::FxHasher;
use tracing::debug;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::decompress::Decompressor;
use crate::{catalog, container};
use crate::{Error, Result};

pub(crate) type FxHashMap<K, V> = FastHashMap<K, V, BuildHasherDefault<FxHasher>>;

/// A file record from the index's file table.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct FileRecord {
    /// Content hash of the file's path.
    pub path_hash: u64,
    /// Index into the bundle table.
    pub bundle_index: u32,
    /// Offset of the file inside the decompressed bundle.
    pub offset: u32,
    /// Size of the file in bytes.
    pub size: u32,
}

/// A path catalog section descriptor.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct PathSection {
    pub unknown0: u32,
    pub unknown1: u32,
    /// Offset of the section inside the decompressed catalog.
    pub payload_offset: u32,
    /// Size of the section in bytes.
    pub payload_size: u32,
    pub unknown2: u32,
}

/// A bundle listed in the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleInfo {
    /// Bundle name without the container file extension.
    pub name: String,
    /// Declared decompressed size of the bundle.
    pub uncompressed_size: u32,
}

/// A file entry with its resolved path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFile {
    pub path: Arc<str>,
    pub path_hash: u64,
    pub bundle_index: u32,
    pub offset: u32,
    pub size: u32,
}

/// The parsed master index.
#[derive(Debug)]
pub struct ArchiveIndex {
    bundles: Vec<BundleInfo>,
    files: Vec<IndexedFile>,
    sections: Vec<PathSection>,
    catalog: Vec<String>,
    by_path: FxHashMap<Arc<str>, usize>,
    by_hash: FxHashMap<u64, usize>,
}

impl ArchiveIndex {
    /// Parse the index from its raw (still compressed) container bytes.
    pub fn parse(index_container: &[u8], decompressor: &dyn Decompressor) -> Result<Self> {
        let payload = container::decode(index_container, decompressor)?;
        Self::parse_payload(&payload, decompressor)
    }

    /// Parse the index from its decompressed payload.
    ///
    /// The decompressor is still needed for the nested catalog container.
    pub fn parse_payload(payload: &[u8], decompressor: &dyn Decompressor) -> Result<Self> {
        let mut reader = BinaryReader::new(payload);

        let bundle_count = reader.read_u32()? as usize;
        let mut bundles = Vec::with_capacity(bundle_count.min(reader.remaining() / 8));
        for _ in 0..bundle_count {
            let name_length = reader.read_u32()? as usize;
            let name = reader.read_string(name_length)?.to_owned();
            let uncompressed_size = reader.read_u32()?;
            bundles.push(BundleInfo {
                name,
                uncompressed_size,
            });
        }

        let records: Vec<FileRecord> = read_table(&mut reader)?;
        let sections: Vec<PathSection> = read_table(&mut reader)?;

        let catalog_data = container::decode(reader.remaining_bytes(), decompressor)?;
        let catalog = catalog::decode_catalog(
            &catalog_data,
            sections
                .iter()
                .map(|s| (s.payload_offset as usize, s.payload_size as usize)),
        )?;

        let mut lookup: FxHashMap<u64, usize> = FxHashMap::default();
        for (i, path) in catalog.iter().enumerate() {
            lookup.entry(path_hash(path)).or_insert(i);
        }

        let mut files = Vec::with_capacity(records.len());
        let mut by_path = FxHashMap::default();
        let mut by_hash = FxHashMap::default();

        for (i, record) in records.iter().enumerate() {
            let record = *record;
            let (hash, bundle_index, offset, size) =
                (record.path_hash, record.bundle_index, record.offset, record.size);

            if bundle_index as usize >= bundles.len() {
                return Err(Error::BundleIndexOutOfRange {
                    file: i,
                    bundle_index,
                    bundle_count: bundles.len(),
                });
            }

            let path: Arc<str> = match lookup.get(&hash) {
                Some(&c) => Arc::from(catalog[c].as_str()),
                None => {
                    return Err(Error::MissingPath {
                        hash,
                        bundle_index,
                        offset,
                        size,
                    })
                }
            };

            by_path.insert(Arc::clone(&path), i);
            by_hash.insert(hash, i);
            files.push(IndexedFile {
                path,
                path_hash: hash,
                bundle_index,
                offset,
                size,
            });
        }

        debug!(
            bundles = bundles.len(),
            files = files.len(),
            sections = sections.len(),
            paths = catalog.len(),
            "parsed archive index"
        );

        Ok(Self {
            bundles,
            files,
            sections,
            catalog,
            by_path,
            by_hash,
        })
    }

    /// Bundles in index order.
    #[inline]
    pub fn bundles(&self) -> &[BundleInfo] {
        &self.bundles
    }

    /// Files in file-table order.
    #[inline]
    pub fn files(&self) -> &[IndexedFile] {
        &self.files
    }

    /// Path section descriptors.
    #[inline]
    pub fn sections(&self) -> &[PathSection] {
        &self.sections
    }

    /// Every path decoded from the catalog, including ones no file references.
    #[inline]
    pub fn catalog(&self) -> &[String] {
        &self.catalog
    }

    /// Position of a file in [`files`](Self::files) by exact path.
    #[inline]
    pub fn position(&self, path: &str) -> Option<usize> {
        self.by_path.get(path).copied()
    }

    /// Position of a file by path, ignoring case.
    #[inline]
    pub fn position_ignore_case(&self, path: &str) -> Option<usize> {
        self.by_hash.get(&path_hash(path)).copied()
    }

    /// Look up a file by exact path.
    pub fn get(&self, path: &str) -> Option<&IndexedFile> {
        self.position(path).map(|i| &self.files[i])
    }

    /// All files whose path satisfies `predicate`, in file-table order.
    pub fn find_file<F>(&self, mut predicate: F) -> Vec<&IndexedFile>
    where
        F: FnMut(&str) -> bool,
    {
        self.files.iter().filter(|f| predicate(&f.path)).collect()
    }
}

fn read_table<T: FromBytes>(reader: &mut BinaryReader<'_>) -> Result<Vec<T>> {
    let count = reader.read_u32()? as usize;
    let size = std::mem::size_of::<T>();
    reader.peek_bytes(count.saturating_mul(size))?;

    let mut items = Vec::with_capacity(count);
    for _ in 0..count {
        items.push(reader.read_struct()?);
    }
    Ok(items)
}
