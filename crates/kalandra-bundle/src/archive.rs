//! Archive access.
//!
//! An [`Archive`] is opened from a directory holding the master index and the
//! bundle containers it names. Containers decompress lazily, at most once
//! each, the first time one of their files is read.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use memmap2::Mmap;
use parking_lot::Mutex;
use tracing::debug;

use crate::container;
use crate::decompress::Decompressor;
use crate::index::ArchiveIndex;
use crate::{Error, Result};

/// File names used to locate the index and bundles under an archive root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// File name of the master index, relative to the root.
    pub index_file_name: String,
    /// Suffix appended to bundle names to form container file names.
    pub bundle_extension: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            index_file_name: "_.index.bin".to_string(),
            bundle_extension: ".bundle.bin".to_string(),
        }
    }
}

/// One compressed bundle file with a lazily populated payload cache.
#[derive(Debug)]
pub struct Container {
    name: String,
    path: PathBuf,
    declared_size: u32,
    data: OnceLock<Arc<[u8]>>,
    init: Mutex<()>,
}

impl Container {
    fn new(name: String, path: PathBuf, declared_size: u32) -> Self {
        Self {
            name,
            path,
            declared_size,
            data: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Bundle name as listed in the index.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the container file on disk.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decompressed size declared by the index.
    #[inline]
    pub fn declared_size(&self) -> u32 {
        self.declared_size
    }

    /// Whether the payload has been decompressed.
    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.data.get().is_some()
    }

    /// The decompressed payload, decompressing it on first use.
    ///
    /// Concurrent first calls decompress once; every caller sees the same buffer.
    pub fn data(&self, decompressor: &dyn Decompressor) -> Result<Arc<[u8]>> {
        if let Some(data) = self.data.get() {
            return Ok(Arc::clone(data));
        }

        let _guard = self.init.lock();
        if let Some(data) = self.data.get() {
            return Ok(Arc::clone(data));
        }

        let file = File::open(&self.path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let payload: Arc<[u8]> = container::decode(&mmap, decompressor)?.into();

        debug!(container = %self.name, bytes = payload.len(), "container loaded");
        Ok(Arc::clone(self.data.get_or_init(|| payload)))
    }
}

/// A file inside the archive.
///
/// Refers to its container by position; it does not own any data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileHandle {
    path: Arc<str>,
    container: usize,
    offset: u32,
    size: u32,
}

impl FileHandle {
    /// Full path of the file, including directory and extension.
    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Position of the owning container in [`Archive::containers`].
    #[inline]
    pub fn container_index(&self) -> usize {
        self.container
    }

    /// Byte offset inside the decompressed container.
    #[inline]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Size of the file in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// File name component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A bundle archive opened from disk.
pub struct Archive {
    root: PathBuf,
    decompressor: Arc<dyn Decompressor>,
    index: ArchiveIndex,
    containers: Vec<Container>,
    files: Vec<FileHandle>,
}

impl std::fmt::Debug for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("root", &self.root)
            .field("containers", &self.containers.len())
            .field("files", &self.files.len())
            .finish()
    }
}

impl Archive {
    /// Open the archive under `root` with the default file names.
    pub fn open<P: AsRef<Path>>(root: P, decompressor: Arc<dyn Decompressor>) -> Result<Self> {
        Self::open_with_config(root, decompressor, &ArchiveConfig::default())
    }

    /// Open the archive under `root`.
    ///
    /// The whole index must parse; there is no partially opened archive.
    pub fn open_with_config<P: AsRef<Path>>(
        root: P,
        decompressor: Arc<dyn Decompressor>,
        config: &ArchiveConfig,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let file = File::open(root.join(&config.index_file_name))?;
        let mmap = unsafe { Mmap::map(&file)? };

        let index = ArchiveIndex::parse(&mmap, decompressor.as_ref())?;
        Ok(Self::from_index(root, index, decompressor, config))
    }

    /// Build an archive around an already parsed index.
    pub fn from_index(
        root: PathBuf,
        index: ArchiveIndex,
        decompressor: Arc<dyn Decompressor>,
        config: &ArchiveConfig,
    ) -> Self {
        let containers: Vec<Container> = index
            .bundles()
            .iter()
            .map(|b| {
                let path = root.join(format!("{}{}", b.name, config.bundle_extension));
                Container::new(b.name.clone(), path, b.uncompressed_size)
            })
            .collect();

        let files: Vec<FileHandle> = index
            .files()
            .iter()
            .map(|f| FileHandle {
                path: Arc::clone(&f.path),
                container: f.bundle_index as usize,
                offset: f.offset,
                size: f.size,
            })
            .collect();

        debug!(
            root = %root.display(),
            containers = containers.len(),
            files = files.len(),
            "archive opened"
        );

        Self {
            root,
            decompressor,
            index,
            containers,
            files,
        }
    }

    /// Archive root directory.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The parsed master index.
    #[inline]
    pub fn index(&self) -> &ArchiveIndex {
        &self.index
    }

    /// Containers in bundle-table order.
    #[inline]
    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    /// Number of files.
    #[inline]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Iterate over every file in file-table order.
    #[inline]
    pub fn files(&self) -> impl Iterator<Item = &FileHandle> + '_ {
        self.files.iter()
    }

    /// Look up a file by exact path.
    pub fn get(&self, path: &str) -> Option<&FileHandle> {
        self.index.position(path).map(|i| &self.files[i])
    }

    /// Look up a file by path, ignoring case.
    pub fn find(&self, path: &str) -> Option<&FileHandle> {
        self.index.position_ignore_case(path).map(|i| &self.files[i])
    }

    /// All files whose path satisfies `predicate`, in file-table order.
    pub fn find_file<F>(&self, mut predicate: F) -> Vec<&FileHandle>
    where
        F: FnMut(&str) -> bool,
    {
        self.files.iter().filter(|f| predicate(&f.path)).collect()
    }

    /// The container a file lives in.
    pub fn container(&self, handle: &FileHandle) -> Result<&Container> {
        self.containers
            .get(handle.container)
            .ok_or_else(|| Error::ForeignHandle(handle.path.to_string()))
    }

    /// Read a file's bytes, decompressing its container if needed.
    pub fn read(&self, handle: &FileHandle) -> Result<Vec<u8>> {
        let container = self.container(handle)?;
        let data = container.data(self.decompressor.as_ref())?;

        let offset = handle.offset as usize;
        let end = offset + handle.size as usize;
        if end > data.len() {
            return Err(Error::FileOutOfBounds {
                path: handle.path.to_string(),
                container: container.name.clone(),
                offset,
                end,
                len: data.len(),
            });
        }

        Ok(data[offset..end].to_vec())
    }

    /// Read several files in parallel.
    #[cfg(feature = "parallel")]
    pub fn read_many(&self, handles: &[&FileHandle]) -> Vec<Result<Vec<u8>>> {
        use rayon::prelude::*;

        handles.par_iter().map(|h| self.read(h)).collect()
    }
}
