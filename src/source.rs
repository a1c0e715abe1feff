//! # Resource sources
//!
//! The manager never touches storage directly. It asks a [`BlobSource`] for
//! the bytes of one document and a [`ManifestLister`] for the cultures a scope
//! provides. Three sources ship with the crate:
//!
//! - [`FsSource`]: documents below a root directory (`<root>/<dir>/<culture>/<file>`);
//! - [`EmbeddedSource`]: documents compiled in with [`rust_embed`];
//! - [`MemorySource`]: documents registered at runtime, addressed by manifest names.

use crate::culture::CultureName;
use crate::scope::{PathStyle, ResourceScope};
use parking_lot::RwLock;
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, ErrorKind, Read};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;
use walkdir::WalkDir;

/// An open document stream. Dropping it releases the underlying handle.
pub type Blob = Box<dyn Read + Send>;

/// Opens resource documents by path.
pub trait BlobSource: Send + Sync {
    /// Opens `path`, returning `Ok(None)` when it does not exist.
    fn try_open(&self, path: &str) -> io::Result<Option<Blob>>;

    /// Path notation understood by [`try_open`](Self::try_open).
    fn path_style(&self) -> PathStyle;
}

/// Lists the cultures available for a scope.
pub trait ManifestLister: Send + Sync {
    /// Cultures in manifest order, neutral sentinel excluded.
    fn list_cultures(&self, scope: &ResourceScope) -> io::Result<Vec<CultureName>>;
}

/// A source that can both list and open documents.
pub trait ResourceSource: BlobSource + ManifestLister {}

impl<T: BlobSource + ManifestLister> ResourceSource for T {}

/// Documents stored on disk below `root`.
#[derive(Debug, Clone)]
pub struct FsSource {
    root: PathBuf,
}

impl FsSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BlobSource for FsSource {
    fn try_open(&self, path: &str) -> io::Result<Option<Blob>> {
        let full = self.root.join(path);
        match File::open(&full) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("no resource at {}", full.display());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn path_style(&self) -> PathStyle {
        PathStyle::Directory
    }
}

impl ManifestLister for FsSource {
    fn list_cultures(&self, scope: &ResourceScope) -> io::Result<Vec<CultureName>> {
        let dir = self.root.join(scope.directory_path(PathStyle::Directory));
        if !dir.is_dir() {
            debug!("resource directory {} does not exist", dir.display());
            return Ok(Vec::new());
        }

        let mut cultures = Vec::new();
        for entry in WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry?;
            if !entry.file_type().is_dir() {
                continue;
            }
            if !entry.path().join(&scope.resource_filename).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                cultures.push(CultureName::new(name));
            }
        }
        Ok(cultures)
    }
}

/// Documents compiled into the binary.
///
/// ```rust,ignore
/// #[derive(rust_embed::RustEmbed)]
/// #[folder = "assets/"]
/// struct Assets;
///
/// let source = EmbeddedSource::<Assets>::new();
/// ```
pub struct EmbeddedSource<E: RustEmbed> {
    _assets: PhantomData<fn() -> E>,
}

impl<E: RustEmbed> EmbeddedSource<E> {
    pub fn new() -> Self {
        Self {
            _assets: PhantomData,
        }
    }
}

impl<E: RustEmbed> Default for EmbeddedSource<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: RustEmbed> BlobSource for EmbeddedSource<E> {
    fn try_open(&self, path: &str) -> io::Result<Option<Blob>> {
        Ok(E::get(path).map(|file| Box::new(Cursor::new(file.data.into_owned())) as Blob))
    }

    fn path_style(&self) -> PathStyle {
        PathStyle::Directory
    }
}

impl<E: RustEmbed> ManifestLister for EmbeddedSource<E> {
    fn list_cultures(&self, scope: &ResourceScope) -> io::Result<Vec<CultureName>> {
        let mut paths: Vec<_> = E::iter().collect();
        paths.sort();
        Ok(paths
            .iter()
            .filter_map(|p| scope.culture_from_path(p, PathStyle::Directory))
            .filter(|c| !c.is_neutral())
            .collect())
    }
}

/// Documents held in memory, addressed by manifest-style names.
#[derive(Debug)]
pub struct MemorySource {
    style: PathStyle,
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
    opens: AtomicUsize,
}

impl MemorySource {
    pub fn new(style: PathStyle) -> Self {
        Self {
            style,
            blobs: RwLock::new(BTreeMap::new()),
            opens: AtomicUsize::new(0),
        }
    }

    /// Adds (or replaces) a document.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.blobs.write().insert(path.into(), content.into());
    }

    pub fn with(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn remove(&self, path: &str) -> bool {
        self.blobs.write().remove(path).is_some()
    }

    /// Number of successful opens so far.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl Default for MemorySource {
    fn default() -> Self {
        Self::new(PathStyle::Manifest)
    }
}

impl BlobSource for MemorySource {
    fn try_open(&self, path: &str) -> io::Result<Option<Blob>> {
        let blob = self.blobs.read().get(path).cloned();
        Ok(blob.map(|bytes| {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Box::new(Cursor::new(bytes)) as Blob
        }))
    }

    fn path_style(&self) -> PathStyle {
        self.style
    }
}

impl ManifestLister for MemorySource {
    fn list_cultures(&self, scope: &ResourceScope) -> io::Result<Vec<CultureName>> {
        Ok(self
            .blobs
            .read()
            .keys()
            .filter_map(|p| scope.culture_from_path(p, self.style))
            .filter(|c| !c.is_neutral())
            .collect())
    }
}
