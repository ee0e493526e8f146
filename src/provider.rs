//! Byte providers: where raw asset bytes come from
//!
//! The manager calls exactly one [`ByteProvider`] per fetch, on a disk-role
//! thread. Providers never see payload types; they only report which scheme
//! the bytes belong to.

use ahash::AHashMap;
use parking_lot::RwLock;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{AssetError, Result};
use crate::id::AssetId;
use crate::scheme::Dependencies;

/// Raw bytes of one asset plus the metadata a header would carry
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawAsset {
    pub scheme: u32,
    pub data: Vec<u8>,
    /// Bytes must go through the scheme's decompressor first
    pub compressed: bool,
    /// Dependencies known before the payload is built
    pub dependencies: Dependencies,
    pub label: Option<String>,
}

impl RawAsset {
    pub fn new(scheme: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            scheme,
            data: data.into(),
            compressed: false,
            dependencies: Dependencies::new(),
            label: None,
        }
    }

    pub fn compressed(mut self) -> Self {
        self.compressed = true;
        self
    }

    pub fn with_dependencies(mut self, dependencies: impl IntoIterator<Item = AssetId>) -> Self {
        self.dependencies.extend(dependencies);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Source of raw asset bytes
pub trait ByteProvider: Send + Sync {
    /// Obtain the bytes for `id`; `AssetError::NotFound` when there are none
    fn fetch(&self, id: AssetId) -> Result<RawAsset>;

    /// Provider name for debugging
    fn name(&self) -> &str {
        "UnnamedProvider"
    }
}

impl<P: ByteProvider + ?Sized> ByteProvider for Arc<P> {
    fn fetch(&self, id: AssetId) -> Result<RawAsset> {
        (**self).fetch(id)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// In-memory provider, for embedded packs and tests
#[derive(Default)]
pub struct MemoryProvider {
    entries: RwLock<AHashMap<AssetId, Result<RawAsset>>>,
    fetches: AtomicUsize,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: AssetId, raw: RawAsset) {
        self.entries.write().insert(id, Ok(raw));
    }

    /// Make every fetch of `id` fail with `error`
    pub fn insert_failure(&self, id: AssetId, error: AssetError) {
        self.entries.write().insert(id, Err(error));
    }

    pub fn remove(&self, id: AssetId) -> bool {
        self.entries.write().remove(&id).is_some()
    }

    /// Number of fetches answered so far, found or not
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl ByteProvider for MemoryProvider {
    fn fetch(&self, id: AssetId) -> Result<RawAsset> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        match self.entries.read().get(&id) {
            Some(entry) => entry.clone(),
            None => Err(AssetError::NotFound(id)),
        }
    }

    fn name(&self) -> &str {
        "MemoryProvider"
    }
}

/// Reads assets from a directory tree.
///
/// An asset is addressed by its path relative to the root (forward slashes);
/// its id is [`AssetId::from_name`] of that path and its scheme is chosen by
/// file extension.
pub struct FileSystemProvider {
    root: PathBuf,
    extensions: AHashMap<String, u32>,
    index: RwLock<AHashMap<AssetId, PathBuf>>,
}

impl FileSystemProvider {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            extensions: AHashMap::new(),
            index: RwLock::new(AHashMap::new()),
        }
    }

    /// Route files with `extension` to `scheme`
    pub fn register_extension(&mut self, extension: &str, scheme: u32) {
        self.extensions
            .insert(extension.trim_start_matches('.').to_ascii_lowercase(), scheme);
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Index one relative path and return its id
    pub fn register_path(&self, relative: &str) -> AssetId {
        let name = normalize(relative);
        let id = AssetId::from_name(&name);
        self.index.write().insert(id, self.root.join(&name));
        id
    }

    /// Index every file under the root whose extension has a scheme.
    ///
    /// Returns the number of files indexed.
    pub fn scan(&self) -> Result<usize> {
        let mut found = Vec::new();
        self.collect(&self.root, &mut found)?;
        let count = found.len();
        let mut index = self.index.write();
        for name in found {
            index.insert(AssetId::from_name(&name), self.root.join(&name));
        }
        Ok(count)
    }

    /// Absolute path of an indexed asset
    pub fn path_of(&self, id: AssetId) -> Option<PathBuf> {
        self.index.read().get(&id).cloned()
    }

    /// Snapshot of every indexed id and its absolute path
    pub fn entries(&self) -> Vec<(AssetId, PathBuf)> {
        self.index
            .read()
            .iter()
            .map(|(id, path)| (*id, path.clone()))
            .collect()
    }

    pub fn indexed_count(&self) -> usize {
        self.index.read().len()
    }

    fn collect(&self, directory: &Path, found: &mut Vec<String>) -> Result<()> {
        for entry in fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_dir() {
                self.collect(&path, found)?;
            } else if self.scheme_for(&path).is_some() {
                if let Ok(relative) = path.strip_prefix(&self.root) {
                    let name = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    found.push(name);
                }
            }
        }
        Ok(())
    }

    fn scheme_for(&self, path: &Path) -> Option<u32> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extensions.get(&extension).copied()
    }
}

impl ByteProvider for FileSystemProvider {
    fn fetch(&self, id: AssetId) -> Result<RawAsset> {
        let path = self.path_of(id).ok_or(AssetError::NotFound(id))?;
        let scheme = self.scheme_for(&path).ok_or_else(|| {
            AssetError::Decode(format!("No scheme for file extension: {}", path.display()))
        })?;
        let data = fs::read(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AssetError::NotFound(id),
            _ => AssetError::Io(format!("Failed to read file {}: {e}", path.display())),
        })?;
        let label = path
            .strip_prefix(&self.root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        Ok(RawAsset::new(scheme, data).with_label(label))
    }

    fn name(&self) -> &str {
        "FileSystemProvider"
    }
}

/// Asks each provider in order; the first answer other than `NotFound` wins
#[derive(Default)]
pub struct FallbackProvider {
    providers: Vec<Arc<dyn ByteProvider>>,
}

impl FallbackProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn ByteProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ByteProvider for FallbackProvider {
    fn fetch(&self, id: AssetId) -> Result<RawAsset> {
        for provider in &self.providers {
            match provider.fetch(id) {
                Err(AssetError::NotFound(_)) => continue,
                other => return other,
            }
        }
        Err(AssetError::NotFound(id))
    }

    fn name(&self) -> &str {
        "FallbackProvider"
    }
}

fn normalize(relative: &str) -> String {
    relative
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}
