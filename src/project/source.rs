//! Fetching the bytes behind a layer's source reference.
//!
//! Loading is asynchronous so that a host can back it with network requests;
//! the loaders shipped here read from a local asset directory or from memory.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use futures::channel::oneshot;

use crate::error::SourceError;

/// Resolves a source reference (catalog `src`) to encoded image bytes.
#[async_trait]
pub trait SourceLoader: Send + Sync {
    async fn load(&self, reference: &str) -> Result<Vec<u8>, SourceError>;
}

#[async_trait]
impl<L: SourceLoader + ?Sized> SourceLoader for &L {
    async fn load(&self, reference: &str) -> Result<Vec<u8>, SourceError> {
        (**self).load(reference).await
    }
}

// ============================================================================
// DirectorySourceLoader
// ============================================================================

/// Reads references as paths relative to an asset root.
///
/// Absolute paths and references that climb out of the root with `..` are
/// rejected. Each read runs on its own thread and the returned future waits
/// on it, so loads joined together overlap and never block the executor.
#[derive(Debug, Clone)]
pub struct DirectorySourceLoader {
    root: PathBuf,
}

impl DirectorySourceLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, reference: &str) -> Result<PathBuf, SourceError> {
        let relative = Path::new(reference);
        for component in relative.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                Component::ParentDir => {
                    return Err(SourceError::Rejected {
                        reference: reference.to_string(),
                        reason: "parent directory references are not allowed",
                    });
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(SourceError::Rejected {
                        reference: reference.to_string(),
                        reason: "absolute paths are not allowed",
                    });
                }
            }
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SourceLoader for DirectorySourceLoader {
    async fn load(&self, reference: &str) -> Result<Vec<u8>, SourceError> {
        let path = self.resolve(reference)?;
        let io_error = |source: std::io::Error| SourceError::Io {
            reference: reference.to_string(),
            source,
        };

        let (tx, rx) = oneshot::channel();
        std::thread::Builder::new()
            .name("skinforge-read".into())
            .spawn(move || {
                // The receiver is gone only if the load was dropped.
                let _ = tx.send(std::fs::read(&path));
            })
            .map_err(io_error)?;

        let read = rx
            .await
            .map_err(|_| io_error(std::io::Error::other("reader thread exited early")))?;
        read.map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(reference.to_string()),
            _ => io_error(source),
        })
    }
}

// ============================================================================
// MemorySourceLoader
// ============================================================================

/// Serves references from an in-memory map.
#[derive(Debug, Clone, Default)]
pub struct MemorySourceLoader {
    assets: HashMap<String, Vec<u8>>,
}

impl MemorySourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an asset under `reference`.
    pub fn with_asset(mut self, reference: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(reference, bytes);
        self
    }

    pub fn insert(&mut self, reference: impl Into<String>, bytes: Vec<u8>) {
        self.assets.insert(reference.into(), bytes);
    }
}

#[async_trait]
impl SourceLoader for MemorySourceLoader {
    async fn load(&self, reference: &str) -> Result<Vec<u8>, SourceError> {
        self.assets
            .get(reference)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn memory_loader_serves_known_assets() {
        let loader = MemorySourceLoader::new().with_asset("a.png", vec![1, 2, 3]);
        assert_eq!(block_on(loader.load("a.png")).unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            block_on(loader.load("b.png")),
            Err(SourceError::NotFound(r)) if r == "b.png"
        ));
    }

    #[test]
    fn directory_loader_reads_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("skins")).unwrap();
        std::fs::write(dir.path().join("skins/steve.png"), b"png").unwrap();

        let loader = DirectorySourceLoader::new(dir.path());
        assert_eq!(block_on(loader.load("skins/steve.png")).unwrap(), b"png");
        assert!(matches!(
            block_on(loader.load("skins/alex.png")),
            Err(SourceError::NotFound(_))
        ));
    }

    // `slow.png` is a FIFO whose writer only opens after `fast.png` has been
    // delivered, so this completes only if a pending read leaves the executor
    // free to drive the other load.
    #[cfg(unix)]
    #[test]
    fn directory_loads_overlap() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fast.png"), b"fast").unwrap();
        let fifo = dir.path().join("slow.png");
        let status = std::process::Command::new("mkfifo").arg(&fifo).status().unwrap();
        assert!(status.success());

        let loader = DirectorySourceLoader::new(dir.path());
        let (slow, fast) = block_on(async {
            let slow = loader.load("slow.png");
            let fast = async {
                let bytes = loader.load("fast.png").await;
                std::fs::write(&fifo, b"slow").unwrap();
                bytes
            };
            futures::join!(slow, fast)
        });

        assert_eq!(fast.unwrap(), b"fast");
        assert_eq!(slow.unwrap(), b"slow");
    }

    #[test]
    fn directory_loader_rejects_escapes() {
        let loader = DirectorySourceLoader::new("/srv/assets");
        assert!(matches!(
            block_on(loader.load("../secret.png")),
            Err(SourceError::Rejected { .. })
        ));
        assert!(matches!(
            block_on(loader.load("/etc/passwd")),
            Err(SourceError::Rejected { .. })
        ));
    }

    #[test]
    fn borrowed_loader_delegates() {
        let loader = MemorySourceLoader::new().with_asset("x", vec![9]);
        let borrowed = &loader;
        assert_eq!(block_on(SourceLoader::load(&borrowed, "x")).unwrap(), vec![9]);
    }
}
