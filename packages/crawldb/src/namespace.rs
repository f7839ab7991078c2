//! The I/O boundary: a replicated, byte-addressable namespace.
//!
//! Paths are `/`-separated and relative to the namespace root. Publishing is
//! atomic: readers either see the complete blob or nothing. Blocking waits
//! poll `exists` at the configured interval.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::config::PollConfig;
use crate::error::{Result, StoreError};
use crate::table::TableBytes;

const TEMP_MARKER: &str = ".tmp-";

pub trait Namespace: Send + Sync {
    fn exists(&self, path: &str) -> Result<bool>;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Atomically make `bytes` visible at `path`, replacing any old blob.
    fn publish(&self, path: &str, bytes: &[u8]) -> Result<()>;

    fn delete(&self, path: &str) -> Result<()>;

    /// Paths of the direct children of `prefix`, sorted. Empty when the
    /// prefix does not exist.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Bytes of a table file. Implementations backed by local files map it.
    fn open_table_bytes(&self, path: &str) -> Result<TableBytes> {
        Ok(TableBytes::Owned(self.read(path)?))
    }

    /// Block until `path` exists, or until the configured deadline passes.
    fn wait_for(&self, path: &str, poll: &PollConfig) -> Result<()> {
        let started = Instant::now();
        let mut rounds = 0u64;
        loop {
            if self.exists(path)? {
                if rounds > 0 {
                    tracing::debug!(path, rounds, "wait_for: path appeared");
                }
                return Ok(());
            }
            if let Some(deadline) = poll.deadline() {
                if started.elapsed() >= deadline {
                    let waited_ms = started.elapsed().as_millis() as u64;
                    tracing::warn!(path, waited_ms, "wait_for: deadline expired");
                    return Err(StoreError::Timeout {
                        path: path.to_string(),
                        waited_ms,
                    });
                }
            }
            rounds += 1;
            std::thread::sleep(poll.interval());
        }
    }

    /// Existence-blocking read.
    fn get(&self, path: &str, poll: &PollConfig) -> Result<Vec<u8>> {
        self.wait_for(path, poll)?;
        self.read(path)
    }
}

/// Namespace rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalNamespace {
    root: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl LocalNamespace {
    /// Use `root` as the namespace root, creating it if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path for a namespace path. Rejects absolute paths and
    /// `..` components.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        for component in rel.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(StoreError::InvalidFormat(format!(
                        "namespace path escapes root: {}",
                        path
                    )))
                }
            }
        }
        Ok(self.root.join(rel))
    }
}

impl Namespace for LocalNamespace {
    fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.resolve(path)?.exists())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        Ok(fs::read(self.resolve(path)?)?)
    }

    fn publish(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let target = self.resolve(path)?;
        let parent = target
            .parent()
            .ok_or_else(|| StoreError::InvalidFormat(format!("cannot publish at {}", path)))?;
        fs::create_dir_all(parent)?;

        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| StoreError::InvalidFormat(format!("cannot publish at {}", path)))?;
        let temp = parent.join(format!(
            "{}{}{}-{}",
            file_name,
            TEMP_MARKER,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        if let Err(e) = fs::rename(&temp, &target) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        tracing::debug!(path, bytes = bytes.len(), "published");
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        fs::remove_file(self.resolve(path)?)?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.resolve(prefix)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut children = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.contains(TEMP_MARKER) {
                continue;
            }
            let prefix = prefix.trim_end_matches('/');
            children.push(if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", prefix, name)
            });
        }
        children.sort();
        Ok(children)
    }

    fn open_table_bytes(&self, path: &str) -> Result<TableBytes> {
        TableBytes::map(&self.resolve(path)?)
    }
}
