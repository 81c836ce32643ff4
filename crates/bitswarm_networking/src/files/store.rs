//! Local file storage consulted and updated by file sync.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::error::{NetError, NetResult};

/// Where a client keeps synced files, addressed by logical name.
pub trait FileStore {
    /// Content of `name`, or `None` if absent.
    ///
    /// # Errors
    ///
    /// Backend failures other than "not found".
    fn read(&self, name: &str) -> NetResult<Option<Vec<u8>>>;

    /// Creates or replaces `name`.
    ///
    /// # Errors
    ///
    /// Backend failures.
    fn write(&mut self, name: &str, bytes: &[u8]) -> NetResult<()>;

    /// Moves `from` to `to`, replacing `to` if present.
    ///
    /// # Errors
    ///
    /// Backend failures, including a missing `from`.
    fn rename(&mut self, from: &str, to: &str) -> NetResult<()>;

    /// Returns true if `name` exists.
    fn exists(&self, name: &str) -> bool;
}

/// In-process store.
#[derive(Debug, Default, Clone)]
pub struct MemoryFileStore {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FileStore for MemoryFileStore {
    fn read(&self, name: &str) -> NetResult<Option<Vec<u8>>> {
        Ok(self.files.get(name).cloned())
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> NetResult<()> {
        self.files.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> NetResult<()> {
        let bytes = self
            .files
            .remove(from)
            .ok_or_else(|| NetError::FileSync(format!("cannot rename missing file '{from}'")))?;
        self.files.insert(to.to_string(), bytes);
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }
}

/// Store rooted at a directory. Logical names are relative paths below it.
#[derive(Debug, Clone)]
pub struct DirectoryFileStore {
    root: PathBuf,
}

impl DirectoryFileStore {
    /// Uses `root`, creating it if needed.
    ///
    /// # Errors
    ///
    /// [`NetError::Io`] if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> NetResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Rejects names that would escape the root.
    fn resolve(&self, name: &str) -> NetResult<PathBuf> {
        let relative = Path::new(name);
        let safe = !name.is_empty() && relative.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(NetError::FileSync(format!("refusing file name '{name}'")));
        }
        Ok(self.root.join(relative))
    }
}

impl FileStore for DirectoryFileStore {
    fn read(&self, name: &str) -> NetResult<Option<Vec<u8>>> {
        match fs::read(self.resolve(name)?) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> NetResult<()> {
        let path = self.resolve(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        Ok(())
    }

    fn rename(&mut self, from: &str, to: &str) -> NetResult<()> {
        fs::rename(self.resolve(from)?, self.resolve(to)?)?;
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.resolve(name).is_ok_and(|p| p.is_file())
    }
}
