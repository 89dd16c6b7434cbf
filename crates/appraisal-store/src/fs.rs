//! Directory-backed store.
use crate::{Store, StoreError};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DEFAULT_ROOT: &str = "ContinousFeedback/details";

#[derive(Debug, Clone)]
pub struct YamlStore {
    root: PathBuf,
}

impl YamlStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }
}

impl Default for YamlStore {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}

impl Store for YamlStore {
    fn read_file(&self, file_name: &str) -> Result<String, StoreError> {
        let path = self.path_of(file_name);
        debug!(path = %path.display(), "reading");
        std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                StoreError::NotFound(path.display().to_string())
            } else {
                StoreError::Io {
                    path: path.display().to_string(),
                    source,
                }
            }
        })
    }

    /// Writes through a sibling temp file and renames it into place, so the
    /// form filler never reads a half-written file.
    fn write_file(&self, file_name: &str, contents: &str) -> Result<(), StoreError> {
        let path = self.path_of(file_name);
        let io_err = |source| StoreError::Io {
            path: path.display().to_string(),
            source,
        };

        std::fs::create_dir_all(&self.root).map_err(io_err)?;
        let staging = self.path_of(&format!(".{}.tmp", file_name));
        std::fs::write(&staging, contents).map_err(io_err)?;
        if let Err(source) = std::fs::rename(&staging, &path) {
            let _ = std::fs::remove_file(&staging);
            return Err(io_err(source));
        }

        debug!(path = %path.display(), bytes = contents.len(), "written");
        Ok(())
    }

    fn exists(&self, file_name: &str) -> bool {
        self.path_of(file_name).is_file()
    }
}
