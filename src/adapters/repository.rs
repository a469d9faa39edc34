//! Modifications loaded from a directory tree.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::models::modification::Modification;
use crate::services::ModificationRepository;
use crate::{AppError, Result};

/// Treats every visible sub-directory of a root directory as one
/// modification named after the directory.
///
/// Handles are cached by path, so repeated enumerations return the same
/// units for directories that did not go away.
#[derive(Debug)]
pub struct DirectoryModificationRepository {
    root: PathBuf,
    loaded: Mutex<HashMap<PathBuf, Modification>>,
}

impl DirectoryModificationRepository {
    /// Repository over `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            loaded: Mutex::new(HashMap::new()),
        }
    }

    /// Directory scanned for modifications.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl ModificationRepository for DirectoryModificationRepository {
    fn enumerate_modifications(&self) -> Result<Vec<Modification>> {
        let entries = fs::read_dir(&self.root).map_err(|err| {
            AppError::Repository(format!("cannot list {}: {err}", self.root.display()))
        })?;

        let mut directories = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| {
                AppError::Repository(format!("cannot read entry in {}: {err}", self.root.display()))
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            if entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                directories.push((name, entry.path()));
            }
        }
        directories.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
        loaded.retain(|path, _| directories.iter().any(|(_, dir)| dir == path));
        let modifications: Vec<Modification> = directories
            .into_iter()
            .map(|(name, path)| {
                loaded
                    .entry(path.clone())
                    .or_insert_with(|| Modification::new(name, path))
                    .clone()
            })
            .collect();

        debug!(root = %self.root.display(), count = modifications.len(), "modifications enumerated");
        Ok(modifications)
    }
}
