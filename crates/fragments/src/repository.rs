//! Locates fragment packs across a list of search roots.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::manifest::MANIFEST_FILE;
use crate::pack::{FragmentPack, PackError};

#[derive(Debug, Clone, Default)]
pub struct FragmentRepository {
    roots: Vec<PathBuf>,
}

impl FragmentRepository {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Loads the pack at `path`. Absolute or existing paths are used as
    /// given; anything else is tried under each root in order.
    pub fn resolve(&self, path: &Path) -> Result<FragmentPack, PackError> {
        if path.as_os_str().is_empty() {
            return Err(PackError::Path("pack path must not be empty".to_string()));
        }

        debug!(requested = %path.display(), roots = ?self.roots, "resolving fragment pack");
        let candidates = if path.is_absolute() || path.exists() {
            vec![path.to_path_buf()]
        } else {
            self.roots.iter().map(|root| root.join(path)).collect()
        };

        for candidate in candidates {
            debug!(candidate = %candidate.display(), "checking fragment pack candidate");
            if candidate.is_dir() {
                return FragmentPack::load(&candidate).inspect_err(|err| {
                    warn!(path = %candidate.display(), error = %err, "failed to load fragment pack");
                });
            }
        }

        warn!(requested = %path.display(), roots = ?self.roots, "fragment pack missing");
        Err(PackError::NotFound {
            requested: path.to_path_buf(),
            roots: self.roots.clone(),
        })
    }

    /// Loads every pack found directly below the roots. Broken packs are
    /// logged and skipped.
    pub fn discover(&self) -> Vec<FragmentPack> {
        let mut packs = Vec::new();
        for root in &self.roots {
            let entries = match fs::read_dir(root) {
                Ok(entries) => entries,
                Err(err) => {
                    debug!(root = %root.display(), error = %err, "skipping unreadable pack root");
                    continue;
                }
            };
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .map(|entry| entry.path())
                .filter(|path| path.join(MANIFEST_FILE).is_file())
                .collect();
            dirs.sort();
            for dir in dirs {
                match FragmentPack::load(&dir) {
                    Ok(pack) => packs.push(pack),
                    Err(err) => {
                        warn!(path = %dir.display(), error = %err, "skipping broken fragment pack");
                    }
                }
            }
        }
        packs
    }
}
