//! In-memory filesystem backed by a sorted map.
//!
//! Used by tests and by embedded-filesystem recursion, where an extractor
//! mounts archive contents it has already decoded.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};
use std::path::PathBuf;

use ambit_util::paths;

use crate::{not_a_dir, not_found, DirEntry, FileKind, FileSystem, Metadata};

/// A virtual tree built from `(path, bytes)` pairs.
///
/// Parent directories are implied by file paths; empty directories can be
/// added explicitly. There is no host root.
#[derive(Default)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    temp_paths: Vec<PathBuf>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, creating implied parent directories.
    pub fn add_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        let norm = paths::normalize(path);
        for anc in paths::ancestors(&norm) {
            self.dirs.insert(anc);
        }
        self.files.insert(norm, contents.into());
        self
    }

    /// Add an (empty) directory.
    pub fn add_dir(mut self, path: &str) -> Self {
        let norm = paths::normalize(path);
        for anc in paths::ancestors(&norm) {
            self.dirs.insert(anc);
        }
        self.dirs.insert(norm);
        self
    }

    /// Record host paths to be reported via [`FileSystem::temp_paths`].
    pub fn with_temp_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.temp_paths = paths;
        self
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "." || self.dirs.contains(path)
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str) -> std::io::Result<Box<dyn Read + '_>> {
        let norm = paths::normalize(path);
        match self.files.get(&norm) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(not_found(&norm)),
        }
    }

    fn read_dir(&self, path: &str) -> std::io::Result<Vec<DirEntry>> {
        let norm = paths::normalize(path);
        if !self.is_dir(&norm) {
            return Err(if self.files.contains_key(&norm) {
                not_a_dir(&norm)
            } else {
                not_found(&norm)
            });
        }

        let mut names: BTreeMap<String, FileKind> = BTreeMap::new();
        let prefix = if norm == "." {
            String::new()
        } else {
            format!("{norm}/")
        };
        for file in self.files.keys() {
            if let Some(rest) = file.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    names.insert(rest.to_string(), FileKind::File);
                }
            }
        }
        for dir in &self.dirs {
            if let Some(rest) = dir.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    names.insert(rest.to_string(), FileKind::Dir);
                }
            }
        }

        Ok(names
            .into_iter()
            .map(|(name, kind)| DirEntry { name, kind })
            .collect())
    }

    fn metadata(&self, path: &str) -> std::io::Result<Metadata> {
        let norm = paths::normalize(path);
        if let Some(bytes) = self.files.get(&norm) {
            return Ok(Metadata {
                kind: FileKind::File,
                len: bytes.len() as u64,
            });
        }
        if self.is_dir(&norm) {
            return Ok(Metadata {
                kind: FileKind::Dir,
                len: 0,
            });
        }
        Err(not_found(&norm))
    }

    fn temp_paths(&self) -> Vec<PathBuf> {
        self.temp_paths.clone()
    }
}
