//! Host filesystem rooted at a directory.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::{DirEntry, FileKind, FileSystem, Metadata};

/// A read-only view of the host filesystem rooted at an absolute directory.
///
/// Scan-relative forward-slash paths are resolved against the root; `.`
/// maps to the root itself. Stat uses `symlink_metadata` so symlinks are
/// reported as such rather than followed.
pub struct RealFs {
    root: PathBuf,
}

impl RealFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a scan-relative path onto the host.
    fn resolve(&self, path: &str) -> PathBuf {
        let norm = ambit_util::paths::normalize(path);
        if norm == "." {
            self.root.clone()
        } else {
            let mut p = self.root.clone();
            for part in norm.split('/') {
                p.push(part);
            }
            p
        }
    }
}

fn kind_of(meta: &std::fs::Metadata) -> FileKind {
    if meta.is_symlink() {
        FileKind::Symlink
    } else if meta.is_dir() {
        FileKind::Dir
    } else {
        FileKind::File
    }
}

impl FileSystem for RealFs {
    fn open(&self, path: &str) -> std::io::Result<Box<dyn Read + '_>> {
        let file = File::open(self.resolve(path))?;
        Ok(Box::new(file))
    }

    fn read_dir(&self, path: &str) -> std::io::Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.resolve(path))? {
            let entry = entry?;
            let meta = entry.path().symlink_metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: kind_of(&meta),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&self, path: &str) -> std::io::Result<Metadata> {
        let meta = self.resolve(path).symlink_metadata()?;
        Ok(Metadata {
            kind: kind_of(&meta),
            len: meta.len(),
        })
    }

    fn host_root(&self) -> Option<&Path> {
        Some(&self.root)
    }
}
