//! Single-file zip archive mounted as a read-only tree.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{Cursor, Read};

use ambit_util::paths;
use zip::ZipArchive;

use crate::{not_found, DirEntry, FileKind, FileSystem, Metadata};

struct ZipEntry {
    index: usize,
    len: u64,
}

/// A zip archive exposed through the [`FileSystem`] interface.
///
/// The central directory is indexed once at mount time; `open` inflates the
/// requested entry fully into memory. There is no host root and nothing is
/// spilled to disk.
pub struct ZipFs {
    archive: RefCell<ZipArchive<File>>,
    files: BTreeMap<String, ZipEntry>,
    dirs: BTreeSet<String>,
}

impl ZipFs {
    /// Mount the archive at `path`.
    pub fn mount(path: &std::path::Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let mut archive = ZipArchive::new(file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;

        let mut files = BTreeMap::new();
        let mut dirs = BTreeSet::new();
        for index in 0..archive.len() {
            let entry = archive
                .by_index(index)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
            let Some(name) = entry.enclosed_name() else {
                tracing::warn!("Skipping zip entry with unsafe path: {}", entry.name());
                continue;
            };
            let norm = paths::normalize(&name.to_string_lossy().replace('\\', "/"));
            if norm == "." {
                continue;
            }
            for anc in paths::ancestors(&norm) {
                dirs.insert(anc);
            }
            if entry.is_dir() {
                dirs.insert(norm);
            } else {
                files.insert(
                    norm,
                    ZipEntry {
                        index,
                        len: entry.size(),
                    },
                );
            }
        }

        Ok(Self {
            archive: RefCell::new(archive),
            files,
            dirs,
        })
    }

    fn is_dir(&self, path: &str) -> bool {
        path == "." || self.dirs.contains(path)
    }
}

impl FileSystem for ZipFs {
    fn open(&self, path: &str) -> std::io::Result<Box<dyn Read + '_>> {
        let norm = paths::normalize(path);
        let entry = self.files.get(&norm).ok_or_else(|| not_found(&norm))?;
        let mut archive = self.archive.borrow_mut();
        let mut zf = archive
            .by_index(entry.index)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        let mut buf = Vec::with_capacity(entry.len as usize);
        zf.read_to_end(&mut buf)?;
        Ok(Box::new(Cursor::new(buf)))
    }

    fn read_dir(&self, path: &str) -> std::io::Result<Vec<DirEntry>> {
        let norm = paths::normalize(path);
        if !self.is_dir(&norm) {
            return Err(not_found(&norm));
        }
        let prefix = if norm == "." {
            String::new()
        } else {
            format!("{norm}/")
        };
        let mut names: BTreeMap<String, FileKind> = BTreeMap::new();
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
        if let Some(entry) = self.files.get(&norm) {
            return Ok(Metadata {
                kind: FileKind::File,
                len: entry.len,
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
}
