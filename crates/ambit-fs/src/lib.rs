//! Read-only filesystem abstraction for Ambit scans.
//!
//! A scan never writes to the tree it walks, so the interface exposes only
//! sequential reads, directory listings, and stat. Implementations cover the
//! real host filesystem rooted at a directory ([`RealFs`]), an in-memory map
//! used by tests and embedded-filesystem recursion ([`MemFs`]), and a
//! single-file zip archive mount ([`ZipFs`]).
//!
//! Paths inside the abstraction are forward-slash and relative; `.` is the
//! root of the tree.

pub mod mem;
pub mod real;
pub mod zipfs;

use std::io::Read;
use std::path::{Path, PathBuf};

pub use mem::MemFs;
pub use real::RealFs;
pub use zipfs::ZipFs;

/// The kind of an inode as reported by [`FileSystem::metadata`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File,
    Dir,
    Symlink,
}

/// Stat result for a path inside a scanned tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub kind: FileKind,
    /// File size in bytes; zero for directories.
    pub len: u64,
}

impl Metadata {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Dir
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == FileKind::Symlink
    }
}

/// A single entry in a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name relative to its directory (no separators).
    pub name: String,
    pub kind: FileKind,
}

/// A read-only view over a tree of files.
///
/// Implementations must return directory entries in a stable order so that
/// a walk over an unchanged tree is deterministic.
pub trait FileSystem {
    /// Open a file for sequential reading.
    fn open(&self, path: &str) -> std::io::Result<Box<dyn Read + '_>>;

    /// List a directory. Entries are sorted by name.
    fn read_dir(&self, path: &str) -> std::io::Result<Vec<DirEntry>>;

    /// Stat a path without following symlinks.
    fn metadata(&self, path: &str) -> std::io::Result<Metadata>;

    /// Absolute host path of the tree root, or `None` for a virtual
    /// filesystem with no host presence.
    fn host_root(&self) -> Option<&Path> {
        None
    }

    /// Host paths this filesystem materialised on disk (e.g. spilled
    /// archive entries). The caller is responsible for cleaning them up
    /// after the filesystem is dropped.
    fn temp_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

fn not_found(path: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotFound, format!("no such path: {path}"))
}

fn not_a_dir(path: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("not a directory: {path}"),
    )
}
