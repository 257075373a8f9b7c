//! Per-inode file handle with memoised stat.
//!
//! One mutable [`FileApi`] is threaded through every inode visit; the walker
//! updates the path and clears the memo on each new entry. Every plugin's
//! `file_required` check shares the handle, so stat costs at most one
//! filesystem call per inode no matter how many plugins ask.

use ambit_fs::{FileSystem, Metadata};

/// The handle passed to `Extractor::file_required`.
pub struct FileApi<'fs> {
    fs: &'fs dyn FileSystem,
    path: String,
    stat: Option<Result<Metadata, (std::io::ErrorKind, String)>>,
    stat_calls: u64,
}

impl<'fs> FileApi<'fs> {
    pub fn new(fs: &'fs dyn FileSystem) -> Self {
        Self {
            fs,
            path: ".".to_string(),
            stat: None,
            stat_calls: 0,
        }
    }

    /// Path of the inode currently being visited, relative to the scan root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Point the handle at a new inode, dropping the memoised stat.
    pub fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
        self.stat = None;
    }

    /// Stat the current inode. The first call hits the filesystem; repeated
    /// calls replay the memoised result (including a memoised error).
    pub fn stat(&mut self) -> std::io::Result<Metadata> {
        if self.stat.is_none() {
            self.stat_calls += 1;
            self.stat = Some(
                self.fs
                    .metadata(&self.path)
                    .map_err(|e| (e.kind(), e.to_string())),
            );
        }
        match self.stat.as_ref().unwrap() {
            Ok(meta) => Ok(*meta),
            Err((kind, msg)) => Err(std::io::Error::new(*kind, msg.clone())),
        }
    }

    /// Number of real stat calls made through this handle (all inodes).
    pub fn stat_calls(&self) -> u64 {
        self.stat_calls
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambit_fs::MemFs;

    #[test]
    fn stat_is_memoised_per_inode() {
        let fs = MemFs::new().add_file("a.txt", "aaa").add_file("b.txt", "b");
        let mut api = FileApi::new(&fs);

        api.set_path("a.txt");
        assert_eq!(api.stat().unwrap().len, 3);
        assert_eq!(api.stat().unwrap().len, 3);
        assert_eq!(api.stat().unwrap().len, 3);
        assert_eq!(api.stat_calls(), 1);

        api.set_path("b.txt");
        assert_eq!(api.stat().unwrap().len, 1);
        assert_eq!(api.stat_calls(), 2);
    }

    #[test]
    fn errors_are_memoised_too() {
        let fs = MemFs::new();
        let mut api = FileApi::new(&fs);
        api.set_path("missing");
        assert!(api.stat().is_err());
        assert!(api.stat().is_err());
        assert_eq!(api.stat_calls(), 1);
    }
}
