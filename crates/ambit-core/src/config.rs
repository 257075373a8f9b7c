//! Scan configuration.

use std::path::PathBuf;
use std::sync::Arc;

use globset::GlobSet;
use regex::Regex;

use crate::plugin::ExtractorOverride;
use crate::stats::StatsSink;

/// Everything that shapes a walk besides the roots and the plugin set.
///
/// All limits are optional: a zero quota means "no cap". Paths in
/// `paths_to_extract` and `dirs_to_skip` may be absolute; they are resolved
/// against the scan roots once, before the walk starts, and resolution
/// failure is a configuration error.
#[derive(Default)]
pub struct ScanConfig {
    /// When non-empty, walk only these files/subtrees instead of whole roots.
    pub paths_to_extract: Vec<PathBuf>,
    /// With `paths_to_extract`: only handle files whose containing directory
    /// is one of the entry points; deeper subdirectories are entered but
    /// their files are skipped.
    pub ignore_subdirs: bool,
    /// Directories to skip entirely.
    pub dirs_to_skip: Vec<PathBuf>,
    /// Skip directories whose relative path matches.
    pub skip_dir_regex: Option<Regex>,
    /// Skip directories whose relative path matches.
    pub skip_dir_glob: Option<GlobSet>,
    /// Honour `.gitignore` files encountered during the walk.
    pub use_gitignore: bool,
    /// Treat symlinked files as extractable.
    pub read_symlinks: bool,
    /// Abort the walk once this many inodes have been visited; zero = no cap.
    pub max_inodes: u64,
    /// Silently skip files larger than this; zero = no cap.
    pub max_file_size: u64,
    /// Rewrite package locations to absolute host paths at merge time.
    pub store_absolute_paths: bool,
    /// Turn filesystem errors into fatal scan errors instead of logging.
    pub strict_fs_errors: bool,
    /// Per-inode hook that can replace the extractor set.
    pub extractor_override: Option<Box<dyn ExtractorOverride>>,
    /// Observer for walk progress.
    pub stats: Option<Arc<dyn StatsSink>>,
}

impl ScanConfig {
    pub fn new() -> Self {
        Self::default()
    }
}
