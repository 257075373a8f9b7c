//! Extractor and detector contracts.
//!
//! Plugins are host-extensible: the pipeline only sees these traits plus the
//! capability declarations from [`crate::capabilities`]. Extractor bodies
//! (format parsers) and detector bodies (policy checks, secret scanners)
//! live outside this workspace.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use ambit_fs::{FileSystem, Metadata};
use ambit_util::errors::AmbitResult;

use crate::cancel::CancelToken;
use crate::capabilities::Capabilities;
use crate::fileapi::FileApi;
use crate::finding::Finding;
use crate::inventory::{Inventory, PackageIndex};

/// Everything an extractor gets for one accepted inode.
///
/// The pipeline owns the reader and closes it when the extractor returns;
/// the plugin must not retain it. For directory inodes `info` and `reader`
/// are `None`.
pub struct ScanInput<'a> {
    pub fs: &'a dyn FileSystem,
    /// Path relative to the scan root.
    pub path: &'a str,
    /// Absolute host root, `None` for virtual filesystems.
    pub root: Option<&'a Path>,
    pub info: Option<Metadata>,
    pub reader: Option<&'a mut dyn Read>,
}

/// A plugin that turns files (or directories) into inventory.
pub trait Extractor {
    /// Stable plugin name, e.g. `python/requirements`.
    fn name(&self) -> &str;
    fn version(&self) -> i32;
    fn requirements(&self) -> Capabilities;

    /// Cheap per-inode filter. Called once per plugin per inode with the
    /// shared lazily-stat'ing handle; expensive work belongs in `extract`.
    fn file_required(&self, api: &mut FileApi) -> bool;

    /// Produce inventory from one inode. Returning both inventory and an
    /// error is allowed and is recorded as a partial success.
    fn extract(&self, ctx: &CancelToken, input: &mut ScanInput) -> AmbitResult<Inventory>;
}

/// A plugin that inspects the accumulated package index after extraction.
pub trait Detector {
    fn name(&self) -> &str;
    fn version(&self) -> i32;
    fn requirements(&self) -> Capabilities;

    fn scan(
        &self,
        ctx: &CancelToken,
        root: &dyn FileSystem,
        index: &PackageIndex,
    ) -> AmbitResult<Vec<Finding>>;
}

/// Hook that can replace the extractor set for a single inode.
///
/// When the hook returns a non-empty list, those extractors run without a
/// `file_required` check; an empty list falls back to the global set.
pub trait ExtractorOverride {
    fn select(&self, api: &mut FileApi) -> Vec<Arc<dyn Extractor>>;
}
