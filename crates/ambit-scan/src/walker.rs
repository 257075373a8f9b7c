//! Depth-first walk scheduler.
//!
//! One [`Walker`] drives one root: it owns the inode counter, the shared
//! lazy-stat handle, and the gitignore stack, and it funnels every accepted
//! inode through the dispatcher. All plugin invocations happen synchronously
//! on the walk thread.

use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ambit_core::cancel::CancelToken;
use ambit_core::config::ScanConfig;
use ambit_core::fileapi::FileApi;
use ambit_core::inventory::Inventory;
use ambit_core::plugin::Extractor;
use ambit_core::stats::StatsSink as _;
use ambit_fs::{FileKind, FileSystem};
use ambit_util::errors::AmbitError;
use ambit_util::paths;

use crate::dispatch::{Dispatcher, PluginErrors};
use crate::gitignore::GitignoreStack;

/// What to do with a directory after its own inode was handled.
enum Decision {
    Recurse { pushed_gitignore: bool },
    SkipSubtree { pushed_gitignore: bool },
    Done,
}

pub(crate) struct Walker<'a> {
    fs: &'a dyn FileSystem,
    config: &'a ScanConfig,
    ctx: &'a CancelToken,
    dispatcher: Dispatcher<'a>,
    api: FileApi<'a>,
    gitignore: GitignoreStack,
    /// Scan-relative directories from the resolved dirs-to-skip set.
    dirs_to_skip: &'a HashSet<String>,
    /// Entry-point directories when `ignore_subdirs` is active.
    entry_dirs: Option<HashSet<String>>,
    pub inodes_visited: Arc<AtomicU64>,
    pub dirs_visited: u64,
    pub current_path: Arc<Mutex<String>>,
    pub errors: &'a mut PluginErrors,
    pub found: &'a mut HashSet<String>,
    pub inventory: &'a mut Inventory,
}

impl<'a> Walker<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        fs: &'a dyn FileSystem,
        host_root: Option<&'a Path>,
        plugins: &'a [Arc<dyn Extractor>],
        config: &'a ScanConfig,
        ctx: &'a CancelToken,
        dirs_to_skip: &'a HashSet<String>,
        errors: &'a mut PluginErrors,
        found: &'a mut HashSet<String>,
        inventory: &'a mut Inventory,
    ) -> Self {
        Self {
            fs,
            config,
            ctx,
            dispatcher: Dispatcher {
                fs,
                host_root,
                plugins,
                config,
                ctx,
            },
            api: FileApi::new(fs),
            gitignore: GitignoreStack::new(),
            dirs_to_skip,
            entry_dirs: None,
            inodes_visited: Arc::new(AtomicU64::new(0)),
            dirs_visited: 0,
            current_path: Arc::new(Mutex::new(String::new())),
            errors,
            found,
            inventory,
        }
    }

    /// Walk the whole root depth-first starting at `.`.
    pub(crate) fn walk_full(&mut self) -> Result<(), AmbitError> {
        self.walk_from(".", FileKind::Dir, true)
    }

    /// Walk only the configured entry points, in order.
    ///
    /// The inode counter accumulates across entry points, so the max-inodes
    /// quota bounds the root as a whole.
    pub(crate) fn walk_individual_paths(&mut self, entries: &[String]) -> Result<(), AmbitError> {
        if self.config.ignore_subdirs {
            self.entry_dirs = Some(entries.iter().map(|e| paths::normalize(e)).collect());
        }
        for entry in entries {
            let entry = paths::normalize(entry);
            let meta = match self.fs.metadata(&entry) {
                Ok(m) => m,
                Err(e) => {
                    self.fs_error(&entry, e)?;
                    continue;
                }
            };
            if meta.is_dir() {
                let preloaded = if self.config.use_gitignore {
                    self.preload_parent_gitignores(&entry)
                } else {
                    0
                };
                let result = self.walk_from(&entry, FileKind::Dir, true);
                for _ in 0..preloaded {
                    self.gitignore.pop();
                }
                result?;
            } else {
                self.walk_from(&entry, meta.kind, true)?;
            }
        }
        Ok(())
    }

    /// Load the `.gitignore`s of every ancestor of `entry` (root first) so
    /// an entry point deeper than the scan root sees the same rules a full
    /// walk would. Returns the number of frames pushed.
    fn preload_parent_gitignores(&mut self, entry: &str) -> usize {
        let mut pushed = 0;
        if self.gitignore.push_dir(self.fs, ".") {
            pushed += 1;
        }
        for ancestor in paths::ancestors(entry) {
            if self.gitignore.push_dir(self.fs, &ancestor) {
                pushed += 1;
            }
        }
        pushed
    }

    /// Visit one inode and, for directories, its subtree.
    fn walk_from(
        &mut self,
        path: &str,
        kind: FileKind,
        entry_point: bool,
    ) -> Result<(), AmbitError> {
        match self.visit(path, kind, entry_point)? {
            Decision::Recurse { pushed_gitignore } => {
                let result = self.walk_children(path);
                if pushed_gitignore {
                    self.gitignore.pop();
                }
                result
            }
            Decision::SkipSubtree { pushed_gitignore } => {
                if pushed_gitignore {
                    self.gitignore.pop();
                }
                Ok(())
            }
            Decision::Done => Ok(()),
        }
    }

    fn walk_children(&mut self, dir: &str) -> Result<(), AmbitError> {
        let entries = match self.fs.read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => return self.fs_error(dir, e),
        };
        for entry in entries {
            let child = paths::join(dir, &entry.name);
            self.walk_from(&child, entry.kind, false)?;
        }
        Ok(())
    }

    /// Handle a single inode: quota, stats hooks, cancellation, skip rules,
    /// and plugin dispatch.
    fn visit(
        &mut self,
        path: &str,
        kind: FileKind,
        entry_point: bool,
    ) -> Result<Decision, AmbitError> {
        let visited = self.inodes_visited.fetch_add(1, Ordering::Relaxed) + 1;
        if self.config.max_inodes > 0 && visited > self.config.max_inodes {
            return Err(AmbitError::Quota {
                visited,
                limit: self.config.max_inodes,
            });
        }

        if let Some(stats) = &self.config.stats {
            stats.before_inode(path);
        }
        self.ctx.check()?;

        if let Ok(mut current) = self.current_path.lock() {
            *current = path.to_string();
        }
        self.api.set_path(path);

        let decision = if kind == FileKind::Dir {
            self.visit_dir(path)?
        } else {
            self.visit_file(path, kind, entry_point)?;
            Decision::Done
        };

        if let Some(stats) = &self.config.stats {
            stats.after_inode(path);
        }
        Ok(decision)
    }

    fn visit_dir(&mut self, path: &str) -> Result<Decision, AmbitError> {
        self.dirs_visited += 1;

        let skipped = self.should_skip_dir(path);
        let pushed_gitignore = if self.config.use_gitignore && !skipped {
            self.gitignore.push_dir(self.fs, path)
        } else {
            false
        };

        self.dispatcher.dispatch_dir(
            &mut self.api,
            self.errors,
            self.found,
            self.inventory,
        )?;

        if skipped {
            tracing::debug!("Skipping subtree {path}");
            Ok(Decision::SkipSubtree { pushed_gitignore })
        } else {
            Ok(Decision::Recurse { pushed_gitignore })
        }
    }

    fn visit_file(
        &mut self,
        path: &str,
        kind: FileKind,
        entry_point: bool,
    ) -> Result<(), AmbitError> {
        match kind {
            FileKind::File => {}
            FileKind::Symlink if self.config.read_symlinks => {}
            _ => return Ok(()),
        }
        if !entry_point {
            if let Some(entry_dirs) = &self.entry_dirs {
                if !entry_dirs.contains(&paths::parent(path)) {
                    return Ok(());
                }
            }
        }
        if self.config.use_gitignore && self.gitignore.matches(path, false) {
            tracing::debug!("Gitignored: {path}");
            return Ok(());
        }
        self.dispatcher
            .dispatch_file(&mut self.api, self.errors, self.found, self.inventory)
    }

    /// Skip rules in priority order; the first matching rule fires.
    fn should_skip_dir(&self, path: &str) -> bool {
        if path == "." {
            return false;
        }
        if self.dirs_to_skip.contains(path) {
            return true;
        }
        if self.config.use_gitignore && self.gitignore.matches(path, true) {
            return true;
        }
        if let Some(re) = &self.config.skip_dir_regex {
            if re.is_match(path) {
                return true;
            }
        }
        if let Some(glob) = &self.config.skip_dir_glob {
            if glob.is_match(path) {
                return true;
            }
        }
        false
    }

    fn fs_error(&self, path: &str, e: std::io::Error) -> Result<(), AmbitError> {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            tracing::debug!("Permission denied at {path}: {e}");
            return Ok(());
        }
        if self.config.strict_fs_errors {
            return Err(AmbitError::Fs {
                path: path.to_string(),
                message: e.to_string(),
            });
        }
        tracing::warn!("Filesystem error at {path}: {e}");
        Ok(())
    }
}
