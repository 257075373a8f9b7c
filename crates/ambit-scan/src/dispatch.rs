//! Plugin dispatch for one accepted inode.
//!
//! The dispatcher resolves which extractors run (global set filtered by
//! `file_required`, or the override hook's list verbatim), opens a file at
//! most once, and records per-plugin errors and results so statuses can be
//! derived after the walk.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use ambit_core::cancel::CancelToken;
use ambit_core::config::ScanConfig;
use ambit_core::fileapi::FileApi;
use ambit_core::inventory::Inventory;
use ambit_core::plugin::{Extractor, ScanInput};
use ambit_fs::{FileSystem, Metadata};
use ambit_util::errors::AmbitError;

/// Per-plugin error accumulation for one scan.
#[derive(Default)]
pub(crate) struct PluginErrors {
    errors: HashMap<String, Vec<String>>,
}

impl PluginErrors {
    pub(crate) fn record(&mut self, plugin: &str, path: &str, err: &miette::Report) {
        self.errors
            .entry(plugin.to_string())
            .or_default()
            .push(format!("{path}: {err}"));
    }

    pub(crate) fn for_plugin(&self, plugin: &str) -> &[String] {
        self.errors.get(plugin).map(Vec::as_slice).unwrap_or(&[])
    }
}

pub(crate) struct Dispatcher<'a> {
    pub fs: &'a dyn FileSystem,
    pub host_root: Option<&'a Path>,
    pub plugins: &'a [Arc<dyn Extractor>],
    pub config: &'a ScanConfig,
    pub ctx: &'a CancelToken,
}

impl<'a> Dispatcher<'a> {
    /// Which extractors should see this inode.
    ///
    /// A non-empty override list replaces the global set and skips
    /// `file_required`; otherwise each global plugin is asked in
    /// declaration order.
    fn select(
        &self,
        api: &mut FileApi,
        dirs_only: bool,
    ) -> Vec<Arc<dyn Extractor>> {
        if let Some(hook) = &self.config.extractor_override {
            let mut overridden = hook.select(api);
            if dirs_only {
                overridden.retain(|p| p.requirements().extract_from_dirs);
            }
            if !overridden.is_empty() {
                return overridden;
            }
        }
        let mut selected = Vec::new();
        for plugin in self.plugins {
            if dirs_only && !plugin.requirements().extract_from_dirs {
                continue;
            }
            if plugin.file_required(api) {
                selected.push(Arc::clone(plugin));
            }
        }
        selected
    }

    /// Invoke directory-capable extractors on a directory inode.
    pub(crate) fn dispatch_dir(
        &self,
        api: &mut FileApi,
        errors: &mut PluginErrors,
        found: &mut HashSet<String>,
        inventory: &mut Inventory,
    ) -> Result<(), AmbitError> {
        let path = api.path().to_string();
        let selected = self.select(api, true);
        for plugin in selected {
            self.ctx.check()?;
            let mut input = ScanInput {
                fs: self.fs,
                path: &path,
                root: self.host_root,
                info: None,
                reader: None,
            };
            self.consume(plugin.as_ref(), &path, plugin.extract(self.ctx, &mut input), errors, found, inventory);
        }
        Ok(())
    }

    /// Invoke file-capable extractors on a regular file or readable symlink.
    pub(crate) fn dispatch_file(
        &self,
        api: &mut FileApi,
        errors: &mut PluginErrors,
        found: &mut HashSet<String>,
        inventory: &mut Inventory,
    ) -> Result<(), AmbitError> {
        let path = api.path().to_string();
        let selected = self.select(api, false);
        if selected.is_empty() {
            return Ok(());
        }

        // First acceptance triggers the size check; an oversized file is
        // skipped for every plugin.
        let info: Option<Metadata> = api.stat().ok();
        if self.config.max_file_size > 0 {
            if let Some(meta) = info {
                if meta.len > self.config.max_file_size {
                    tracing::debug!(
                        "Skipping {path}: {} bytes exceeds max file size {}",
                        meta.len,
                        self.config.max_file_size
                    );
                    return Ok(());
                }
            }
        }

        let mut reader = match self.fs.open(&path) {
            Ok(r) => r,
            Err(e) => {
                return self.fs_error(&path, e);
            }
        };

        for plugin in selected {
            self.ctx.check()?;
            let mut input = ScanInput {
                fs: self.fs,
                path: &path,
                root: self.host_root,
                info,
                reader: Some(reader.as_mut()),
            };
            self.consume(plugin.as_ref(), &path, plugin.extract(self.ctx, &mut input), errors, found, inventory);
        }
        // Reader drops here; the plugin never owns it.
        Ok(())
    }

    fn fs_error(&self, path: &str, e: std::io::Error) -> Result<(), AmbitError> {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            tracing::debug!("Permission denied opening {path}: {e}");
            return Ok(());
        }
        if self.config.strict_fs_errors {
            return Err(AmbitError::Fs {
                path: path.to_string(),
                message: e.to_string(),
            });
        }
        tracing::warn!("Failed to open {path}: {e}");
        Ok(())
    }

    /// Fold one extractor outcome into the walk state.
    fn consume(
        &self,
        plugin: &dyn Extractor,
        path: &str,
        outcome: miette::Result<Inventory>,
        errors: &mut PluginErrors,
        found: &mut HashSet<String>,
        inventory: &mut Inventory,
    ) {
        match outcome {
            Ok(result) => {
                if result.is_empty() {
                    return;
                }
                found.insert(plugin.name().to_string());
                let mut result = result;
                for pkg in &mut result.packages {
                    pkg.plugins.push(plugin.name().to_string());
                    if self.config.store_absolute_paths {
                        if let Some(root) = self.host_root {
                            for loc in &mut pkg.locations {
                                *loc = root.join(loc.as_str()).to_string_lossy().into_owned();
                            }
                        }
                    }
                }
                inventory.append(result);
            }
            Err(err) => {
                errors.record(plugin.name(), path, &err);
            }
        }
    }
}
