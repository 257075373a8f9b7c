//! The Ambit scan pipeline.
//!
//! [`scan`] walks each configured root exactly once, dispatching extractor
//! plugins per inode and detector plugins over the accumulated package
//! index, and returns the aggregated inventory together with a per-plugin
//! status list.
//!
//! The walk is sequential and cooperative: plugins run synchronously on the
//! walk thread, and the only auxiliary worker is the two-second status
//! ticker. Hosts that want parallelism run whole roots on separate threads
//! with separate `scan` calls.

mod detect;
mod dispatch;
mod gitignore;
mod ticker;
mod walker;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use ambit_core::cancel::CancelToken;
use ambit_core::capabilities::Environment;
use ambit_core::config::ScanConfig;
use ambit_core::finding::Finding;
use ambit_core::inventory::{FsMounter as _, Inventory, PackageIndex};
use ambit_core::plugin::{Detector, Extractor};
use ambit_core::status::{PluginStatus, ScanStatus};
use ambit_fs::{FileSystem, RealFs};
use ambit_util::errors::AmbitError;

use dispatch::PluginErrors;
use ticker::Ticker;
use walker::Walker;

/// Synthetic plugin name used for embedded-filesystem mount failures.
const EMBEDDED_FS_PLUGIN: &str = "embedded-fs";

/// Bound on chained embedded-filesystem recursion within one root.
const MAX_EMBEDDED_DEPTH: usize = 1000;

/// One tree to scan: a host directory or an already-mounted virtual tree.
pub enum ScanRoot {
    /// A directory on the host filesystem; resolved to absolute form once
    /// before the walk.
    Path(PathBuf),
    /// A virtual mount with no host path.
    Mounted(Box<dyn FileSystem>),
}

/// Everything a scan produces.
///
/// A fatal error (quota, cancellation, strict FS error, detector invariant
/// violation) does not discard the work done before it: the partial
/// inventory and the statuses collected so far are returned alongside
/// `error`.
pub struct ScanResult {
    pub inventory: Inventory,
    pub findings: Vec<Finding>,
    pub statuses: Vec<PluginStatus>,
    pub error: Option<AmbitError>,
}

struct ResolvedRoot {
    fs: Box<dyn FileSystem>,
    host: Option<PathBuf>,
    paths_to_extract: Vec<String>,
    dirs_to_skip: HashSet<String>,
}

/// Walk every root, dispatch plugins, and run detectors.
pub fn scan(
    roots: Vec<ScanRoot>,
    extractors: Vec<Arc<dyn Extractor>>,
    detectors: Vec<Arc<dyn Detector>>,
    config: &ScanConfig,
    env: Environment,
    ctx: &CancelToken,
) -> ScanResult {
    // Plugins the environment cannot host are dropped silently.
    let extractors: Vec<Arc<dyn Extractor>> = extractors
        .into_iter()
        .filter(|p| env.satisfies(&p.requirements()))
        .collect();
    let detectors: Vec<Arc<dyn Detector>> = detectors
        .into_iter()
        .filter(|d| env.satisfies(&d.requirements()))
        .collect();

    let mut inventory = Inventory::new();
    let mut errors = PluginErrors::default();
    let mut found: HashSet<String> = HashSet::new();
    let mut extra_statuses: Vec<PluginStatus> = Vec::new();

    let roots = match resolve_roots(roots, config) {
        Ok(roots) => roots,
        Err(error) => {
            return ScanResult {
                inventory,
                findings: Vec::new(),
                statuses: statuses_for(&extractors, &errors, &found),
                error: Some(error),
            }
        }
    };

    for root in &roots {
        let walk_result = walk_root(
            root,
            &extractors,
            config,
            ctx,
            &mut errors,
            &mut found,
            &mut inventory,
            &mut extra_statuses,
        );
        if let Err(error) = walk_result {
            let mut statuses = statuses_for(&extractors, &errors, &found);
            statuses.extend(extra_statuses);
            return ScanResult {
                inventory,
                findings: Vec::new(),
                statuses,
                error: Some(error),
            };
        }
    }

    let mut statuses = statuses_for(&extractors, &errors, &found);
    statuses.extend(extra_statuses);

    // Post-extraction phase: policy detectors over the package index.
    let (findings, error) = match roots.first() {
        Some(root) if !detectors.is_empty() => {
            let index = PackageIndex::new(&inventory.packages);
            let outcome = detect::run_detectors(ctx, root.fs.as_ref(), &detectors, &index);
            statuses.extend(outcome.statuses);
            (outcome.findings, outcome.error)
        }
        _ => (Vec::new(), None),
    };

    ScanResult {
        inventory,
        findings,
        statuses,
        error,
    }
}

/// Resolve roots to filesystems and reinterpret configured paths against
/// them. Each absolute configured path must fall under some root (first
/// match wins); a leftover is a configuration error. Relative paths apply
/// to every root as-is.
fn resolve_roots(roots: Vec<ScanRoot>, config: &ScanConfig) -> Result<Vec<ResolvedRoot>, AmbitError> {
    let mut resolved = Vec::new();
    for root in roots {
        match root {
            ScanRoot::Path(path) => {
                let abs = std::fs::canonicalize(&path).map_err(|e| AmbitError::Config {
                    message: format!("cannot resolve scan root {}: {e}", path.display()),
                })?;
                resolved.push(ResolvedRoot {
                    fs: Box::new(RealFs::new(abs.clone())),
                    host: Some(abs),
                    paths_to_extract: Vec::new(),
                    dirs_to_skip: HashSet::new(),
                });
            }
            ScanRoot::Mounted(fs) => {
                let host = fs.host_root().map(|p| p.to_path_buf());
                resolved.push(ResolvedRoot {
                    fs,
                    host,
                    paths_to_extract: Vec::new(),
                    dirs_to_skip: HashSet::new(),
                });
            }
        }
    }

    for path in &config.paths_to_extract {
        assign_to_root(path, &mut resolved, |root, rel| {
            root.paths_to_extract.push(rel);
        })?;
    }
    for dir in &config.dirs_to_skip {
        assign_to_root(dir, &mut resolved, |root, rel| {
            root.dirs_to_skip.insert(rel);
        })?;
    }

    Ok(resolved)
}

/// Apply one configured path to the first root that contains it, or to all
/// roots when the path is relative.
fn assign_to_root(
    path: &std::path::Path,
    roots: &mut [ResolvedRoot],
    mut apply: impl FnMut(&mut ResolvedRoot, String),
) -> Result<(), AmbitError> {
    if path.is_absolute() {
        for root in roots.iter_mut() {
            if let Some(host) = &root.host {
                if let Ok(rel) = path.strip_prefix(host) {
                    let rel = forward_slash(rel);
                    apply(root, rel);
                    return Ok(());
                }
            }
        }
        return Err(AmbitError::Config {
            message: format!("path {} is outside every scan root", path.display()),
        });
    }
    let rel = forward_slash(path);
    for root in roots.iter_mut() {
        apply(root, rel.clone());
    }
    Ok(())
}

fn forward_slash(path: &std::path::Path) -> String {
    let joined = path
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    ambit_util::paths::normalize(&joined)
}

#[allow(clippy::too_many_arguments)]
fn walk_root(
    root: &ResolvedRoot,
    extractors: &[Arc<dyn Extractor>],
    config: &ScanConfig,
    ctx: &CancelToken,
    errors: &mut PluginErrors,
    found: &mut HashSet<String>,
    inventory: &mut Inventory,
    extra_statuses: &mut Vec<PluginStatus>,
) -> Result<(), AmbitError> {
    let embedded_start = inventory.embedded_fs.len();

    run_walk(
        root.fs.as_ref(),
        root.host.as_deref(),
        extractors,
        config,
        ctx,
        &root.paths_to_extract,
        &root.dirs_to_skip,
        errors,
        found,
        inventory,
    )?;

    // Re-enter nested filesystems discovered during this root's walk. The
    // list can grow while we iterate: an inner walk may surface further
    // markers, which are processed in turn (their paths already carry the
    // outer prefix).
    let mut index = embedded_start;
    let no_entries: Vec<String> = Vec::new();
    let no_skips: HashSet<String> = HashSet::new();
    while index < inventory.embedded_fs.len() {
        if index - embedded_start >= MAX_EMBEDDED_DEPTH {
            tracing::warn!("Embedded filesystem limit reached; remaining markers unprocessed");
            break;
        }
        let prefix = inventory.embedded_fs[index].path.clone();
        let mounted = match inventory.embedded_fs[index].mounter.mount() {
            Ok(fs) => fs,
            Err(e) => {
                tracing::warn!("Failed to mount embedded filesystem at {prefix}: {e}");
                extra_statuses.push(PluginStatus {
                    name: EMBEDDED_FS_PLUGIN.to_string(),
                    version: 0,
                    status: ScanStatus::Failed,
                    failure_reason: Some(format!("{prefix}: {e}")),
                });
                index += 1;
                continue;
            }
        };

        let mut inner = Inventory::new();
        let inner_result = run_walk(
            mounted.as_ref(),
            None,
            extractors,
            config,
            ctx,
            &no_entries,
            &no_skips,
            errors,
            found,
            &mut inner,
        );
        inventory.embedded_fs[index].temp_paths = mounted.temp_paths();
        match inner_result {
            Ok(()) => {
                for pkg in &mut inner.packages {
                    for loc in &mut pkg.locations {
                        *loc = format!("{prefix}:{loc}");
                    }
                }
                for marker in &mut inner.embedded_fs {
                    marker.path = format!("{prefix}:{}", marker.path);
                }
                inventory.append(inner);
            }
            Err(AmbitError::Cancelled) => return Err(AmbitError::Cancelled),
            Err(e) => {
                tracing::warn!("Embedded walk of {prefix} failed: {e}");
                extra_statuses.push(PluginStatus {
                    name: EMBEDDED_FS_PLUGIN.to_string(),
                    version: 0,
                    status: ScanStatus::Failed,
                    failure_reason: Some(format!("{prefix}: {e}")),
                });
            }
        }
        index += 1;
    }

    Ok(())
}

/// Run one walk over one filesystem, with the ticker active only for full
/// walks.
#[allow(clippy::too_many_arguments)]
fn run_walk(
    fs: &dyn FileSystem,
    host: Option<&std::path::Path>,
    extractors: &[Arc<dyn Extractor>],
    config: &ScanConfig,
    ctx: &CancelToken,
    paths_to_extract: &[String],
    dirs_to_skip: &HashSet<String>,
    errors: &mut PluginErrors,
    found: &mut HashSet<String>,
    inventory: &mut Inventory,
) -> Result<(), AmbitError> {
    let mut walker = Walker::new(
        fs,
        host,
        extractors,
        config,
        ctx,
        dirs_to_skip,
        errors,
        found,
        inventory,
    );

    if paths_to_extract.is_empty() {
        let ticker = Ticker::start(
            config.stats.clone(),
            walker.inodes_visited.clone(),
            walker.current_path.clone(),
        );
        let result = walker.walk_full();
        ticker.stop();
        result
    } else {
        walker.walk_individual_paths(paths_to_extract)
    }
}

fn statuses_for(
    extractors: &[Arc<dyn Extractor>],
    errors: &PluginErrors,
    found: &HashSet<String>,
) -> Vec<PluginStatus> {
    extractors
        .iter()
        .map(|p| {
            PluginStatus::derive(
                p.name(),
                p.version(),
                errors.for_plugin(p.name()),
                found.contains(p.name()),
            )
        })
        .collect()
}
