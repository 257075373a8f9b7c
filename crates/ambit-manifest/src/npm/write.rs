//! In-place package-lock.json writer.

use std::collections::HashMap;
use std::path::Path;

use ambit_util::errors::{AmbitError, AmbitResult};
use serde_json::Value;

use crate::npm::jsonedit;
use crate::patch::Patch;

/// Distribution metadata for one published package version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpmDist {
    pub resolved: String,
    pub integrity: String,
}

/// Registry client consulted for the tarball URL and integrity hash of the
/// versions a patch moves to. Implementations live outside the core.
pub trait NpmRegistry {
    fn dist(&self, name: &str, version: &str) -> AmbitResult<NpmDist>;
}

/// Apply `patch` to the lockfile at `lock_path` and write the result to
/// `output_path`.
///
/// Edits are byte-level point patches: both the v1 `dependencies` tree and
/// the v2/v3 `packages` map are updated where present, surrounding
/// formatting is untouched, and `lockfileVersion` is never modified. The
/// output is fully buffered before anything is committed.
pub fn write(
    lock_path: &Path,
    output_path: &Path,
    patch: &Patch,
    registry: &dyn NpmRegistry,
) -> AmbitResult<()> {
    let mut contents = std::fs::read_to_string(lock_path).map_err(|e| AmbitError::ManifestRead {
        path: lock_path.to_path_buf(),
        message: e.to_string(),
    })?;
    let doc: Value = serde_json::from_str(&contents).map_err(|e| AmbitError::ManifestRead {
        path: lock_path.to_path_buf(),
        message: format!("invalid JSON: {e}"),
    })?;

    // name -> from-version -> to-version
    let mut moves: HashMap<&str, HashMap<&str, &str>> = HashMap::new();
    for update in &patch.updates {
        moves
            .entry(update.name.as_str())
            .or_default()
            .insert(update.version_from.as_str(), update.version_to.as_str());
    }

    if let Some(packages) = doc.get("packages").and_then(Value::as_object) {
        for (key, entry) in packages {
            if key.is_empty() {
                continue;
            }
            let name = entry
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| super::lockfile::disk_name_of(key));
            let version = entry.get("version").and_then(Value::as_str).unwrap_or("");
            let Some(to) = moves.get(name.as_str()).and_then(|m| m.get(version)) else {
                continue;
            };
            apply_entry_patch(&mut contents, &["packages", key], &name, to, entry, registry)?;
        }
    }

    if let Some(dependencies) = doc.get("dependencies").and_then(Value::as_object) {
        let mut stack: Vec<(Vec<String>, &serde_json::Map<String, Value>)> =
            vec![(vec!["dependencies".to_string()], dependencies)];
        while let Some((path, deps)) = stack.pop() {
            for (name, entry) in deps {
                let mut entry_path = path.clone();
                entry_path.push(name.clone());
                let version = entry.get("version").and_then(Value::as_str).unwrap_or("");
                if let Some(to) = moves.get(name.as_str()).and_then(|m| m.get(version)) {
                    let borrowed: Vec<&str> = entry_path.iter().map(String::as_str).collect();
                    apply_entry_patch(&mut contents, &borrowed, name, to, entry, registry)?;
                }
                if let Some(nested) = entry.get("dependencies").and_then(Value::as_object) {
                    entry_path.push("dependencies".to_string());
                    stack.push((entry_path, nested));
                }
            }
        }
    }

    std::fs::write(output_path, contents).map_err(|e| AmbitError::ManifestWrite {
        path: output_path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Point-patch `version`, `resolved`, and `integrity` of one entry.
fn apply_entry_patch(
    contents: &mut String,
    entry_path: &[&str],
    name: &str,
    to_version: &str,
    entry: &Value,
    registry: &dyn NpmRegistry,
) -> AmbitResult<()> {
    let mut path = entry_path.to_vec();
    path.push("version");
    jsonedit::replace_string_value(contents, &path, to_version);

    // Only fetch metadata when the entry records distribution fields.
    let has_resolved = entry.get("resolved").is_some();
    let has_integrity = entry.get("integrity").is_some();
    if !has_resolved && !has_integrity {
        return Ok(());
    }
    let dist = registry.dist(name, to_version)?;
    if has_resolved {
        let mut path = entry_path.to_vec();
        path.push("resolved");
        jsonedit::replace_string_value(contents, &path, &dist.resolved);
    }
    if has_integrity {
        let mut path = entry_path.to_vec();
        path.push("integrity");
        jsonedit::replace_string_value(contents, &path, &dist.integrity);
    }
    Ok(())
}
