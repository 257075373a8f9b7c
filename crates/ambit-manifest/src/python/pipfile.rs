//! Pipfile (TOML) reader and line-preserving writer.

use std::collections::HashMap;
use std::path::Path;

use ambit_util::errors::{AmbitError, AmbitResult};
use toml_edit::{DocumentMut, Item, Value};

use crate::model::{DepTypes, EcosystemDetails, Manifest, Requirement};
use crate::patch::Patch;
use crate::python::{normalize_name, respecify};

/// Read `[packages]` and `[dev-packages]`, preserving declaration order.
///
/// Only string values and `{version = "…"}` tables are version
/// requirements; `git`/`path` entries are logged and skipped.
pub fn read(path: &Path) -> AmbitResult<Manifest> {
    let contents = std::fs::read_to_string(path).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let doc: DocumentMut = contents.parse().map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: format!("invalid TOML: {e}"),
    })?;

    let mut manifest = Manifest {
        file_path: path.to_path_buf(),
        root: Requirement::new("Pipfile", ""),
        requirements: Vec::new(),
        groups: Default::default(),
        local_manifests: Vec::new(),
        ecosystem: EcosystemDetails::Python,
    };

    collect_section(&doc, "packages", DepTypes::PROD, None, &mut manifest);
    collect_section(
        &doc,
        "dev-packages",
        DepTypes::DEV,
        Some("dev"),
        &mut manifest,
    );
    Ok(manifest)
}

fn collect_section(
    doc: &DocumentMut,
    section: &str,
    dep_types: DepTypes,
    group: Option<&str>,
    manifest: &mut Manifest,
) {
    let Some(table) = doc.get(section).and_then(Item::as_table) else {
        return;
    };
    for (name, item) in table.iter() {
        let constraint = match item {
            Item::Value(Value::String(s)) => Some(s.value().clone()),
            Item::Value(Value::InlineTable(t)) => match t.get("version").and_then(|v| v.as_str()) {
                Some(v) => Some(v.to_string()),
                None => {
                    tracing::debug!("Skipping non-version Pipfile entry {name} in [{section}]");
                    None
                }
            },
            Item::Table(t) => match t.get("version").and_then(|v| v.as_str()) {
                Some(v) => Some(v.to_string()),
                None => {
                    tracing::debug!("Skipping non-version Pipfile entry {name} in [{section}]");
                    None
                }
            },
            _ => None,
        };
        let Some(constraint) = constraint else {
            continue;
        };
        let mut req = Requirement::new(&normalize_name(name), &constraint);
        req.dep_types = dep_types;
        if let Some(group) = group {
            manifest
                .groups
                .entry(req.key())
                .or_default()
                .push(group.to_string());
        }
        manifest.requirements.push(req);
    }
}

/// Rewrite version strings of patched packages, preserving all other bytes.
pub fn write(manifest_path: &Path, output_path: &Path, patch: &Patch) -> AmbitResult<()> {
    let contents =
        std::fs::read_to_string(manifest_path).map_err(|e| AmbitError::ManifestRead {
            path: manifest_path.to_path_buf(),
            message: e.to_string(),
        })?;

    let updates: HashMap<String, &str> = patch
        .updates
        .iter()
        .map(|u| (u.name.clone(), u.version_to.as_str()))
        .collect();

    let mut out = String::with_capacity(contents.len());
    let mut in_dep_section = false;
    for line in contents.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim();
        if trimmed.starts_with('[') {
            in_dep_section = trimmed == "[packages]" || trimmed == "[dev-packages]";
            out.push_str(line);
            continue;
        }
        match in_dep_section.then(|| rewrite_line(body, &updates)).flatten() {
            Some(rewritten) => {
                out.push_str(&rewritten);
                out.push_str(&line[body.len()..]);
            }
            None => out.push_str(line),
        }
    }

    std::fs::write(output_path, out).map_err(|e| AmbitError::ManifestWrite {
        path: output_path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Replace the quoted version of `name = "spec"` or
/// `name = {version = "spec", ...}` when `name` is in the patch set.
fn rewrite_line(line: &str, updates: &HashMap<String, &str>) -> Option<String> {
    let eq = line.find('=')?;
    let key = normalize_name(line[..eq].trim().trim_matches('"'));
    let new_version = updates.get(&key)?;

    let rhs = &line[eq + 1..];
    let value_offset = eq + 1;
    let (vstart, vend) = if rhs.trim_start().starts_with('{') {
        let version_key = rhs.find("version")?;
        let after = &rhs[version_key..];
        let q1 = after.find('"')?;
        let q2 = after[q1 + 1..].find('"')?;
        (
            value_offset + version_key + q1 + 1,
            value_offset + version_key + q1 + 1 + q2,
        )
    } else {
        let q1 = rhs.find('"')?;
        let q2 = rhs[q1 + 1..].find('"')?;
        (value_offset + q1 + 1, value_offset + q1 + 1 + q2)
    };

    let new_spec = respecify(&line[vstart..vend], new_version);
    Some(format!(
        "{}{}{}",
        &line[..vstart],
        new_spec,
        &line[vend..]
    ))
}
