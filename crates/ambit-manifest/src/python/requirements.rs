//! requirements.txt reader and line-preserving writer.

use std::collections::HashMap;
use std::path::Path;

use ambit_util::errors::{AmbitError, AmbitResult};

use crate::model::{EcosystemDetails, Manifest, Requirement};
use crate::patch::Patch;
use crate::python::{parse_pep508, respecify};

/// Read a requirements.txt into a manifest.
///
/// Files in hash-checking mode are refused: a hash-checked install is an
/// integrity contract, not a manifest this engine may rewrite.
pub fn read(path: &Path) -> AmbitResult<Manifest> {
    let contents = std::fs::read_to_string(path).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if contents.lines().any(|l| l.contains("--hash=")) {
        return Err(AmbitError::ManifestRead {
            path: path.to_path_buf(),
            message: "file uses hash-checking mode".to_string(),
        }
        .into());
    }

    let mut requirements = Vec::new();
    for line in contents.lines() {
        if let Some(parsed) = parse_pep508(line) {
            requirements.push(Requirement::new(&parsed.name, &parsed.specifier));
        }
    }

    Ok(Manifest {
        file_path: path.to_path_buf(),
        root: Requirement::new("requirements", ""),
        requirements,
        groups: Default::default(),
        local_manifests: Vec::new(),
        ecosystem: EcosystemDetails::Python,
    })
}

/// Rewrite `manifest_path` with the patch applied, preserving every
/// non-specifier byte, and commit the result to `output_path`.
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
    for (idx, line) in contents.split_inclusive('\n').enumerate() {
        let body = line.trim_end_matches(['\n', '\r']);
        let newline = &line[body.len()..];
        match parse_pep508(body) {
            Some(parsed) if updates.contains_key(&parsed.name) => {
                let new_spec = respecify(&parsed.specifier, updates[&parsed.name]);
                tracing::debug!(
                    "requirements.txt line {}: {} -> {new_spec}",
                    idx + 1,
                    parsed.raw_name
                );
                out.push_str(&body[..parsed.spec_start]);
                out.push_str(&new_spec);
                out.push_str(&body[parsed.spec_end..]);
            }
            _ => out.push_str(body),
        }
        out.push_str(newline);
    }

    std::fs::write(output_path, out).map_err(|e| AmbitError::ManifestWrite {
        path: output_path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}
