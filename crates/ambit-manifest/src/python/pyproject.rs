//! pyproject.toml reader and line-preserving writer.

use std::collections::HashMap;
use std::path::Path;

use ambit_util::errors::{AmbitError, AmbitResult};
use toml_edit::{DocumentMut, Item};

use crate::model::{DepTypes, EcosystemDetails, Manifest, Requirement};
use crate::patch::Patch;
use crate::python::{parse_pep508, respecify};

/// Read `[project].dependencies` and `[project.optional-dependencies]`.
/// Optional-dependency group names become group tags.
pub fn read(path: &Path) -> AmbitResult<Manifest> {
    let contents = std::fs::read_to_string(path).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let doc: DocumentMut = contents.parse().map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: format!("invalid TOML: {e}"),
    })?;

    let project = doc.get("project").and_then(Item::as_table);
    let name = project
        .and_then(|p| p.get("name"))
        .and_then(|v| v.as_str())
        .unwrap_or("pyproject");
    let version = project
        .and_then(|p| p.get("version"))
        .and_then(|v| v.as_str())
        .unwrap_or("");

    let mut manifest = Manifest {
        file_path: path.to_path_buf(),
        root: Requirement::new(name, version),
        requirements: Vec::new(),
        groups: Default::default(),
        local_manifests: Vec::new(),
        ecosystem: EcosystemDetails::Python,
    };

    if let Some(deps) = project
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        for entry in deps.iter() {
            if let Some(spec) = entry.as_str() {
                push_requirement(&mut manifest, spec, None);
            }
        }
    }

    if let Some(optional) = project
        .and_then(|p| p.get("optional-dependencies"))
        .and_then(Item::as_table_like)
    {
        for (group, entries) in optional.iter() {
            let Some(entries) = entries.as_array() else {
                continue;
            };
            for entry in entries.iter() {
                if let Some(spec) = entry.as_str() {
                    push_requirement(&mut manifest, spec, Some(group));
                }
            }
        }
    }

    Ok(manifest)
}

fn push_requirement(manifest: &mut Manifest, spec: &str, group: Option<&str>) {
    let Some(parsed) = parse_pep508(spec) else {
        tracing::debug!("Skipping unparseable dependency string {spec:?}");
        return;
    };
    let mut req = Requirement::new(&parsed.name, &parsed.specifier);
    if let Some(group) = group {
        req.dep_types = DepTypes::OPTIONAL;
        manifest
            .groups
            .entry(req.key())
            .or_default()
            .push(group.to_string());
    }
    manifest.requirements.push(req);
}

/// Rewrite quoted dependency strings of patched packages inside the
/// `[project]` dependency arrays, preserving all other bytes.
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
    let mut section = String::new();
    let mut array_depth = 0i32;
    for line in contents.split_inclusive('\n') {
        let body = line.trim_end_matches(['\n', '\r']);
        let trimmed = body.trim();

        if array_depth == 0 && trimmed.starts_with('[') && trimmed.ends_with(']') {
            section = trimmed.trim_matches(['[', ']']).to_string();
            out.push_str(line);
            continue;
        }

        let in_project_deps = section == "project"
            && (array_depth > 0 || trimmed.starts_with("dependencies"));
        let in_optional = section == "project.optional-dependencies";

        if in_project_deps || in_optional {
            let was_in_array = array_depth > 0 || trimmed.contains('[');
            if was_in_array {
                let rewritten = rewrite_strings(body, &updates);
                out.push_str(&rewritten);
                out.push_str(&line[body.len()..]);
            } else {
                out.push_str(line);
            }
            array_depth += bracket_delta(body);
            array_depth = array_depth.max(0);
            continue;
        }

        array_depth += bracket_delta(body);
        array_depth = array_depth.max(0);
        out.push_str(line);
    }

    std::fs::write(output_path, out).map_err(|e| AmbitError::ManifestWrite {
        path: output_path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Net `[`/`]` nesting change of a line, ignoring brackets inside strings.
fn bracket_delta(line: &str) -> i32 {
    let mut delta = 0;
    let mut in_string = false;
    for ch in line.chars() {
        match ch {
            '"' => in_string = !in_string,
            '[' if !in_string => delta += 1,
            ']' if !in_string => delta -= 1,
            '#' if !in_string => break,
            _ => {}
        }
    }
    delta
}

/// Rewrite every quoted PEP 508 string on the line whose package is in the
/// patch set.
fn rewrite_strings(line: &str, updates: &HashMap<String, &str>) -> String {
    let mut out = String::with_capacity(line.len());
    let bytes = line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'"' {
            out.push(bytes[i] as char);
            i += 1;
            continue;
        }
        let start = i + 1;
        let Some(len) = line[start..].find('"') else {
            out.push_str(&line[i..]);
            break;
        };
        let inner = &line[start..start + len];
        match parse_pep508(inner) {
            Some(parsed) if updates.contains_key(&parsed.name) => {
                let new_spec = respecify(&parsed.specifier, updates[&parsed.name]);
                out.push('"');
                out.push_str(&inner[..parsed.spec_start]);
                out.push_str(&new_spec);
                out.push_str(&inner[parsed.spec_end..]);
                out.push('"');
            }
            _ => {
                out.push('"');
                out.push_str(inner);
                out.push('"');
            }
        }
        i = start + len + 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PackageUpdate;

    const FIXTURE: &str = r#"[build-system]
requires = ["hatchling"]

[project]
name = "demo-service"
version = "0.4.0"
dependencies = [
    "requests==2.19.1",
    "flask>=2.0.1",  # web
]

[project.optional-dependencies]
test = ["pytest==7.4.0"]
docs = [
    "sphinx==6.2.1",
]
"#;

    fn update(name: &str, to: &str) -> PackageUpdate {
        PackageUpdate {
            name: name.to_string(),
            version_from: String::new(),
            version_to: to.to_string(),
            purl_from: String::new(),
            purl_to: String::new(),
            transitive: false,
            dep_type: String::new(),
        }
    }

    fn fixture_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("pyproject.toml");
        std::fs::write(&path, FIXTURE).unwrap();
        path
    }

    #[test]
    fn reads_dependencies_and_optional_groups() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = read(&fixture_file(&dir)).unwrap();

        assert_eq!(manifest.root.name, "demo-service");
        assert_eq!(manifest.root.constraint, "0.4.0");

        let names: Vec<&str> = manifest
            .requirements
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["requests", "flask", "pytest", "sphinx"]);

        let pytest = manifest
            .requirements
            .iter()
            .find(|r| r.name == "pytest")
            .unwrap();
        assert_eq!(manifest.groups_for(&pytest.key()), &["test".to_string()]);
    }

    #[test]
    fn write_rewrites_only_matching_strings() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir);
        let out = dir.path().join("pyproject.out.toml");

        let patch = Patch {
            updates: vec![update("requests", "2.31.0"), update("sphinx", "7.0.0")],
            ..Default::default()
        };
        write(&path, &out, &patch).unwrap();

        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains(r#""requests==2.31.0","#));
        assert!(written.contains(r#""sphinx==7.0.0","#));
        // Untouched entries and comments preserved.
        assert!(written.contains(r#""flask>=2.0.1",  # web"#));
        assert!(written.contains(r#""pytest==7.4.0""#));
        assert!(written.contains(r#"requires = ["hatchling"]"#));
        assert!(written.contains(r#"version = "0.4.0""#));
    }

    #[test]
    fn single_line_optional_array_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = fixture_file(&dir);
        let out = dir.path().join("pyproject.out.toml");

        let patch = Patch {
            updates: vec![update("pytest", "8.0.0")],
            ..Default::default()
        };
        write(&path, &out, &patch).unwrap();
        let written = std::fs::read_to_string(&out).unwrap();
        assert!(written.contains(r#"test = ["pytest==8.0.0"]"#));
    }
}
