//! Lossless POM patch writer.
//!
//! The writer never re-encodes the document. A locator pass records the
//! byte spans of exactly the element contents a patch touches (dependency
//! `<version>`s, property values, the parent version), then the new values
//! are spliced into the original bytes. Everything else, the `<project …>`
//! start tag with its namespace declarations included, survives verbatim.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Component, Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::Reader;

use ambit_manifest::model::{EcosystemDetails, Manifest, MavenDetails};
use ambit_manifest::patch::Patch;
use ambit_util::errors::{AmbitError, AmbitResult};

use crate::propsolve;

/// One targeted dependency version edit inside one file.
#[derive(Debug, Clone)]
struct DepEdit {
    /// Element origin: `""`, `management`, `profile@<id>`,
    /// `profile@<id>@management`, or `plugin` (any plugin block).
    origin: String,
    /// `group:artifact`.
    name: String,
    new_version: String,
}

/// One property value edit inside one file.
#[derive(Debug, Clone)]
struct PropEdit {
    /// `""` for top-level `<properties>`, `profile@<id>` for a profile's.
    origin: String,
    name: String,
    new_value: String,
}

/// A management entry to synthesize because no declaration matched.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct NewManagementEntry {
    group_id: String,
    artifact_id: String,
    type_: String,
    classifier: String,
    version: String,
}

#[derive(Debug, Clone, Default)]
struct FileEdits {
    dep_edits: Vec<DepEdit>,
    prop_edits: Vec<PropEdit>,
    parent_version: Option<String>,
    new_management: Vec<NewManagementEntry>,
}

/// Apply `patch` to the manifest's POM files and write base + parents under
/// `output_dir`, preserving the parents' layout relative to the base file.
pub fn write(manifest: &Manifest, patch: &Patch, output_dir: &Path) -> AmbitResult<()> {
    let EcosystemDetails::Maven(details) = &manifest.ecosystem else {
        return Err(AmbitError::Generic {
            message: "not a Maven manifest".to_string(),
        }
        .into());
    };

    let edits = route_updates(manifest, details, patch);

    let base_dir = manifest
        .file_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    for file in crate::read::affected_files(manifest) {
        let xml = std::fs::read_to_string(&file).map_err(|e| AmbitError::ManifestRead {
            path: file.clone(),
            message: e.to_string(),
        })?;
        let file_edits = edits.get(&file).cloned().unwrap_or_default();
        let patched = patch_file(&xml, &file_edits).map_err(|message| AmbitError::ManifestWrite {
            path: file.clone(),
            message,
        })?;

        let out_path = output_dir.join(relative_to(&base_dir, &file));
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AmbitError::ManifestWrite {
                path: out_path.clone(),
                message: e.to_string(),
            })?;
        }
        std::fs::write(&out_path, patched).map_err(|e| AmbitError::ManifestWrite {
            path: out_path.clone(),
            message: e.to_string(),
        })?;
    }
    Ok(())
}

/// Decide, per file, which elements change.
///
/// Updates whose original version is a `${…}` template become property
/// edits when the template solves cleanly against the target version.
/// Conflicting targets for one property poison it: every update involved
/// falls back to a direct `<version>` edit and the property is left alone.
fn route_updates(
    manifest: &Manifest,
    details: &MavenDetails,
    patch: &Patch,
) -> HashMap<PathBuf, FileEdits> {
    let mut edits: HashMap<PathBuf, FileEdits> = HashMap::new();

    // First pass: solve property templates and detect conflicts.
    let mut prop_targets: HashMap<(PathBuf, String, String), Vec<String>> = HashMap::new();
    let mut solved: Vec<(usize, Vec<(PathBuf, String, String, String)>)> = Vec::new();
    for (idx, update) in patch.updates.iter().enumerate() {
        let Some(original) = find_original(details, &update.name, &update.dep_type) else {
            continue;
        };
        if !original.version.contains("${") {
            continue;
        }
        let Some(assignments) = propsolve::solve(&original.version, &update.version_to) else {
            continue;
        };
        let mut located = Vec::new();
        for assignment in &assignments {
            // Nearest declaration wins, matching effective-property order.
            let Some(declared) = details.properties.iter().find(|p| p.name == assignment.name)
            else {
                located.clear();
                break;
            };
            let slot = (
                declared.file_path.clone(),
                declared.origin.clone(),
                assignment.name.clone(),
            );
            prop_targets
                .entry(slot.clone())
                .or_default()
                .push(assignment.value.clone());
            located.push((slot.0, slot.1, slot.2, assignment.value.clone()));
        }
        if !located.is_empty() {
            solved.push((idx, located));
        }
    }

    let poisoned: std::collections::HashSet<(PathBuf, String, String)> = prop_targets
        .iter()
        .filter(|(_, values)| values.iter().any(|v| v != &values[0]))
        .map(|(slot, _)| slot.clone())
        .collect();

    let mut property_patched: std::collections::HashSet<usize> = Default::default();
    for (idx, assignments) in &solved {
        if assignments
            .iter()
            .any(|(f, o, n, _)| poisoned.contains(&(f.clone(), o.clone(), n.clone())))
        {
            continue;
        }
        for (file, origin, name, value) in assignments {
            let file_edits = edits.entry(file.clone()).or_default();
            let exists = file_edits
                .prop_edits
                .iter()
                .any(|p| p.name == *name && p.origin == *origin);
            if !exists {
                file_edits.prop_edits.push(PropEdit {
                    origin: origin.clone(),
                    name: name.clone(),
                    new_value: value.clone(),
                });
            }
        }
        property_patched.insert(*idx);
    }

    // Second pass: everything not handled through a property becomes a
    // direct edit, a parent bump, or a new management entry.
    for (idx, update) in patch.updates.iter().enumerate() {
        if property_patched.contains(&idx) {
            continue;
        }
        if update.dep_type == "parent" {
            edits
                .entry(manifest.file_path.clone())
                .or_default()
                .parent_version = Some(update.version_to.clone());
            continue;
        }
        match find_original(details, &update.name, &update.dep_type) {
            Some(original) => {
                let origin = if original.origin.starts_with("plugin@") {
                    "plugin".to_string()
                } else {
                    original.origin.clone()
                };
                edits
                    .entry(original.file_path.clone())
                    .or_default()
                    .dep_edits
                    .push(DepEdit {
                        origin,
                        name: update.name.clone(),
                        new_version: update.version_to.clone(),
                    });
            }
            None => {
                let (group_id, artifact_id) = match update.name.split_once(':') {
                    Some(pair) => pair,
                    None => {
                        tracing::warn!("Skipping malformed Maven package name {}", update.name);
                        continue;
                    }
                };
                edits
                    .entry(manifest.file_path.clone())
                    .or_default()
                    .new_management
                    .push(NewManagementEntry {
                        group_id: group_id.to_string(),
                        artifact_id: artifact_id.to_string(),
                        type_: String::new(),
                        classifier: String::new(),
                        version: update.version_to.clone(),
                    });
            }
        }
    }

    for file_edits in edits.values_mut() {
        file_edits.new_management.sort();
    }
    edits
}

fn find_original<'a>(
    details: &'a MavenDetails,
    name: &str,
    dep_type: &str,
) -> Option<&'a ambit_manifest::model::DependencyWithOrigin> {
    details
        .original_requirements
        .iter()
        .find(|o| o.key.name == name && o.origin == dep_type)
        .or_else(|| {
            details
                .original_requirements
                .iter()
                .find(|o| o.key.name == name)
        })
}

/// Relative path of `target` with respect to `base_dir` (may step upward).
fn relative_to(base_dir: &Path, target: &Path) -> PathBuf {
    let base: Vec<Component> = base_dir.components().collect();
    let tgt: Vec<Component> = target.components().collect();
    let common = base
        .iter()
        .zip(&tgt)
        .take_while(|(a, b)| a == b)
        .count();
    let mut rel = PathBuf::new();
    for _ in common..base.len() {
        rel.push("..");
    }
    for component in &tgt[common..] {
        rel.push(component);
    }
    rel
}

/// Tracks which element a `<dependency>` block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DepContext {
    Main,
    Management,
    Profile,
    ProfileManagement,
    Plugin,
}

struct DepCapture {
    context: DepContext,
    group_id: String,
    artifact_id: String,
    version_span: Option<Range<usize>>,
}

/// Apply one file's edits to its XML text by span splicing.
fn patch_file(xml: &str, edits: &FileEdits) -> Result<String, String> {
    let mut reader = Reader::from_str(xml);
    // No text trimming: byte positions must map back into the source.

    let mut path: Vec<String> = Vec::new();
    let mut splices: Vec<(Range<usize>, String)> = Vec::new();

    let mut last_text = String::new();
    let mut inner_starts: Vec<usize> = Vec::new();
    let mut current_dep: Option<DepCapture> = None;
    let mut current_profile_id = String::new();
    let mut pending_dep_edits: Vec<DepEdit> = edits.dep_edits.clone();
    let mut mgmt_insert: Option<usize> = None;
    let mut project_end: Option<usize> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                path.push(tag);
                inner_starts.push(reader.buffer_position() as usize);
                last_text.clear();

                let ctx = path.join(">");
                let context = match ctx.as_str() {
                    "project>dependencies>dependency" => Some(DepContext::Main),
                    "project>dependencyManagement>dependencies>dependency" => {
                        Some(DepContext::Management)
                    }
                    "project>profiles>profile>dependencies>dependency" => Some(DepContext::Profile),
                    "project>profiles>profile>dependencyManagement>dependencies>dependency" => {
                        Some(DepContext::ProfileManagement)
                    }
                    "project>build>plugins>plugin>dependencies>dependency" => {
                        Some(DepContext::Plugin)
                    }
                    _ => None,
                };
                if let Some(context) = context {
                    current_dep = Some(DepCapture {
                        context,
                        group_id: String::new(),
                        artifact_id: String::new(),
                        version_span: None,
                    });
                }
            }
            Ok(Event::Text(ref e)) => {
                let text = e.unescape().map_err(|err| err.to_string())?;
                if !text.trim().is_empty() {
                    last_text = text.trim().to_string();
                }
            }
            Ok(Event::End(ref e)) => {
                let tag_len = e.name().as_ref().len();
                let end_pos = reader.buffer_position() as usize;
                let inner_end = end_pos - (tag_len + 3);
                let inner_start = inner_starts.pop().unwrap_or(inner_end);
                let inner_span = inner_start..inner_end;
                let ctx = path.join(">");
                let last = path.last().cloned().unwrap_or_default();

                // Dependency captures.
                if let Some(dep) = current_dep.as_mut() {
                    match last.as_str() {
                        "groupId" if ctx.ends_with(">dependency>groupId") => {
                            dep.group_id = last_text.clone();
                        }
                        "artifactId" if ctx.ends_with(">dependency>artifactId") => {
                            dep.artifact_id = last_text.clone();
                        }
                        "version" if ctx.ends_with(">dependency>version") => {
                            dep.version_span = Some(inner_span.clone());
                        }
                        _ => {}
                    }
                    if ctx.ends_with(">dependencies>dependency") {
                        if let Some(dep) = current_dep.take() {
                            let origin = match dep.context {
                                DepContext::Main => String::new(),
                                DepContext::Management => "management".to_string(),
                                DepContext::Profile => format!("profile@{current_profile_id}"),
                                DepContext::ProfileManagement => {
                                    format!("profile@{current_profile_id}@management")
                                }
                                DepContext::Plugin => "plugin".to_string(),
                            };
                            let name = format!("{}:{}", dep.group_id, dep.artifact_id);
                            if let Some(pos) = pending_dep_edits
                                .iter()
                                .position(|ed| ed.name == name && ed.origin == origin)
                            {
                                let edit = pending_dep_edits.remove(pos);
                                if let Some(span) = dep.version_span {
                                    splices.push((span, escape_xml(&edit.new_version)));
                                }
                            }
                        }
                    }
                }

                // Parent version.
                if ctx == "project>parent>version" {
                    if let Some(new_version) = &edits.parent_version {
                        splices.push((inner_span.clone(), escape_xml(new_version)));
                    }
                }

                // Property values, top-level and per-profile.
                if path.len() == 3 && path[1] == "properties" {
                    if let Some(edit) = edits
                        .prop_edits
                        .iter()
                        .find(|p| p.origin.is_empty() && p.name == last)
                    {
                        splices.push((inner_span.clone(), escape_xml(&edit.new_value)));
                    }
                } else if path.len() == 5 && path[1] == "profiles" && path[3] == "properties" {
                    let profile_origin = format!("profile@{current_profile_id}");
                    if let Some(edit) = edits
                        .prop_edits
                        .iter()
                        .find(|p| p.origin == profile_origin && p.name == last)
                    {
                        splices.push((inner_span.clone(), escape_xml(&edit.new_value)));
                    }
                }

                // Profile id bookkeeping.
                if ctx == "project>profiles>profile>id" {
                    current_profile_id = last_text.clone();
                } else if ctx == "project>profiles>profile" {
                    current_profile_id.clear();
                }

                // Insertion anchors.
                if ctx == "project>dependencyManagement>dependencies" {
                    mgmt_insert = Some(inner_end);
                }
                if ctx == "project" {
                    project_end = Some(inner_end);
                }

                path.pop();
                last_text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(format!("XML parse error: {e}")),
            _ => {}
        }
    }

    // Synthesized management entries, deterministically ordered.
    if !edits.new_management.is_empty() {
        match (mgmt_insert, project_end) {
            (Some(pos), _) => {
                splices.push((pos..pos, render_management_entries(&edits.new_management, 8)));
            }
            (None, Some(pos)) => {
                let block = format!(
                    "    <dependencyManagement>\n        <dependencies>\n{}        </dependencies>\n    </dependencyManagement>\n",
                    render_management_entries(&edits.new_management, 12)
                );
                splices.push((pos..pos, block));
            }
            (None, None) => return Err("no </project> element found".to_string()),
        }
    }

    if !pending_dep_edits.is_empty() {
        for missed in &pending_dep_edits {
            tracing::warn!(
                "No declaration found for {} (origin {:?}); edit skipped",
                missed.name,
                missed.origin
            );
        }
    }

    // Splice back-to-front so earlier ranges stay valid.
    splices.sort_by(|a, b| b.0.start.cmp(&a.0.start));
    let mut out = xml.to_string();
    for (range, text) in splices {
        out.replace_range(range, &text);
    }
    Ok(out)
}

fn render_management_entries(entries: &[NewManagementEntry], indent: usize) -> String {
    let pad = " ".repeat(indent);
    let inner = " ".repeat(indent + 4);
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("{pad}<dependency>\n"));
        out.push_str(&format!(
            "{inner}<groupId>{}</groupId>\n",
            escape_xml(&entry.group_id)
        ));
        out.push_str(&format!(
            "{inner}<artifactId>{}</artifactId>\n",
            escape_xml(&entry.artifact_id)
        ));
        out.push_str(&format!(
            "{inner}<version>{}</version>\n",
            escape_xml(&entry.version)
        ));
        if !entry.type_.is_empty() {
            out.push_str(&format!("{inner}<type>{}</type>\n", escape_xml(&entry.type_)));
        }
        if !entry.classifier.is_empty() {
            out.push_str(&format!(
                "{inner}<classifier>{}</classifier>\n",
                escape_xml(&entry.classifier)
            ));
        }
        out.push_str(&format!("{pad}</dependency>\n"));
    }
    out
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
