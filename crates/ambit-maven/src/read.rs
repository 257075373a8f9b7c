//! Multi-POM read: parent chain, property interpolation, BOM imports.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use ambit_manifest::model::{
    DepTypes, DependencyWithOrigin, EcosystemDetails, Manifest, MavenCoordinate, MavenDetails,
    PropertyWithOrigin, Requirement, RequirementKey,
};
use ambit_util::errors::{AmbitError, AmbitResult};

use crate::pom::{parse_pom, Pom, PomDependency};
use crate::registry::MavenRegistry;

/// Upper bound on the locally-resolved ancestor chain.
pub const MAX_PARENT_DEPTH: usize = 100;

/// Read a POM and its locally resolvable parents into a manifest.
///
/// Parent resolution is best-effort: a missing, unparseable, wrongly
/// coordinated, or non-`pom` parent ends the chain with what was collected
/// so far. A cycle in parent coordinates is fatal.
pub fn read(path: &Path, registry: &mut dyn MavenRegistry) -> AmbitResult<Manifest> {
    let xml = std::fs::read_to_string(path).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let base = parse_pom(&xml).map_err(|e| AmbitError::ManifestRead {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut details = MavenDetails {
        parent: base.parent.as_ref().map(|p| MavenCoordinate {
            group_id: p.group_id.clone(),
            artifact_id: p.artifact_id.clone(),
            version: p.version.clone(),
        }),
        ..Default::default()
    };

    collect_originals(&base, path, &mut details);

    // Working state, seeded from the base POM and grown by profiles and
    // parents.
    let mut properties: BTreeMap<String, String> = base.properties.iter().cloned().collect();
    let mut dependencies: Vec<(PomDependency, String)> = base
        .dependencies
        .iter()
        .map(|d| (d.clone(), String::new()))
        .collect();
    let mut management: Vec<PomDependency> = base.dependency_management.clone();

    // Activation-free profiles are merged as always-on defaults.
    for profile in &base.profiles {
        if profile.has_activation {
            continue;
        }
        for (name, value) in &profile.properties {
            properties.insert(name.clone(), value.clone());
        }
        for dep in &profile.dependencies {
            dependencies.push((dep.clone(), format!("profile@{}", profile.id)));
        }
        management.extend(profile.dependency_management.iter().cloned());
    }

    registry.register_repositories(&base.repositories);
    details.repositories = base.repositories.clone();

    walk_parents(&base, path, registry, &mut details, &mut properties, &mut dependencies, &mut management)?;

    // Interpolate, dedupe, then satisfy missing versions from management.
    for (dep, _) in &mut dependencies {
        interpolate_dep(&base, &properties, dep);
    }
    for dep in &mut management {
        interpolate_dep(&base, &properties, dep);
    }
    dedupe(&mut dependencies);

    let bom_imports = import_boms(&mut management, registry)?;

    for (dep, _) in &mut dependencies {
        if dep.version.is_none() {
            dep.version = management
                .iter()
                .find(|m| m.key() == dep.key() && m.classifier == dep.classifier)
                .and_then(|m| m.version.clone());
        }
    }

    // Requirements: test and optional deps stay in, so the resolver sees
    // the full graph; group tags record their nature.
    let mut manifest = Manifest {
        file_path: path.to_path_buf(),
        root: Requirement::new(
            &format!(
                "{}:{}",
                base.effective_group_id().unwrap_or_default(),
                base.artifact_id.clone().unwrap_or_default()
            ),
            base.effective_version().unwrap_or_default(),
        ),
        requirements: Vec::new(),
        groups: BTreeMap::new(),
        local_manifests: details.parent_paths.clone(),
        ecosystem: EcosystemDetails::Maven(MavenDetails::default()),
    };

    for (dep, origin) in &dependencies {
        let mut req = Requirement::new(&dep.key(), dep.version.as_deref().unwrap_or_default());
        req.origin = origin.clone();
        let key = req_key(dep);
        if dep.scope.as_deref() == Some("test") {
            req.dep_types = req.dep_types.union(DepTypes::TEST);
            manifest.groups.entry(key.clone()).or_default().push("test".to_string());
        }
        if dep.optional {
            req.dep_types = req.dep_types.union(DepTypes::OPTIONAL);
            manifest
                .groups
                .entry(key.clone())
                .or_default()
                .push("optional".to_string());
        }
        manifest.requirements.push(req);
    }

    // Requirements that never enter the resolved graph but must stay
    // updatable: the parent, import BOMs, profile and plugin deps.
    if let Some(parent) = &details.parent {
        details.requirements_for_updates.push(
            Requirement::new(&parent.key(), &parent.version).with_origin("parent"),
        );
    }
    for bom in &bom_imports {
        let req = Requirement::new(&bom.key(), bom.version.as_deref().unwrap_or_default())
            .with_origin("management");
        manifest
            .groups
            .entry(req_key(bom))
            .or_default()
            .push("import".to_string());
        details.requirements_for_updates.push(req);
    }
    for profile in &base.profiles {
        for dep in &profile.dependencies {
            details.requirements_for_updates.push(
                Requirement::new(&dep.key(), dep.version.as_deref().unwrap_or_default())
                    .with_origin(&format!("profile@{}", profile.id)),
            );
        }
    }
    for plugin in &base.plugins {
        for dep in &plugin.dependencies {
            details.requirements_for_updates.push(
                Requirement::new(&dep.key(), dep.version.as_deref().unwrap_or_default())
                    .with_origin(&format!("plugin@{}", plugin.key())),
            );
        }
    }

    manifest.ecosystem = EcosystemDetails::Maven(details);
    Ok(manifest)
}

fn req_key(dep: &PomDependency) -> RequirementKey {
    RequirementKey {
        name: dep.key(),
        artifact_type: dep.type_.clone().unwrap_or_default(),
        classifier: dep.classifier.clone().unwrap_or_default(),
    }
}

/// Record the base POM's declarations exactly as written.
fn collect_originals(pom: &Pom, file: &Path, details: &mut MavenDetails) {
    for (name, value) in &pom.properties {
        details.properties.push(PropertyWithOrigin {
            name: name.clone(),
            value: value.clone(),
            origin: String::new(),
            file_path: file.to_path_buf(),
        });
    }
    for profile in &pom.profiles {
        for (name, value) in &profile.properties {
            details.properties.push(PropertyWithOrigin {
                name: name.clone(),
                value: value.clone(),
                origin: format!("profile@{}", profile.id),
                file_path: file.to_path_buf(),
            });
        }
    }

    let mut push = |dep: &PomDependency, origin: String| {
        details.original_requirements.push(DependencyWithOrigin {
            key: req_key(dep),
            version: dep.version.clone().unwrap_or_default(),
            origin,
            file_path: file.to_path_buf(),
        });
    };
    for dep in &pom.dependencies {
        push(dep, String::new());
    }
    for dep in &pom.dependency_management {
        push(dep, "management".to_string());
    }
    for profile in &pom.profiles {
        for dep in &profile.dependencies {
            push(dep, format!("profile@{}", profile.id));
        }
        for dep in &profile.dependency_management {
            push(dep, format!("profile@{}@management", profile.id));
        }
    }
    for plugin in &pom.plugins {
        for dep in &plugin.dependencies {
            push(dep, format!("plugin@{}", plugin.key()));
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn walk_parents(
    base: &Pom,
    base_path: &Path,
    registry: &mut dyn MavenRegistry,
    details: &mut MavenDetails,
    properties: &mut BTreeMap<String, String>,
    dependencies: &mut Vec<(PomDependency, String)>,
    management: &mut Vec<PomDependency>,
) -> AmbitResult<()> {
    let mut seen: HashSet<String> = HashSet::new();
    if let (Some(group), Some(artifact)) = (base.effective_group_id(), base.artifact_id.as_deref())
    {
        seen.insert(format!("{group}:{artifact}"));
    }

    let mut current_ref = base.parent.clone();
    let mut current_dir = base_path.parent().map(Path::to_path_buf).unwrap_or_default();

    for _ in 0..MAX_PARENT_DEPTH {
        let Some(parent_ref) = current_ref.take() else {
            break;
        };
        let coord_key = format!("{}:{}", parent_ref.group_id, parent_ref.artifact_id);
        if !seen.insert(coord_key.clone()) {
            return Err(AmbitError::ManifestRead {
                path: base_path.to_path_buf(),
                message: format!("parent cycle detected at {coord_key}"),
            }
            .into());
        }

        let relative = parent_ref
            .relative_path
            .clone()
            .unwrap_or_else(|| "../pom.xml".to_string());
        if relative.trim().is_empty() {
            // <relativePath/> explicitly opts out of local resolution.
            break;
        }
        let mut candidate = current_dir.join(&relative);
        if candidate.is_dir() {
            candidate = candidate.join("pom.xml");
        }
        let Ok(xml) = std::fs::read_to_string(&candidate) else {
            tracing::debug!("Parent POM not found at {}", candidate.display());
            break;
        };
        let Ok(parent) = parse_pom(&xml) else {
            tracing::warn!("Unparseable parent POM at {}", candidate.display());
            break;
        };
        if parent.effective_group_id() != Some(parent_ref.group_id.as_str())
            || parent.artifact_id.as_deref() != Some(parent_ref.artifact_id.as_str())
            || parent.effective_version() != Some(parent_ref.version.as_str())
        {
            tracing::warn!(
                "Parent at {} does not match coordinate {coord_key}:{}",
                candidate.display(),
                parent_ref.version
            );
            break;
        }
        if parent.packaging.as_deref().unwrap_or("jar") != "pom" {
            tracing::warn!("Parent at {} is not pom packaging", candidate.display());
            break;
        }

        details.parent_paths.push(candidate.clone());
        collect_originals(&parent, &candidate, details);

        for (name, value) in &parent.properties {
            properties.entry(name.clone()).or_insert_with(|| value.clone());
        }
        for dep in &parent.dependencies {
            dependencies.push((dep.clone(), String::new()));
        }
        management.extend(parent.dependency_management.iter().cloned());

        registry.register_repositories(&parent.repositories);
        for url in &parent.repositories {
            if !details.repositories.contains(url) {
                details.repositories.push(url.clone());
            }
        }

        current_dir = candidate.parent().map(Path::to_path_buf).unwrap_or_default();
        current_ref = parent.parent.clone();
    }

    Ok(())
}

fn interpolate_dep(base: &Pom, properties: &BTreeMap<String, String>, dep: &mut PomDependency) {
    dep.group_id = base.interpolate(&dep.group_id, properties);
    dep.artifact_id = base.interpolate(&dep.artifact_id, properties);
    if let Some(version) = &dep.version {
        dep.version = Some(base.interpolate(version, properties));
    }
}

/// First declaration wins; later duplicates (typically inherited from a
/// parent) are dropped.
fn dedupe(dependencies: &mut Vec<(PomDependency, String)>) {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    dependencies.retain(|(dep, _)| {
        seen.insert((
            dep.key(),
            dep.type_.clone().unwrap_or_default(),
            dep.classifier.clone().unwrap_or_default(),
        ))
    });
}

/// Resolve `scope=import type=pom` management entries through the registry
/// and merge the imported management sections. Returns the BOM coordinates
/// that were declared.
fn import_boms(
    management: &mut Vec<PomDependency>,
    registry: &mut dyn MavenRegistry,
) -> AmbitResult<Vec<PomDependency>> {
    let imports: Vec<PomDependency> = management
        .iter()
        .filter(|d| d.is_bom_import())
        .cloned()
        .collect();

    for bom in &imports {
        let Some(version) = &bom.version else {
            continue;
        };
        let coordinate = MavenCoordinate {
            group_id: bom.group_id.clone(),
            artifact_id: bom.artifact_id.clone(),
            version: version.clone(),
        };
        match registry.fetch_pom(&coordinate)? {
            Some(pom) => {
                let bom_props: BTreeMap<String, String> = pom.properties.iter().cloned().collect();
                for mut dep in pom.dependency_management.clone() {
                    interpolate_dep(&pom, &bom_props, &mut dep);
                    let exists = management
                        .iter()
                        .any(|m| m.key() == dep.key() && m.classifier == dep.classifier);
                    if !exists {
                        management.push(dep);
                    }
                }
            }
            None => {
                tracing::warn!("BOM {coordinate} not available from the registry");
            }
        }
    }

    Ok(imports)
}

/// Paths of all POM files a manifest spans: the base file plus its
/// resolved parents.
pub fn affected_files(manifest: &Manifest) -> Vec<PathBuf> {
    let mut files = vec![manifest.file_path.clone()];
    files.extend(manifest.local_manifests.iter().cloned());
    files
}
