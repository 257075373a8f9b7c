//! The update suggester: query the registry for newer versions of every
//! updatable requirement and emit a patch within the configured upgrade
//! levels.

use ambit_manifest::model::{EcosystemDetails, Manifest, Requirement};
use ambit_manifest::patch::{PackageUpdate, Patch};
use ambit_manifest::version::{MavenVersion, VersionRange};
use ambit_maven::registry::MavenRegistry;
use ambit_util::errors::AmbitResult;

use crate::upgrade::{classify, UpgradeConfig, UpgradeLevel};

/// Suggester inputs besides the manifest and the registry.
#[derive(Debug, Clone, Default)]
pub struct SuggestOptions {
    /// Skip requirements tagged with the `test` group.
    pub ignore_dev: bool,
    pub upgrade_config: UpgradeConfig,
}

/// Suggest version bumps for a Maven manifest.
///
/// Deterministic for a fixed manifest and registry: running it twice yields
/// the same patch.
pub fn suggest(
    manifest: &Manifest,
    registry: &dyn MavenRegistry,
    options: &SuggestOptions,
) -> AmbitResult<Patch> {
    let EcosystemDetails::Maven(details) = &manifest.ecosystem else {
        return Err(ambit_util::errors::AmbitError::Generic {
            message: "suggester currently supports Maven manifests only".to_string(),
        }
        .into());
    };

    let mut candidates: Vec<&Requirement> = manifest.requirements.iter().collect();
    candidates.extend(details.requirements_for_updates.iter());

    let mut updates = Vec::new();
    for requirement in candidates {
        if options.upgrade_config.level_for(&requirement.name) == UpgradeLevel::None {
            continue;
        }
        if options.ignore_dev
            && manifest
                .groups_for(&requirement.key())
                .iter()
                .any(|g| g == "test")
        {
            continue;
        }
        // Unresolved property placeholders cannot be compared or patched.
        if requirement.name.contains("${") || requirement.constraint.contains("${") {
            continue;
        }
        let Some((group_id, artifact_id)) = requirement.name.split_once(':') else {
            continue;
        };

        let known = registry.versions(group_id, artifact_id)?;
        if known.is_empty() {
            continue;
        }
        let known: Vec<MavenVersion> = known.iter().map(|v| MavenVersion::parse(v)).collect();

        let range = VersionRange::parse(&requirement.constraint);
        let current = match &range {
            Some(range) => match known.iter().filter(|v| range.contains(v)).max() {
                Some(v) => v.clone(),
                None => {
                    tracing::debug!(
                        "No known version of {} satisfies {}",
                        requirement.name,
                        requirement.constraint
                    );
                    continue;
                }
            },
            None => MavenVersion::parse(&requirement.constraint),
        };

        let level = options.upgrade_config.level_for(&requirement.name);
        let best = known
            .iter()
            .filter(|v| **v >= current)
            .filter(|v| level.allows(classify(&current, v)))
            .max();
        let Some(best) = best else {
            continue;
        };
        if *best == current {
            continue;
        }

        // A still-satisfied range keeps its text, so there is nothing to
        // rewrite; otherwise the literal new version replaces it.
        let replacement = match &range {
            Some(range) if range.contains(best) => continue,
            Some(_) => best.raw.clone(),
            None => best.raw.clone(),
        };
        if replacement == requirement.constraint {
            continue;
        }

        // Only bumps that exist in the caller's own POM become updates;
        // dependencies inherited from parents are not ours to edit.
        let in_base = requirement.origin == "parent"
            || details
                .original_requirements
                .iter()
                .any(|o| o.key.name == requirement.name && o.file_path == manifest.file_path);
        if !in_base {
            continue;
        }

        updates.push(PackageUpdate {
            name: requirement.name.clone(),
            version_from: requirement.constraint.clone(),
            version_to: replacement,
            purl_from: maven_purl(group_id, artifact_id, &requirement.constraint),
            purl_to: maven_purl(group_id, artifact_id, &best.raw),
            transitive: false,
            dep_type: requirement.origin.clone(),
        });
    }

    Ok(Patch {
        updates,
        fixed: Vec::new(),
        introduced: Vec::new(),
    })
}

fn maven_purl(group_id: &str, artifact_id: &str, version: &str) -> String {
    format!("pkg:maven/{group_id}/{artifact_id}@{version}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambit_manifest::model::{
        DependencyWithOrigin, Manifest, MavenDetails, RequirementKey,
    };
    use ambit_maven::registry::MemRegistry;
    use std::path::PathBuf;

    fn manifest(requirements: Vec<Requirement>) -> Manifest {
        let originals = requirements
            .iter()
            .map(|r| DependencyWithOrigin {
                key: RequirementKey::named(&r.name),
                version: r.constraint.clone(),
                origin: r.origin.clone(),
                file_path: PathBuf::from("pom.xml"),
            })
            .collect();
        Manifest {
            file_path: PathBuf::from("pom.xml"),
            root: Requirement::new("com.example:app", "1.0.0"),
            requirements,
            groups: Default::default(),
            local_manifests: Vec::new(),
            ecosystem: EcosystemDetails::Maven(MavenDetails {
                original_requirements: originals,
                ..Default::default()
            }),
        }
    }

    fn registry() -> MemRegistry {
        MemRegistry::new()
            .with_versions("org.example", "abc", &["1.0.0", "1.0.2", "1.2.0", "2.0.0"])
            .with_versions("junit", "junit", &["4.13.2", "4.14.0"])
    }

    #[test]
    fn suggests_up_to_the_allowed_level() {
        let m = manifest(vec![Requirement::new("org.example:abc", "1.0.0")]);
        let registry = registry();

        let patch = suggest(
            &m,
            &registry,
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Minor),
            },
        )
        .unwrap();
        assert_eq!(patch.updates.len(), 1);
        assert_eq!(patch.updates[0].version_to, "1.2.0");

        let patch = suggest(
            &m,
            &registry,
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Major),
            },
        )
        .unwrap();
        assert_eq!(patch.updates[0].version_to, "2.0.0");

        let patch = suggest(
            &m,
            &registry,
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Patch),
            },
        )
        .unwrap();
        assert_eq!(patch.updates[0].version_to, "1.0.2");
    }

    #[test]
    fn none_level_and_unresolved_properties_are_skipped() {
        let m = manifest(vec![
            Requirement::new("org.example:abc", "${abc.version}"),
            Requirement::new("junit:junit", "4.13.2"),
        ]);
        let patch = suggest(
            &m,
            &registry(),
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Major)
                    .set("junit:junit", UpgradeLevel::None),
            },
        )
        .unwrap();
        assert!(patch.updates.is_empty());
    }

    #[test]
    fn ignore_dev_skips_test_group() {
        let mut m = manifest(vec![Requirement::new("junit:junit", "4.13.2")]);
        m.groups
            .insert(RequirementKey::named("junit:junit"), vec!["test".into()]);

        let opts = |ignore_dev| SuggestOptions {
            ignore_dev,
            upgrade_config: UpgradeConfig::new(UpgradeLevel::Major),
        };
        assert!(suggest(&m, &registry(), &opts(true)).unwrap().updates.is_empty());
        assert_eq!(suggest(&m, &registry(), &opts(false)).unwrap().updates.len(), 1);
    }

    #[test]
    fn satisfied_range_is_left_alone() {
        let m = manifest(vec![Requirement::new("org.example:abc", "[1.0,3.0)")]);
        let patch = suggest(
            &m,
            &registry(),
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Major),
            },
        )
        .unwrap();
        // 2.0.0 still satisfies [1.0,3.0): no rewrite suggested.
        assert!(patch.updates.is_empty());
    }

    #[test]
    fn outgrown_range_becomes_a_literal() {
        let m = manifest(vec![Requirement::new("org.example:abc", "[1.0,1.1)")]);
        let patch = suggest(
            &m,
            &registry(),
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Major),
            },
        )
        .unwrap();
        assert_eq!(patch.updates.len(), 1);
        assert_eq!(patch.updates[0].version_from, "[1.0,1.1)");
        assert_eq!(patch.updates[0].version_to, "2.0.0");
    }

    #[test]
    fn inherited_dependencies_are_not_emitted() {
        let mut m = manifest(vec![Requirement::new("org.example:abc", "1.0.0")]);
        if let EcosystemDetails::Maven(details) = &mut m.ecosystem {
            details.original_requirements[0].file_path = PathBuf::from("../parent/pom.xml");
        }
        let patch = suggest(
            &m,
            &registry(),
            &SuggestOptions {
                ignore_dev: false,
                upgrade_config: UpgradeConfig::new(UpgradeLevel::Major),
            },
        )
        .unwrap();
        assert!(patch.updates.is_empty());
    }

    #[test]
    fn suggester_is_idempotent() {
        let m = manifest(vec![
            Requirement::new("org.example:abc", "1.0.0"),
            Requirement::new("junit:junit", "4.13.2"),
        ]);
        let registry = registry();
        let opts = SuggestOptions {
            ignore_dev: false,
            upgrade_config: UpgradeConfig::new(UpgradeLevel::Major),
        };
        let first = suggest(&m, &registry, &opts).unwrap();
        let second = suggest(&m, &registry, &opts).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.updates.len(), 2);
    }
}
