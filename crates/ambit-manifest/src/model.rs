//! The in-memory manifest model shared by all ecosystems.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The ecosystems the manifest engine understands. The set is closed;
/// per-ecosystem behavior lives behind matches on this enum rather than an
/// open trait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Maven,
    PyPi,
    Npm,
}

impl Ecosystem {
    /// PURL type component for packages of this ecosystem.
    pub fn purl_type(&self) -> &'static str {
        match self {
            Ecosystem::Maven => "maven",
            Ecosystem::PyPi => "pypi",
            Ecosystem::Npm => "npm",
        }
    }
}

/// Dependency-type bitset.
///
/// A requirement can carry several types at once (e.g. an optional peer
/// dependency in an npm lockfile).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DepTypes(u8);

impl DepTypes {
    pub const PROD: DepTypes = DepTypes(1);
    pub const DEV: DepTypes = DepTypes(1 << 1);
    pub const OPTIONAL: DepTypes = DepTypes(1 << 2);
    pub const PEER: DepTypes = DepTypes(1 << 3);
    pub const TEST: DepTypes = DepTypes(1 << 4);

    pub fn union(self, other: DepTypes) -> DepTypes {
        DepTypes(self.0 | other.0)
    }

    pub fn contains(self, other: DepTypes) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Key identifying a requirement inside a manifest.
///
/// For Maven the artifact type and classifier take part in the identity
/// (the same `group:artifact` can appear as both `jar` and `test-jar`);
/// Python and npm key on the package name alone.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequirementKey {
    /// Package name; `group:artifact` for Maven.
    pub name: String,
    #[serde(default)]
    pub artifact_type: String,
    #[serde(default)]
    pub classifier: String,
}

impl RequirementKey {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            artifact_type: String::new(),
            classifier: String::new(),
        }
    }
}

/// One direct requirement of a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    /// Package name; `group:artifact` for Maven.
    pub name: String,
    /// Version constraint string as written (`1.2.3`, `[1.0,2.0)`,
    /// `>=1.0,<2.0`, `^1.2.0`).
    pub constraint: String,
    #[serde(default)]
    pub dep_types: DepTypes,
    /// Where the requirement was declared; used by writers to route edits.
    /// Empty for plain declarations; Maven uses tags like `management`,
    /// `profile@<id>`, `plugin@<group:artifact>`, `parent@<path>`.
    #[serde(default)]
    pub origin: String,
}

impl Requirement {
    pub fn new(name: &str, constraint: &str) -> Self {
        Self {
            name: name.to_string(),
            constraint: constraint.to_string(),
            dep_types: DepTypes::default(),
            origin: String::new(),
        }
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = origin.to_string();
        self
    }

    pub fn key(&self) -> RequirementKey {
        RequirementKey::named(&self.name)
    }
}

/// A dependency manifest loaded into memory.
///
/// Cloning is deep: every nested slice and map is copied, so a caller may
/// mutate the clone freely without affecting the original.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub file_path: PathBuf,
    /// The project itself, as a concrete name + version.
    pub root: Requirement,
    /// Direct requirements in declaration order.
    pub requirements: Vec<Requirement>,
    /// Group labels (`dev`, `test`, `import`, optional-dependency group
    /// names) keyed by requirement.
    pub groups: BTreeMap<RequirementKey, Vec<String>>,
    /// Paths of further manifests this one pulls in (Maven parents).
    pub local_manifests: Vec<PathBuf>,
    pub ecosystem: EcosystemDetails,
}

impl Manifest {
    pub fn system(&self) -> Ecosystem {
        match &self.ecosystem {
            EcosystemDetails::Maven(_) => Ecosystem::Maven,
            EcosystemDetails::Python => Ecosystem::PyPi,
            EcosystemDetails::Npm(_) => Ecosystem::Npm,
        }
    }

    /// Replace the first requirement with the same package key (ignoring a
    /// `management` origin), or add the requirement to the management
    /// section if no declaration matches.
    pub fn patch_requirement(&mut self, req: Requirement) {
        if let Some(pos) = self.requirements.iter().position(|e| e.name == req.name) {
            let existing = &mut self.requirements[pos];
            let origin = existing
                .origin
                .strip_suffix("management")
                .map(|o| o.trim_end_matches('@').to_string())
                .unwrap_or_else(|| existing.origin.clone());
            *existing = Requirement { origin, ..req };
            return;
        }
        self.requirements.push(req.with_origin("management"));
    }

    /// Group labels for a requirement, if any.
    pub fn groups_for(&self, key: &RequirementKey) -> &[String] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Ecosystem-specific manifest payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EcosystemDetails {
    Maven(MavenDetails),
    Python,
    Npm(NpmDetails),
}

/// Maven coordinate (`group:artifact` + version).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MavenCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
}

impl MavenCoordinate {
    pub fn key(&self) -> String {
        format!("{}:{}", self.group_id, self.artifact_id)
    }
}

impl std::fmt::Display for MavenCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
    }
}

/// A property with the origin it was declared in (`""` for the top level,
/// `profile@<id>`) and the file that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyWithOrigin {
    pub name: String,
    pub value: String,
    pub origin: String,
    pub file_path: PathBuf,
}

/// A dependency exactly as declared in some POM, with its origin and the
/// file it came from. The writer uses these to route edits back to the
/// right element of the right file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyWithOrigin {
    pub key: RequirementKey,
    /// Version string as written, possibly a `${property}` placeholder.
    pub version: String,
    pub origin: String,
    /// POM file the declaration lives in.
    pub file_path: PathBuf,
}

/// Maven-specific manifest payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MavenDetails {
    pub parent: Option<MavenCoordinate>,
    /// Parent POM files in walk order (nearest first).
    pub parent_paths: Vec<PathBuf>,
    pub properties: Vec<PropertyWithOrigin>,
    /// Dependencies exactly as written, pre-interpolation.
    pub original_requirements: Vec<DependencyWithOrigin>,
    /// Requirements that must be updatable but are not part of the resolved
    /// graph: the parent coordinate, import BOMs, profile and plugin deps.
    pub requirements_for_updates: Vec<Requirement>,
    /// Repository URLs declared in `<repositories>`.
    pub repositories: Vec<String>,
}

/// npm-specific manifest payload: the reconstructed node_modules tree.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NpmDetails {
    /// Which lockfileVersion shape the file had (1, 2, or 3).
    pub lockfile_version: u8,
    /// Lockfile key paths (e.g. `node_modules/a/node_modules/b`) of every
    /// installed instance, by resolved package name.
    pub instances: BTreeMap<String, Vec<NpmInstance>>,
}

/// One installed copy of a package inside node_modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpmInstance {
    /// Key inside the lockfile `packages` map (empty for the root).
    pub lock_path: String,
    pub version: String,
    /// On-disk directory name when the package is installed under an alias.
    pub known_as: Option<String>,
}
