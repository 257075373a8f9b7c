//! The aggregated output of a scan: packages, secrets, sensitive-data
//! markers, and embedded-filesystem markers.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use ambit_fs::FileSystem;
use ambit_util::errors::AmbitResult;
use serde::{Deserialize, Serialize};

use crate::sensitive::SensitiveData;

/// An installed or declared package discovered by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: String,
    /// Paths that evidence this package, relative to the scan root unless
    /// the caller opted into absolute locations.
    pub locations: Vec<String>,
    /// PURL type component, e.g. `npm`, `maven`, `pypi`, `deb`.
    pub purl_type: String,
    /// Names of the plugins that claimed this package, in invocation order.
    pub plugins: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<EcosystemMetadata>,
}

impl Package {
    pub fn new(name: &str, version: &str, purl_type: &str, location: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            locations: vec![location.to_string()],
            purl_type: purl_type.to_string(),
            plugins: Vec::new(),
            metadata: None,
        }
    }

    /// Package URL of the form `pkg:<type>/<name>@<version>`.
    pub fn purl(&self) -> String {
        format!("pkg:{}/{}@{}", self.purl_type, self.name, self.version)
    }
}

/// Ecosystem-specific metadata attached to a package by its extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EcosystemMetadata {
    /// OSV-style ecosystem + name pair used for advisory matching.
    Osv { ecosystem: String, name: String },
    /// Dependency group labels (`dev`, `test`, `optional`, ...).
    DepGroups(Vec<String>),
    /// Distro release the package database belongs to.
    DistroVersion(String),
}

/// A secret discovered by a detector plugin.
///
/// The payload is opaque to the pipeline; each detector defines its own
/// record shape and the pipeline only routes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secret {
    /// Detector-defined payload kind, e.g. `gcp-api-key`.
    pub kind: String,
    pub payload: serde_json::Value,
    /// Path the secret was found at, relative to the scan root.
    pub location: String,
}

/// Factory that mounts a nested read-only tree discovered during extraction
/// (an archive, a container layer).
pub trait FsMounter {
    fn mount(&self) -> AmbitResult<Box<dyn FileSystem>>;
}

/// A nested filesystem discovered during extraction. The scheduler re-enters
/// these after the main walk of a root completes.
pub struct EmbeddedFsMarker {
    /// Path of the container file inside the scanned tree.
    pub path: String,
    pub mounter: Box<dyn FsMounter>,
    /// Host paths the mount materialised; populated after the inner walk so
    /// the caller can clean them up.
    pub temp_paths: Vec<PathBuf>,
}

impl fmt::Debug for EmbeddedFsMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFsMarker")
            .field("path", &self.path)
            .field("temp_paths", &self.temp_paths)
            .finish_non_exhaustive()
    }
}

/// Append-only container for everything extractors produce.
///
/// `append` concatenates; the container never deduplicates.
#[derive(Debug, Default)]
pub struct Inventory {
    pub packages: Vec<Package>,
    pub secrets: Vec<Secret>,
    pub sensitive_data: Vec<SensitiveData>,
    pub embedded_fs: Vec<EmbeddedFsMarker>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
            && self.secrets.is_empty()
            && self.sensitive_data.is_empty()
            && self.embedded_fs.is_empty()
    }

    /// Concatenate `other` onto this inventory.
    pub fn append(&mut self, other: Inventory) {
        self.packages.extend(other.packages);
        self.secrets.extend(other.secrets);
        self.sensitive_data.extend(other.sensitive_data);
        self.embedded_fs.extend(other.embedded_fs);
    }
}

/// Read-only index over the packages of a completed walk, handed to
/// detectors.
pub struct PackageIndex<'a> {
    packages: &'a [Package],
    by_name: HashMap<&'a str, Vec<usize>>,
}

impl<'a> PackageIndex<'a> {
    pub fn new(packages: &'a [Package]) -> Self {
        let mut by_name: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, pkg) in packages.iter().enumerate() {
            by_name.entry(pkg.name.as_str()).or_default().push(i);
        }
        Self { packages, by_name }
    }

    pub fn all(&self) -> &[Package] {
        self.packages
    }

    pub fn by_name(&self, name: &str) -> Vec<&Package> {
        self.by_name
            .get(name)
            .map(|idxs| idxs.iter().map(|&i| &self.packages[i]).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_concatenates_without_dedup() {
        let mut inv = Inventory::new();
        let mut other = Inventory::new();
        inv.packages.push(Package::new("foo", "1.0.0", "npm", "a"));
        other.packages.push(Package::new("foo", "1.0.0", "npm", "a"));
        inv.append(other);
        assert_eq!(inv.packages.len(), 2);
    }

    #[test]
    fn purl_rendering() {
        let pkg = Package::new("left-pad", "1.3.0", "npm", "package-lock.json");
        assert_eq!(pkg.purl(), "pkg:npm/left-pad@1.3.0");
    }

    #[test]
    fn index_lookup_by_name() {
        let packages = vec![
            Package::new("foo", "1.0.0", "npm", "a"),
            Package::new("bar", "2.0.0", "npm", "b"),
            Package::new("foo", "1.1.0", "npm", "c"),
        ];
        let index = PackageIndex::new(&packages);
        assert_eq!(index.len(), 3);
        let foos = index.by_name("foo");
        assert_eq!(foos.len(), 2);
        assert!(index.by_name("baz").is_empty());
    }
}
