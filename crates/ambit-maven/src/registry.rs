//! Registry client contract.
//!
//! The manifest engine never talks to the network itself; the host hands it
//! a client for version listings and BOM imports. [`MemRegistry`] is the
//! in-memory implementation used by tests and offline runs.

use std::collections::HashMap;

use ambit_manifest::model::MavenCoordinate;
use ambit_util::errors::AmbitResult;

use crate::metadata::MavenMetadata;
use crate::pom::Pom;

/// Client for artifact metadata and remote POMs.
pub trait MavenRegistry {
    /// All known versions of `group:artifact`, in registry order.
    fn versions(&self, group_id: &str, artifact_id: &str) -> AmbitResult<Vec<String>>;

    /// Fetch and parse the POM of a coordinate (used for BOM imports).
    /// `None` when the registry does not know the artifact.
    fn fetch_pom(&self, coordinate: &MavenCoordinate) -> AmbitResult<Option<Pom>>;

    /// Make `<repositories>` URLs discovered in a manifest available for
    /// subsequent lookups.
    fn register_repositories(&mut self, _urls: &[String]) {}
}

/// In-memory registry backed by maps.
#[derive(Default)]
pub struct MemRegistry {
    versions: HashMap<String, Vec<String>>,
    poms: HashMap<String, Pom>,
    pub repositories: Vec<String>,
}

impl MemRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_versions(mut self, group_id: &str, artifact_id: &str, versions: &[&str]) -> Self {
        self.versions.insert(
            format!("{group_id}:{artifact_id}"),
            versions.iter().map(|v| v.to_string()).collect(),
        );
        self
    }

    /// Seed from an artifact-level maven-metadata.xml document.
    pub fn with_metadata(self, meta: &MavenMetadata) -> Self {
        let (Some(group), Some(artifact)) = (&meta.group_id, &meta.artifact_id) else {
            return self;
        };
        let versions: Vec<&str> = meta.versions.iter().map(String::as_str).collect();
        self.with_versions(group, artifact, &versions)
    }

    pub fn with_pom(mut self, coordinate: &MavenCoordinate, pom: Pom) -> Self {
        self.poms.insert(coordinate.to_string(), pom);
        self
    }
}

impl MavenRegistry for MemRegistry {
    fn versions(&self, group_id: &str, artifact_id: &str) -> AmbitResult<Vec<String>> {
        Ok(self
            .versions
            .get(&format!("{group_id}:{artifact_id}"))
            .cloned()
            .unwrap_or_default())
    }

    fn fetch_pom(&self, coordinate: &MavenCoordinate) -> AmbitResult<Option<Pom>> {
        Ok(self.poms.get(&coordinate.to_string()).cloned())
    }

    fn register_repositories(&mut self, urls: &[String]) {
        for url in urls {
            if !self.repositories.contains(url) {
                self.repositories.push(url.clone());
            }
        }
    }
}
