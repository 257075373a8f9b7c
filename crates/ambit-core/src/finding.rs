//! Findings: a detector's claim that an advisory applies to a target.

use serde::{Deserialize, Serialize};

use crate::inventory::Package;

/// Severity of an advisory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

/// A publisher-referenced description of a vulnerability or policy
/// violation.
///
/// Two advisories are the *same advisory* iff their `(publisher,
/// reference)` pair matches; the detector runner requires that equal
/// identities carry byte-identical bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    /// Issuing authority, e.g. `CVE`, `GHSA`, or a policy name.
    pub publisher: String,
    /// Stable reference within the publisher's namespace, e.g. `CVE-2024-1234`.
    pub reference: String,
    pub title: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Advisory {
    /// The wire identity of this advisory.
    pub fn id(&self) -> (&str, &str) {
        (&self.publisher, &self.reference)
    }
}

/// What a finding points at: a package from the inventory or a bare
/// location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Package(Package),
    Location(String),
}

/// A detector's claim that an advisory applies to a target in scope of the
/// scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Required by the detector runner; a finding without an advisory (or
    /// with an empty identity) is a fatal scan error.
    pub advisory: Option<Advisory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Target>,
    /// Names of the detectors that reported this finding. Populated by the
    /// detector runner during deduplication.
    #[serde(default)]
    pub detectors: Vec<String>,
}

impl Finding {
    pub fn new(advisory: Advisory) -> Self {
        Self {
            advisory: Some(advisory),
            target: None,
            detectors: Vec::new(),
        }
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }
}
