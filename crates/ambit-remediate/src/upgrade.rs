//! Per-package upgrade policy.

use std::collections::HashMap;

use ambit_manifest::version::MavenVersion;

/// Largest version-component bump the policy allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpgradeLevel {
    /// Never suggest an update.
    None,
    Patch,
    Minor,
    #[default]
    Major,
}

/// How far apart two versions are, by first differing numeric component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bump {
    Major,
    Minor,
    Patch,
}

impl UpgradeLevel {
    pub fn allows(&self, bump: Bump) -> bool {
        match self {
            UpgradeLevel::None => false,
            UpgradeLevel::Patch => bump == Bump::Patch,
            UpgradeLevel::Minor => bump != Bump::Major,
            UpgradeLevel::Major => true,
        }
    }
}

/// Classify the jump from `from` to `to`.
pub fn classify(from: &MavenVersion, to: &MavenVersion) -> Bump {
    if from.numeric_segment(0) != to.numeric_segment(0) {
        Bump::Major
    } else if from.numeric_segment(1) != to.numeric_segment(1) {
        Bump::Minor
    } else {
        Bump::Patch
    }
}

/// Package-keyed upgrade policy with a default level.
#[derive(Debug, Clone, Default)]
pub struct UpgradeConfig {
    default: UpgradeLevel,
    per_package: HashMap<String, UpgradeLevel>,
}

impl UpgradeConfig {
    pub fn new(default: UpgradeLevel) -> Self {
        Self {
            default,
            per_package: HashMap::new(),
        }
    }

    pub fn set(mut self, package: &str, level: UpgradeLevel) -> Self {
        self.per_package.insert(package.to_string(), level);
        self
    }

    pub fn level_for(&self, package: &str) -> UpgradeLevel {
        self.per_package
            .get(package)
            .copied()
            .unwrap_or(self.default)
    }
}
