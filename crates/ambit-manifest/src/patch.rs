//! Patch result types and their total ordering.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::Ecosystem;
use crate::version;

/// One version bump inside a patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageUpdate {
    pub name: String,
    pub version_from: String,
    pub version_to: String,
    pub purl_from: String,
    pub purl_to: String,
    /// Whether the bump targets a transitive dependency rather than a
    /// direct requirement.
    pub transitive: bool,
    /// Ecosystem origin tag (Maven: `""`, `management`, `profile@<id>`,
    /// `plugin@<coord>`, `parent@<path>`); routes writer edits.
    pub dep_type: String,
}

/// A bundle of version updates together with the advisories it fixes and
/// the ones it newly introduces.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Patch {
    pub updates: Vec<PackageUpdate>,
    pub fixed: Vec<String>,
    pub introduced: Vec<String>,
}

impl Patch {
    /// Net number of advisories this patch resolves.
    fn net_fixed(&self) -> i64 {
        self.fixed.len() as i64 - self.introduced.len() as i64
    }

    /// Total order over patches: most effective first.
    ///
    /// 1. effectiveness ratio `net_fixed / |updates|`, descending
    ///    (cross-multiplied to stay in integers);
    /// 2. `|fixed|`, descending;
    /// 3. `|updates|`, ascending;
    /// 4. sorted update names, ascending lexicographic, element-wise;
    /// 5. per-update target version under the ecosystem's dialect.
    pub fn compare(&self, other: &Patch, ecosystem: Ecosystem) -> Ordering {
        // net_a / len_a  vs  net_b / len_b, descending. An empty patch has
        // ratio zero.
        let (net_a, len_a) = (self.net_fixed(), self.updates.len().max(1) as i64);
        let (net_b, len_b) = (other.net_fixed(), other.updates.len().max(1) as i64);
        let ord = (net_b * len_a).cmp(&(net_a * len_b));
        if ord != Ordering::Equal {
            return ord;
        }

        let ord = other.fixed.len().cmp(&self.fixed.len());
        if ord != Ordering::Equal {
            return ord;
        }

        let ord = self.updates.len().cmp(&other.updates.len());
        if ord != Ordering::Equal {
            return ord;
        }

        let mut names_a: Vec<&str> = self.updates.iter().map(|u| u.name.as_str()).collect();
        let mut names_b: Vec<&str> = other.updates.iter().map(|u| u.name.as_str()).collect();
        names_a.sort_unstable();
        names_b.sort_unstable();
        let ord = names_a.cmp(&names_b);
        if ord != Ordering::Equal {
            return ord;
        }

        for (a, b) in self.updates.iter().zip(&other.updates) {
            let ord = version::compare(ecosystem, &a.version_to, &b.version_to);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(name: &str, to: &str) -> PackageUpdate {
        PackageUpdate {
            name: name.to_string(),
            version_from: "1.0.0".to_string(),
            version_to: to.to_string(),
            purl_from: format!("pkg:npm/{name}@1.0.0"),
            purl_to: format!("pkg:npm/{name}@{to}"),
            transitive: false,
            dep_type: String::new(),
        }
    }

    fn patch(fixed: usize, introduced: usize, updates: Vec<PackageUpdate>) -> Patch {
        Patch {
            updates,
            fixed: (0..fixed).map(|i| format!("CVE-{i}")).collect(),
            introduced: (0..introduced).map(|i| format!("CVE-NEW-{i}")).collect(),
        }
    }

    #[test]
    fn higher_effectiveness_sorts_first() {
        // 2 fixed with 1 update beats 2 fixed with 2 updates.
        let a = patch(2, 0, vec![update("a", "2.0.0")]);
        let b = patch(2, 0, vec![update("a", "2.0.0"), update("b", "2.0.0")]);
        assert_eq!(a.compare(&b, Ecosystem::Npm), Ordering::Less);
        assert_eq!(b.compare(&a, Ecosystem::Npm), Ordering::Greater);
    }

    #[test]
    fn introduced_vulns_reduce_effectiveness() {
        let clean = patch(2, 0, vec![update("a", "2.0.0")]);
        let dirty = patch(2, 1, vec![update("a", "2.0.0")]);
        assert_eq!(clean.compare(&dirty, Ecosystem::Npm), Ordering::Less);
    }

    #[test]
    fn more_fixed_wins_at_equal_ratio() {
        // Ratios equal (2/1 vs 4/2), more absolute fixes first.
        let small = patch(2, 0, vec![update("a", "2.0.0")]);
        let large = patch(4, 0, vec![update("a", "2.0.0"), update("b", "2.0.0")]);
        assert_eq!(large.compare(&small, Ecosystem::Npm), Ordering::Less);
    }

    #[test]
    fn names_break_ties() {
        let a = patch(1, 0, vec![update("aardvark", "2.0.0")]);
        let b = patch(1, 0, vec![update("zebra", "2.0.0")]);
        assert_eq!(a.compare(&b, Ecosystem::Npm), Ordering::Less);
    }

    #[test]
    fn target_version_breaks_final_ties() {
        let older = patch(1, 0, vec![update("a", "1.9.0")]);
        let newer = patch(1, 0, vec![update("a", "1.10.0")]);
        // Semver-aware: 1.10.0 > 1.9.0, ascending order puts 1.9.0 first.
        assert_eq!(older.compare(&newer, Ecosystem::Npm), Ordering::Less);
    }

    #[test]
    fn compare_is_a_total_order() {
        let patches = vec![
            patch(3, 0, vec![update("a", "2.0.0")]),
            patch(2, 0, vec![update("b", "2.0.0")]),
            patch(2, 1, vec![update("c", "2.0.0")]),
            patch(1, 0, vec![update("a", "1.5.0"), update("b", "1.5.0")]),
            patch(0, 0, vec![]),
        ];

        for a in &patches {
            // Reflexive
            assert_eq!(a.compare(a, Ecosystem::Npm), Ordering::Equal);
            for b in &patches {
                // Antisymmetric
                assert_eq!(
                    a.compare(b, Ecosystem::Npm),
                    b.compare(a, Ecosystem::Npm).reverse()
                );
                for c in &patches {
                    // Transitive: a <= b && b <= c => a <= c
                    if a.compare(b, Ecosystem::Npm) != Ordering::Greater
                        && b.compare(c, Ecosystem::Npm) != Ordering::Greater
                    {
                        assert_ne!(a.compare(c, Ecosystem::Npm), Ordering::Greater);
                    }
                }
            }
        }
    }
}
