//! Per-ecosystem version parsing and comparison.
//!
//! Maven ordering is not semver. A version string is tokenized on `.` and
//! `-`; numeric tokens compare as numbers, a fixed set of qualifier
//! spellings carries a defined rank (`alpha` < `beta` < `milestone` < `rc`
//! < `snapshot` < release < `sp`), and any other word sorts below a
//! release. A shorter version is padded, so `1.0` equals `1.0.0` while
//! `1.0` beats `1.0-rc`.
//!
//! npm and PyPI versions go through the `semver` crate, with a lenient
//! fallback to string comparison for strings that are not single versions.

use std::cmp::Ordering;
use std::fmt;

use crate::model::Ecosystem;

/// A Maven version, tokenized once so repeated comparisons are cheap.
#[derive(Debug, Clone)]
pub struct MavenVersion {
    /// The string as given.
    pub raw: String,
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Num(u64),
    Tag(Qualifier),
    /// Opaque word, held lowercased; word comparison is case-insensitive.
    Word(String),
}

/// Qualifiers with a defined position on Maven's pre-release scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Qualifier {
    Alpha,
    Beta,
    Milestone,
    ReleaseCandidate,
    Snapshot,
    Release,
    ServicePack,
}

/// Alternate spellings Maven accepts for each ranked qualifier.
const QUALIFIER_SPELLINGS: [(&[&str], Qualifier); 7] = [
    (&["alpha", "a"], Qualifier::Alpha),
    (&["beta", "b"], Qualifier::Beta),
    (&["milestone", "m"], Qualifier::Milestone),
    (&["rc", "cr"], Qualifier::ReleaseCandidate),
    (&["snapshot"], Qualifier::Snapshot),
    (&["", "ga", "final", "release"], Qualifier::Release),
    (&["sp"], Qualifier::ServicePack),
];

fn token_for(piece: &str) -> Token {
    if let Ok(n) = piece.parse::<u64>() {
        return Token::Num(n);
    }
    let lower = piece.to_ascii_lowercase();
    for (spellings, qualifier) in QUALIFIER_SPELLINGS {
        if spellings.contains(&lower.as_str()) {
            return Token::Tag(qualifier);
        }
    }
    Token::Word(lower)
}

impl MavenVersion {
    pub fn parse(raw: &str) -> Self {
        let tokens = raw
            .split(['.', '-'])
            .filter(|piece| !piece.is_empty())
            .map(token_for)
            .collect();
        Self {
            raw: raw.to_string(),
            tokens,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        matches!(self.tokens.last(), Some(Token::Tag(Qualifier::Snapshot)))
    }

    /// Numeric value of token `idx`, treating a missing or non-numeric
    /// token as zero. Used for bump-magnitude classification.
    pub fn numeric_segment(&self, idx: usize) -> u64 {
        match self.tokens.get(idx) {
            Some(Token::Num(n)) => *n,
            _ => 0,
        }
    }
}

impl fmt::Display for MavenVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for MavenVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MavenVersion {}

impl Ord for MavenVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.tokens.len().max(other.tokens.len());
        (0..len)
            .map(|i| compare_pair(self.tokens.get(i), other.tokens.get(i)))
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for MavenVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn compare_pair(a: Option<&Token>, b: Option<&Token>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (Some(token), None) => against_padding(token),
        (None, Some(token)) => against_padding(token).reverse(),
        (Some(Token::Num(x)), Some(Token::Num(y))) => x.cmp(y),
        // Numbers beat qualifiers and words outright.
        (Some(Token::Num(_)), Some(_)) => Ordering::Greater,
        (Some(_), Some(Token::Num(_))) => Ordering::Less,
        (Some(Token::Tag(x)), Some(Token::Tag(y))) => x.cmp(y),
        (Some(Token::Word(x)), Some(Token::Word(y))) => x.cmp(y),
        (Some(Token::Tag(q)), Some(Token::Word(_))) => {
            if *q >= Qualifier::Release {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (Some(Token::Word(_)), Some(Token::Tag(q))) => {
            if *q >= Qualifier::Release {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
    }
}

/// How a token compares against the implicit padding of a shorter
/// version: padding is a zero number, an empty word, and the release point
/// of the qualifier scale all at once.
fn against_padding(token: &Token) -> Ordering {
    match token {
        Token::Num(n) => n.cmp(&0),
        Token::Tag(q) => q.cmp(&Qualifier::Release),
        Token::Word(w) if w.is_empty() => Ordering::Equal,
        Token::Word(_) => Ordering::Less,
    }
}

/// A Maven version range: `[1.0,2.0)`, `[1.0,]`, `(,2.0)`, `[1.5]`.
#[derive(Debug, Clone)]
pub enum VersionRange {
    /// `[1.5]`: exactly one admitted version.
    Exact(MavenVersion),
    /// Interval with optional bounds on either side.
    Between {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
}

#[derive(Debug, Clone)]
pub struct RangeBound {
    pub version: MavenVersion,
    pub inclusive: bool,
}

impl VersionRange {
    /// Parse a Maven range expression. Bare versions are not ranges and
    /// yield `None`.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let open = spec.chars().next()?;
        let close = spec.chars().last()?;
        if !matches!(open, '[' | '(') || !matches!(close, ']' | ')') {
            return None;
        }
        let inner = &spec[1..spec.len() - 1];

        let Some((low, high)) = inner.split_once(',') else {
            return Some(VersionRange::Exact(MavenVersion::parse(inner.trim())));
        };
        let bound = |text: &str, inclusive: bool| {
            let text = text.trim();
            (!text.is_empty()).then(|| RangeBound {
                version: MavenVersion::parse(text),
                inclusive,
            })
        };
        Some(VersionRange::Between {
            lower: bound(low, open == '['),
            upper: bound(high, close == ']'),
        })
    }

    /// Whether `version` satisfies this range.
    pub fn contains(&self, version: &MavenVersion) -> bool {
        match self {
            VersionRange::Exact(exact) => version == exact,
            VersionRange::Between { lower, upper } => {
                let above_lower = lower.as_ref().map_or(true, |bound| {
                    if bound.inclusive {
                        *version >= bound.version
                    } else {
                        *version > bound.version
                    }
                });
                let below_upper = upper.as_ref().map_or(true, |bound| {
                    if bound.inclusive {
                        *version <= bound.version
                    } else {
                        *version < bound.version
                    }
                });
                above_lower && below_upper
            }
        }
    }
}

/// Compare two version strings under an ecosystem's dialect.
///
/// Strings that do not parse as single versions (npm ranges, malformed
/// input) fall back to plain string comparison.
pub fn compare(ecosystem: Ecosystem, a: &str, b: &str) -> Ordering {
    match ecosystem {
        Ecosystem::Maven => MavenVersion::parse(a).cmp(&MavenVersion::parse(b)),
        Ecosystem::Npm | Ecosystem::PyPi => {
            match (semver::Version::parse(a), semver::Version::parse(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> MavenVersion {
        MavenVersion::parse(s)
    }

    #[test]
    fn numbers_compare_numerically() {
        assert!(v("2.9.1") < v("2.10.0"));
        assert!(v("0.9") < v("1.0"));
    }

    #[test]
    fn padding_makes_short_versions_equal() {
        assert_eq!(v("1.2"), v("1.2.0"));
        assert_eq!(v("1.2"), v("1.2.0.0"));
        assert!(v("1.2") < v("1.2.0.1"));
    }

    #[test]
    fn qualifier_scale() {
        let order = ["3.0-alpha", "3.0-beta", "3.0-m", "3.0-rc", "3.0-SNAPSHOT", "3.0", "3.0-sp"];
        for pair in order.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} !< {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn alternate_qualifier_spellings() {
        assert_eq!(v("3.0"), v("3.0.ga"));
        assert_eq!(v("3.0"), v("3.0.final"));
        assert_eq!(v("3.0-cr"), v("3.0-rc"));
    }

    #[test]
    fn words_sort_below_release_and_alphabetically() {
        assert!(v("1.0.0-jre") < v("1.0.0"));
        assert!(v("24.0-android") < v("24.0-jre"));
        assert!(v("24.0-JRE") == v("24.0-jre"));
    }

    #[test]
    fn snapshot_detection() {
        assert!(v("4.1-SNAPSHOT").is_snapshot());
        assert!(!v("4.1").is_snapshot());
        assert!(v("4.1-SNAPSHOT") < v("4.1"));
    }

    #[test]
    fn numeric_segments_for_bump_classification() {
        let version = v("7.3.1");
        assert_eq!(version.numeric_segment(0), 7);
        assert_eq!(version.numeric_segment(1), 3);
        assert_eq!(version.numeric_segment(2), 1);
        assert_eq!(version.numeric_segment(5), 0);
        assert_eq!(v("7.3-rc").numeric_segment(2), 0);
    }

    #[test]
    fn range_with_both_bounds() {
        let range = VersionRange::parse("[2.0,3.0)").unwrap();
        assert!(range.contains(&v("2.0")));
        assert!(range.contains(&v("2.99")));
        assert!(!range.contains(&v("3.0")));
        assert!(!range.contains(&v("1.9")));
    }

    #[test]
    fn range_with_open_sides() {
        let unbounded_above = VersionRange::parse("[5.1,]").unwrap();
        assert!(unbounded_above.contains(&v("99.0")));
        assert!(!unbounded_above.contains(&v("5.0")));

        let unbounded_below = VersionRange::parse("(,5.1)").unwrap();
        assert!(unbounded_below.contains(&v("0.1")));
        assert!(!unbounded_below.contains(&v("5.1")));
    }

    #[test]
    fn exact_range_admits_one_version() {
        let range = VersionRange::parse("[2.4]").unwrap();
        assert!(range.contains(&v("2.4")));
        assert!(range.contains(&v("2.4.0")));
        assert!(!range.contains(&v("2.4.1")));
    }

    #[test]
    fn bare_versions_are_not_ranges() {
        assert!(VersionRange::parse("2.4").is_none());
        assert!(VersionRange::parse("").is_none());
    }

    #[test]
    fn display_round_trips_the_raw_string() {
        assert_eq!(v("1.8.0-beta").to_string(), "1.8.0-beta");
    }

    #[test]
    fn npm_compare_uses_semver() {
        assert_eq!(
            compare(Ecosystem::Npm, "1.10.0", "1.9.0"),
            Ordering::Greater
        );
        // Non-semver strings fall back to string ordering.
        assert_eq!(compare(Ecosystem::Npm, "^1.0.0", "^1.0.0"), Ordering::Equal);
    }

    #[test]
    fn maven_compare_uses_the_dialect() {
        assert_eq!(
            compare(Ecosystem::Maven, "1.0-SNAPSHOT", "1.0"),
            Ordering::Less
        );
        assert_eq!(compare(Ecosystem::Maven, "1.0", "1.0.0"), Ordering::Equal);
    }
}
