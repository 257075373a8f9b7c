//! Python manifest readers and writers: requirements.txt, Pipfile, and
//! pyproject.toml.
//!
//! All three writers are line-oriented: the original file is replayed line
//! by line and only the version-specifier spans of patched packages are
//! replaced, so comments, ordering, and whitespace survive untouched.

pub mod pipfile;
pub mod pyproject;
pub mod requirements;

/// PEP 503 name normalisation: lowercase, runs of `-`, `_`, `.` collapse to
/// a single `-`.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_was_sep = false;
    for ch in name.chars() {
        if ch == '-' || ch == '_' || ch == '.' {
            if !last_was_sep {
                out.push('-');
            }
            last_was_sep = true;
        } else {
            out.push(ch.to_ascii_lowercase());
            last_was_sep = false;
        }
    }
    out
}

/// A PEP 508 dependency string picked apart with byte offsets, so writers
/// can splice a new version into the original text.
#[derive(Debug, Clone)]
pub(crate) struct Pep508 {
    /// Name exactly as written.
    pub raw_name: String,
    /// Normalised name used for matching.
    pub name: String,
    /// Byte range of the version-specifier text (empty for a bare name;
    /// start marks the insertion point).
    pub spec_start: usize,
    pub spec_end: usize,
    /// The specifier text itself, trimmed.
    pub specifier: String,
}

/// Tolerantly parse one PEP 508 dependency string.
///
/// Returns `None` for lines that are not dependencies (comments, empty
/// lines, pip options).
pub(crate) fn parse_pep508(s: &str) -> Option<Pep508> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() && (bytes[i] as char).is_whitespace() {
        i += 1;
    }
    if i >= bytes.len() || bytes[i] == b'#' || bytes[i] == b'-' {
        return None;
    }

    let name_start = i;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
            i += 1;
        } else {
            break;
        }
    }
    if i == name_start {
        return None;
    }
    let raw_name = s[name_start..i].to_string();

    // Extras: [security,tests] (whitespace before the bracket is legal)
    let mut probe = i;
    while probe < bytes.len() && (bytes[probe] as char).is_whitespace() {
        probe += 1;
    }
    if probe < bytes.len() && bytes[probe] == b'[' {
        match s[probe..].find(']') {
            Some(close) => i = probe + close + 1,
            None => return None,
        }
    }

    // Whitespace before the operator is preserved by writers.
    while i < bytes.len() && (bytes[i] as char).is_whitespace() {
        i += 1;
    }

    let spec_start = i;
    while i < bytes.len() && bytes[i] != b';' && bytes[i] != b'#' {
        i += 1;
    }
    let mut spec_end = i;
    while spec_end > spec_start && (bytes[spec_end - 1] as char).is_whitespace() {
        spec_end -= 1;
    }

    Some(Pep508 {
        name: normalize_name(&raw_name),
        raw_name,
        spec_start,
        spec_end,
        specifier: s[spec_start..spec_end].to_string(),
    })
}

/// Produce the replacement specifier for a patched package.
///
/// A single-comparator specifier keeps its operator and only swaps the
/// version text; anything else (ranges, bare names) becomes an `==` pin.
pub(crate) fn respecify(old: &str, new_version: &str) -> String {
    let old = old.trim();
    if !old.contains(',') {
        let op_len = old
            .find(|c: char| !matches!(c, '=' | '<' | '>' | '!' | '~'))
            .unwrap_or(old.len());
        let (op, rest) = old.split_at(op_len);
        if !op.is_empty() && !rest.trim().is_empty() {
            let ws_len = rest.len() - rest.trim_start().len();
            return format!("{op}{}{new_version}", &rest[..ws_len]);
        }
    }
    format!("=={new_version}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalisation() {
        assert_eq!(normalize_name("Django"), "django");
        assert_eq!(normalize_name("zope.interface"), "zope-interface");
        assert_eq!(normalize_name("a__b--c..d"), "a-b-c-d");
    }

    #[test]
    fn parses_pinned_requirement() {
        let p = parse_pep508("requests==2.19.1").unwrap();
        assert_eq!(p.name, "requests");
        assert_eq!(p.specifier, "==2.19.1");
    }

    #[test]
    fn parses_extras_markers_and_comments() {
        let line = "  Requests[security] >= 2.19.1 ; python_version >= \"3\"  # keep";
        let p = parse_pep508(line).unwrap();
        assert_eq!(p.name, "requests");
        assert_eq!(p.raw_name, "Requests");
        assert_eq!(p.specifier, ">= 2.19.1");
        assert_eq!(&line[p.spec_start..p.spec_end], ">= 2.19.1");
    }

    #[test]
    fn skips_comments_and_options() {
        assert!(parse_pep508("# a comment").is_none());
        assert!(parse_pep508("-r other.txt").is_none());
        assert!(parse_pep508("").is_none());
    }

    #[test]
    fn bare_name_has_empty_specifier() {
        let p = parse_pep508("flask").unwrap();
        assert_eq!(p.specifier, "");
        assert_eq!(p.spec_start, p.spec_end);
    }

    #[test]
    fn respecify_keeps_single_operator() {
        assert_eq!(respecify("==1.0.0", "2.0.0"), "==2.0.0");
        assert_eq!(respecify(">= 1.0.0", "2.0.0"), ">= 2.0.0");
        assert_eq!(respecify(">=1.0,<2.0", "2.1.0"), "==2.1.0");
        assert_eq!(respecify("", "2.1.0"), "==2.1.0");
    }
}
