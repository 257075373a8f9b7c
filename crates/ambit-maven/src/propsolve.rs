//! Property-patch solver.
//!
//! Given a version template containing `${name}` placeholders and the
//! target version string, work out what each property must become so that
//! interpolating the template yields the target. Used by the writer to
//! prefer property edits over direct `<version>` edits.

/// One `name = value` assignment produced by the solver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: String,
}

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Literal(String),
    Placeholder(String),
}

fn tokenize(template: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            tokens.push(Token::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find('}')?;
        tokens.push(Token::Placeholder(after[..end].to_string()));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest.to_string()));
    }
    Some(tokens)
}

/// Solve `template` against `target`, walking left to right.
///
/// For each placeholder, the literal fragment between it and the next
/// placeholder must occur exactly once in the remaining target; the
/// enclosed substring becomes the assignment. Fails on non-matching
/// prefixes/suffixes, ambiguous literals, or a placeholder assigned two
/// different values.
pub fn solve(template: &str, target: &str) -> Option<Vec<Assignment>> {
    let tokens = tokenize(template)?;
    if !tokens.iter().any(|t| matches!(t, Token::Placeholder(_))) {
        return None;
    }

    let mut assignments: Vec<Assignment> = Vec::new();
    let mut rest = target;
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Literal(lit) => {
                rest = rest.strip_prefix(lit.as_str())?;
                i += 1;
            }
            Token::Placeholder(name) => {
                let value = match tokens.get(i + 1) {
                    Some(Token::Literal(lit)) => {
                        let pos = rest.find(lit.as_str())?;
                        // A second occurrence makes the split ambiguous.
                        if rest[pos + lit.len()..].contains(lit.as_str()) {
                            return None;
                        }
                        let value = &rest[..pos];
                        rest = &rest[pos + lit.len()..];
                        i += 2;
                        value.to_string()
                    }
                    Some(Token::Placeholder(_)) => {
                        // Two adjacent placeholders cannot be split apart.
                        return None;
                    }
                    None => {
                        let value = rest.to_string();
                        rest = "";
                        i += 1;
                        value
                    }
                };
                match assignments.iter().find(|a| a.name == *name) {
                    Some(existing) if existing.value != value => return None,
                    Some(_) => {}
                    None => assignments.push(Assignment {
                        name: name.clone(),
                        value,
                    }),
                }
            }
        }
    }

    if rest.is_empty() {
        Some(assignments)
    } else {
        None
    }
}
