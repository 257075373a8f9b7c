//! Point edits into raw JSON text.
//!
//! The lockfile writer must not disturb formatting, key order, or
//! indentation, so instead of decode/encode round-trips it locates the byte
//! span of a single value by key path and splices the replacement in place.

use std::ops::Range;

struct Scanner<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r')
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    /// Consume a JSON string, returning the content span (without quotes).
    fn string(&mut self) -> Option<Range<usize>> {
        if self.peek()? != b'"' {
            return None;
        }
        self.pos += 1;
        let start = self.pos;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'\\' => self.pos += 2,
                b'"' => {
                    let end = self.pos;
                    self.pos += 1;
                    return Some(start..end);
                }
                _ => self.pos += 1,
            }
        }
        None
    }

    /// Consume any JSON value, returning its full span.
    fn value(&mut self) -> Option<Range<usize>> {
        self.skip_ws();
        let start = self.pos;
        match self.peek()? {
            b'"' => {
                self.string()?;
            }
            b'{' => self.container(b'{', b'}')?,
            b'[' => self.container(b'[', b']')?,
            _ => {
                while self.pos < self.bytes.len()
                    && !matches!(self.bytes[self.pos], b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r')
                {
                    self.pos += 1;
                }
            }
        }
        Some(start..self.pos)
    }

    fn container(&mut self, open: u8, close: u8) -> Option<()> {
        debug_assert_eq!(self.peek(), Some(open));
        let mut depth = 0usize;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b'"' => {
                    self.string()?;
                    continue;
                }
                b if b == open => depth += 1,
                b if b == close => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += 1;
                        return Some(());
                    }
                }
                _ => {}
            }
            self.pos += 1;
        }
        None
    }

    /// Inside an object (cursor just past `{`), walk to the value of `key`.
    fn seek_key(&mut self, key: &str) -> Option<()> {
        loop {
            self.skip_ws();
            match self.peek()? {
                b'}' => return None,
                b',' => {
                    self.pos += 1;
                    continue;
                }
                b'"' => {
                    let span = self.string()?;
                    let found = &self.bytes[span.start..span.end] == key.as_bytes();
                    self.skip_ws();
                    if self.peek()? != b':' {
                        return None;
                    }
                    self.pos += 1;
                    if found {
                        return Some(());
                    }
                    self.value()?;
                }
                _ => return None,
            }
        }
    }
}

/// Byte span of the value reached by following `path` through nested
/// objects, or `None` when any key is absent.
pub fn locate_value(json: &str, path: &[&str]) -> Option<Range<usize>> {
    let mut scanner = Scanner::new(json);
    scanner.skip_ws();
    for key in path {
        if scanner.peek()? != b'{' {
            return None;
        }
        scanner.pos += 1;
        scanner.seek_key(key)?;
        scanner.skip_ws();
    }
    scanner.value()
}

/// Replace the string value at `path` with `new_value`, preserving every
/// other byte. Returns `false` when the path does not resolve.
pub fn replace_string_value(json: &mut String, path: &[&str], new_value: &str) -> bool {
    let Some(span) = locate_value(json, path) else {
        return false;
    };
    let escaped = new_value.replace('\\', "\\\\").replace('"', "\\\"");
    json.replace_range(span, &format!("\"{escaped}\""));
    true
}
