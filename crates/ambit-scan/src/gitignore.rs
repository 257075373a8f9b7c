//! Stack of gitignore pattern sets scoped to the directory being walked.
//!
//! On entering a directory the walker parses any `.gitignore` found there
//! and pushes the compiled set; on leaving it pops. Matching consults the
//! stack from the deepest frame outward so rules closer to a path win, and
//! within one file the `ignore` crate already applies last-match-wins.

use std::io::Read;

use ambit_fs::FileSystem;
use ignore::gitignore::{Gitignore, GitignoreBuilder};

struct Frame {
    /// Directory (scan-relative) the `.gitignore` lives in.
    dir: String,
    matcher: Gitignore,
}

#[derive(Default)]
pub struct GitignoreStack {
    frames: Vec<Frame>,
}

impl GitignoreStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `dir/.gitignore` if present and push its pattern set.
    /// Returns `true` if a frame was pushed; the caller must pair it with
    /// [`pop`](Self::pop) when leaving the directory.
    pub fn push_dir(&mut self, fs: &dyn FileSystem, dir: &str) -> bool {
        let gitignore_path = ambit_util::paths::join(dir, ".gitignore");
        let mut contents = String::new();
        match fs.open(&gitignore_path) {
            Ok(mut reader) => {
                if let Err(e) = reader.read_to_string(&mut contents) {
                    tracing::debug!("Unreadable {gitignore_path}: {e}");
                    return false;
                }
            }
            Err(_) => return false,
        }

        let mut builder = GitignoreBuilder::new("");
        for line in contents.lines() {
            // An invalid glob poisons only its own line.
            if let Err(e) = builder.add_line(None, line) {
                tracing::debug!("Bad pattern in {gitignore_path}: {e}");
            }
        }
        match builder.build() {
            Ok(matcher) => {
                self.frames.push(Frame {
                    dir: dir.to_string(),
                    matcher,
                });
                true
            }
            Err(e) => {
                tracing::debug!("Failed to compile {gitignore_path}: {e}");
                false
            }
        }
    }

    pub fn pop(&mut self) {
        self.frames.pop();
    }

    /// Whether `path` (scan-relative) is ignored by any frame in scope.
    ///
    /// Frames are consulted deepest-first; the first frame with a definite
    /// answer (ignore or whitelist) decides.
    pub fn matches(&self, path: &str, is_dir: bool) -> bool {
        for frame in self.frames.iter().rev() {
            // A frame only sees paths under its own directory.
            let rel = if frame.dir == "." {
                path
            } else {
                match path.strip_prefix(&format!("{}/", frame.dir)) {
                    Some(rel) => rel,
                    None => continue,
                }
            };
            let matched = frame.matcher.matched(rel, is_dir);
            if matched.is_ignore() {
                return true;
            }
            if matched.is_whitelist() {
                return false;
            }
        }
        false
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
