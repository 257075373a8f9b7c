//! Stats hooks for walk observability.
//!
//! The walker reports through an explicit collaborator rather than a
//! process-wide collector; hosts that want metrics implement [`StatsSink`].

/// Snapshot emitted by the periodic status ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkProgress {
    /// Inodes visited since the walk began.
    pub inodes_visited: u64,
    /// Inodes visited since the previous tick.
    pub delta: u64,
    /// Path of the inode most recently visited.
    pub current_path: String,
}

/// Observer for walk progress. Must be thread-safe: `progress` is delivered
/// from the ticker thread while the walk runs.
pub trait StatsSink: Send + Sync {
    /// Called before each inode is handled.
    fn before_inode(&self, _path: &str) {}

    /// Called after each inode is handled.
    fn after_inode(&self, _path: &str) {}

    /// Called from the status ticker roughly every two seconds.
    fn progress(&self, _progress: &WalkProgress) {}
}

/// A sink that discards everything.
pub struct NoopStats;

impl StatsSink for NoopStats {}
