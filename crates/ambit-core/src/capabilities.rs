//! Plugin capability declarations and host environment gating.

/// Operating systems a plugin is willing to run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OsSupport {
    #[default]
    Any,
    Linux,
    Mac,
    Windows,
}

/// The operating system of the host running the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostOs {
    Linux,
    Mac,
    Windows,
    Other,
}

impl HostOs {
    /// The OS this binary was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            HostOs::Linux
        } else if cfg!(target_os = "macos") {
            HostOs::Mac
        } else if cfg!(target_os = "windows") {
            HostOs::Windows
        } else {
            HostOs::Other
        }
    }
}

/// What a plugin requires from its host. Immutable per plugin instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct Capabilities {
    /// OS restriction; plugins that do not match the host are filtered out
    /// silently at scan start.
    pub os: OsSupport,
    /// Whether the plugin wants to be invoked on directories, not just files.
    pub extract_from_dirs: bool,
    /// Whether the plugin only makes sense when scanning the running system
    /// (as opposed to an arbitrary mounted tree).
    pub running_system_only: bool,
    /// Per-plugin file size cap in bytes; zero means no cap. Enforced by the
    /// plugin's own `file_required`, not by the walker.
    pub max_file_size: u64,
}

/// Host environment inputs that gate plugin selection.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    pub os: HostOs,
    pub running_system: bool,
}

impl Environment {
    pub fn host() -> Self {
        Self {
            os: HostOs::current(),
            running_system: false,
        }
    }

    /// Whether a plugin with the given capabilities can run here.
    pub fn satisfies(&self, caps: &Capabilities) -> bool {
        let os_ok = match caps.os {
            OsSupport::Any => true,
            OsSupport::Linux => self.os == HostOs::Linux,
            OsSupport::Mac => self.os == HostOs::Mac,
            OsSupport::Windows => self.os == HostOs::Windows,
        };
        os_ok && (!caps.running_system_only || self.running_system)
    }
}
