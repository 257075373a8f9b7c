//! Per-plugin outcome reporting.

use serde::{Deserialize, Serialize};

/// How a plugin fared across one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScanStatus {
    Succeeded,
    PartiallySucceeded,
    Failed,
}

/// Final status line for one plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStatus {
    pub name: String,
    pub version: i32,
    pub status: ScanStatus,
    /// Newline-joined error strings; `None` when the plugin succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl PluginStatus {
    /// Derive a status from the plugin's accumulated errors and whether it
    /// produced any inventory or findings.
    pub fn derive(name: &str, version: i32, errors: &[String], found_results: bool) -> Self {
        let status = if errors.is_empty() {
            ScanStatus::Succeeded
        } else if found_results {
            ScanStatus::PartiallySucceeded
        } else {
            ScanStatus::Failed
        };
        Self {
            name: name.to_string(),
            version,
            status,
            failure_reason: if errors.is_empty() {
                None
            } else {
                Some(errors.join("\n"))
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_law() {
        let ok = PluginStatus::derive("p", 1, &[], false);
        assert_eq!(ok.status, ScanStatus::Succeeded);
        assert!(ok.failure_reason.is_none());

        let partial = PluginStatus::derive("p", 1, &["x: boom".into()], true);
        assert_eq!(partial.status, ScanStatus::PartiallySucceeded);

        let failed = PluginStatus::derive("p", 1, &["x: boom".into(), "y: bust".into()], false);
        assert_eq!(failed.status, ScanStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("x: boom\ny: bust"));
    }
}
