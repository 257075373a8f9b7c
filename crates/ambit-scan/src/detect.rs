//! Detector runner: executes policy detectors over the accumulated package
//! index and enforces the advisory uniqueness law.

use std::collections::HashMap;
use std::sync::Arc;

use ambit_core::cancel::CancelToken;
use ambit_core::finding::Finding;
use ambit_core::inventory::PackageIndex;
use ambit_core::plugin::Detector;
use ambit_core::status::PluginStatus;
use ambit_fs::FileSystem;
use ambit_util::errors::AmbitError;

pub(crate) struct DetectorOutcome {
    pub findings: Vec<Finding>,
    pub statuses: Vec<PluginStatus>,
    /// Advisory invariant violation, if any. Detector statuses are still
    /// reported when this is set; findings are not.
    pub error: Option<AmbitError>,
}

/// Run every detector and deduplicate their findings.
///
/// Two findings with the same `(publisher, reference)` identity must carry
/// equal advisory bodies; a mismatch (or a finding without an identity) is a
/// fatal scan error. Equal findings are emitted once, with every reporting
/// detector's name attached.
pub(crate) fn run_detectors(
    ctx: &CancelToken,
    fs: &dyn FileSystem,
    detectors: &[Arc<dyn Detector>],
    index: &PackageIndex,
) -> DetectorOutcome {
    let mut statuses = Vec::new();
    let mut ordered: Vec<(String, String)> = Vec::new();
    let mut merged: HashMap<(String, String), Finding> = HashMap::new();
    let mut invariant_error: Option<AmbitError> = None;

    for detector in detectors {
        if ctx.is_cancelled() {
            return DetectorOutcome {
                findings: Vec::new(),
                statuses,
                error: Some(AmbitError::Cancelled),
            };
        }

        let mut errors: Vec<String> = Vec::new();
        let mut found = false;
        match detector.scan(ctx, fs, index) {
            Ok(findings) => {
                found = !findings.is_empty();
                for finding in findings {
                    if let Err(e) = merge_finding(detector.name(), finding, &mut ordered, &mut merged)
                    {
                        // Keep the first violation; later ones add nothing.
                        invariant_error.get_or_insert(e);
                    }
                }
            }
            Err(e) => errors.push(e.to_string()),
        }
        statuses.push(PluginStatus::derive(
            detector.name(),
            detector.version(),
            &errors,
            found,
        ));
    }

    if let Some(error) = invariant_error {
        return DetectorOutcome {
            findings: Vec::new(),
            statuses,
            error: Some(error),
        };
    }

    let findings = ordered
        .into_iter()
        .filter_map(|id| merged.remove(&id))
        .collect();
    DetectorOutcome {
        findings,
        statuses,
        error: None,
    }
}

fn merge_finding(
    detector: &str,
    finding: Finding,
    ordered: &mut Vec<(String, String)>,
    merged: &mut HashMap<(String, String), Finding>,
) -> Result<(), AmbitError> {
    let advisory = finding.advisory.as_ref().ok_or_else(|| AmbitError::Detector {
        message: format!("detector {detector} returned a finding without an advisory"),
    })?;
    if advisory.publisher.is_empty() || advisory.reference.is_empty() {
        return Err(AmbitError::Detector {
            message: format!(
                "detector {detector} returned an advisory with an empty identity"
            ),
        });
    }
    let id = (advisory.publisher.clone(), advisory.reference.clone());

    match merged.get_mut(&id) {
        None => {
            let mut finding = finding;
            finding.detectors = vec![detector.to_string()];
            ordered.push(id.clone());
            merged.insert(id, finding);
        }
        Some(existing) => {
            if existing.advisory != finding.advisory {
                return Err(AmbitError::Detector {
                    message: format!(
                        "advisory {}:{} reported with mismatched bodies",
                        id.0, id.1
                    ),
                });
            }
            if !existing.detectors.iter().any(|d| d == detector) {
                existing.detectors.push(detector.to_string());
            }
        }
    }
    Ok(())
}
