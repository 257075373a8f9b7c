//! Guided remediation: turn "which dependencies can be bumped, and by how
//! much" into a concrete [`Patch`](ambit_manifest::patch::Patch) against a
//! manifest.

pub mod suggest;
pub mod upgrade;
