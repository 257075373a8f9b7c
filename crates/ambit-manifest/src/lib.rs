//! Dependency manifest engine.
//!
//! This crate defines the in-memory manifest model shared by every
//! ecosystem, the patch result types with their total ordering, and the
//! readers/writers for Python manifests (requirements.txt, Pipfile,
//! pyproject.toml) and npm lockfiles. The Maven reader/writer lives in
//! `ambit-maven`, which builds on the same model.
//!
//! Writers never mutate the manifest instance they were given; they produce
//! a fully buffered byte vector and commit it to the output path in one
//! step.

pub mod model;
pub mod npm;
pub mod patch;
pub mod python;
pub mod version;
