//! npm lockfile reader and in-place writer.

pub mod jsonedit;
pub mod lockfile;
pub mod write;

pub use lockfile::{read, read_graph, NpmEdge, NpmGraph, NpmNode};
pub use write::{write, NpmDist, NpmRegistry};
