// Compile pipeline: per-record processing stages, the published artifact, and
// the runner that drives one run end to end.

pub mod artifact;
pub mod processing;
pub mod runner;

pub use runner::{Pipeline, PipelineResult};
