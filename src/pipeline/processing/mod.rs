// Pipeline processing: normalization, merging, windowing and the audit gate

pub mod coverage;
pub mod merge;
pub mod normalize;
pub mod quality_gate;
pub mod window;
