//! Offline pipeline that turns candidate profiles into published index artifacts.

pub mod pipeline;
pub mod profile;

pub use pipeline::{StageCounts, build_stage, embed_stage, export_stage, run_all};
pub use profile::{CandidateProfile, Education, Experience};
