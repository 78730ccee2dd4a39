//! Core identifiers and shared lightweight types for talentmatch.
//!
//! These types avoid heavy dependencies so that the index, the wire protocol,
//! and the offline pipeline can all share them. Configuration and the tracing
//! setup live here too, so every binary reads and logs the same way.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row position of a vector inside an Embedding Store / Similarity Index.
pub type Position = usize;

/// Dense embedding vector. Every vector of one index shares a single dimension.
pub type Embedding = Vec<f32>;

/// Number of candidates returned when a request does not say otherwise.
pub const DEFAULT_TOP_N: usize = 20;

/// Opaque candidate identifier. Maps back to a profile record in the primary
/// data store; the index never interprets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CandidateId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CandidateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Exported candidate document: the shape produced by the export stage and
/// consumed by the embed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDocument {
    pub candidate_id: CandidateId,
    pub document: String,
}

pub mod config;
pub mod logging;
