//! Per-request orchestration: text → vector → ranked positions → candidate ids.

use std::sync::Arc;

use core_types::CandidateId;
use ipc::{MatchRequest, RequestError};
use semantic_index::{
    EmbedError, Embedder, LoadedArtifacts, SearchError, SimilarityIndex,
};
use thiserror::Error;

use crate::state::StartupError;

/// Failures scoped to one request. The service stays ready afterwards.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error(transparent)]
    InvalidRequest(#[from] RequestError),
    #[error("embedding failed: {0}")]
    Embed(#[from] EmbedError),
    #[error("search failed: {0}")]
    Search(#[from] SearchError),
    #[error("index returned position {0} outside the identifier mapping")]
    PositionOutOfRange(usize),
    #[error("service is not ready")]
    NotReady,
    #[error("match task failed: {0}")]
    TaskFailed(String),
}

impl MatchError {
    pub fn kind(&self) -> &'static str {
        match self {
            MatchError::InvalidRequest(e) => e.kind(),
            MatchError::Embed(_) => "embed_failed",
            MatchError::Search(_) => "search_failed",
            MatchError::PositionOutOfRange(_) => "position_out_of_range",
            MatchError::NotReady => "not_ready",
            MatchError::TaskFailed(_) => "task_failed",
        }
    }
}

/// Loaded index, its identifier mapping, and the embedder used for queries.
///
/// Immutable once constructed; shared across request tasks behind an `Arc`.
pub struct Matcher {
    index: Box<dyn SimilarityIndex>,
    mapping: Vec<CandidateId>,
    embedder: Arc<dyn Embedder>,
    embedder_version: String,
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Matcher")
            .field("indexed", &self.index.len())
            .field("dimension", &self.index.dimension())
            .field("embedder", &self.embedder_version)
            .finish()
    }
}

impl Matcher {
    /// Pair an index with its mapping and a query embedder.
    ///
    /// Rejects a mapping whose length differs from the indexed count and an
    /// embedder whose dimension differs from the index dimension.
    pub fn new(
        index: Box<dyn SimilarityIndex>,
        mapping: Vec<CandidateId>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StartupError> {
        if mapping.len() != index.len() {
            return Err(StartupError::Load(
                semantic_index::LoadError::MappingLengthMismatch {
                    index: index.len(),
                    mapping: mapping.len(),
                },
            ));
        }
        if embedder.dimension() != index.dimension() {
            return Err(StartupError::DimensionMismatch {
                index: index.dimension(),
                embedder: embedder.dimension(),
            });
        }
        let embedder_version = embedder.version().to_string();
        Ok(Self {
            index,
            mapping,
            embedder,
            embedder_version,
        })
    }

    /// Build from loaded artifacts, also requiring the embedder version the
    /// index was built with.
    pub fn from_artifacts(
        loaded: LoadedArtifacts,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StartupError> {
        if loaded.embedder != embedder.version() {
            return Err(StartupError::EmbedderMismatch {
                index: loaded.embedder,
                configured: embedder.version().to_string(),
            });
        }
        Self::new(Box::new(loaded.index), loaded.mapping, embedder)
    }

    pub fn indexed(&self) -> usize {
        self.index.len()
    }

    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    pub fn embedder_version(&self) -> &str {
        &self.embedder_version
    }

    /// Rank candidates for one request, most similar first.
    pub fn match_candidates(&self, req: &MatchRequest) -> Result<Vec<CandidateId>, MatchError> {
        if req.requirement_text.trim().is_empty() {
            return Err(RequestError::EmptyRequirementText.into());
        }
        if req.top_n == 0 {
            return Err(RequestError::InvalidTopN.into());
        }

        let query = self.embedder.embed(&req.requirement_text)?;
        let hits = self.index.search(&query, req.top_n)?;

        hits.iter()
            .map(|hit| {
                self.mapping
                    .get(hit.position)
                    .cloned()
                    .ok_or(MatchError::PositionOutOfRange(hit.position))
            })
            .collect()
    }
}
