use core_types::{CandidateId, Embedding};

use crate::ann::{FlatIndex, SimilarityIndex};
use crate::artifacts::{ArtifactPaths, publish};
use crate::error::BuildError;
use crate::store::EmbeddingStore;

/// Validate vectors and build an exact index over them, in order.
///
/// Fails with [`BuildError::EmptyInput`] for zero vectors and
/// [`BuildError::DimensionMismatch`] when any vector differs in length from
/// the first one.
pub fn build(vectors: &[Embedding]) -> Result<FlatIndex, BuildError> {
    FlatIndex::from_rows(vectors)
}

/// Builds the index and publishes it together with the identifier mapping.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    paths: ArtifactPaths,
    embedder_version: String,
}

impl IndexBuilder {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self {
            paths,
            embedder_version: "unspecified".into(),
        }
    }

    /// Record which embedder produced the vectors.
    pub fn with_embedder_version(mut self, version: impl Into<String>) -> Self {
        self.embedder_version = version.into();
        self
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    /// Build from parallel vector / id sequences and publish both artifacts.
    ///
    /// All validation happens before anything is written, so a failed build
    /// leaves previously published artifacts untouched.
    pub fn build(
        &self,
        vectors: &[Embedding],
        ids: &[CandidateId],
    ) -> Result<FlatIndex, BuildError> {
        let index = build(vectors)?;
        if ids.len() != index.len() {
            return Err(BuildError::IdCountMismatch {
                vectors: index.len(),
                ids: ids.len(),
            });
        }
        publish(&index, ids, &self.embedder_version, &self.paths)?;
        Ok(index)
    }

    pub fn build_from_store(&self, store: &EmbeddingStore) -> Result<FlatIndex, BuildError> {
        tracing::info!(
            candidates = store.len(),
            dimension = store.dimension(),
            "building exact index from embedding store"
        );
        self.build(store.vectors(), store.ids())
    }
}
