//! Error taxonomy for the offline build, service startup, search, and embedding.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal to the build step. Raised before any artifact is touched unless the
/// failure happens while writing, in which case nothing is published.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("cannot build an index from zero vectors")]
    EmptyInput,
    #[error("vector at position {position} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },
    #[error("identifier count {ids} does not match vector count {vectors}")]
    IdCountMismatch { vectors: usize, ids: usize },
    #[error("vectors must have a non-zero dimension")]
    ZeroDimension,
    #[error("buffer of {len} floats is not a multiple of dimension {dimension}")]
    RaggedBuffer { len: usize, dimension: usize },
    #[error("failed to encode artifact {path}: {reason}")]
    Encode { path: PathBuf, reason: String },
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Fatal to service initialization: the service never becomes ready.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("artifact {path} does not exist")]
    MissingArtifact { path: PathBuf },
    #[error("index artifact {path} is unreadable: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },
    #[error("identifier mapping {path} is unreadable: {reason}")]
    CorruptMapping { path: PathBuf, reason: String },
    #[error("identifier mapping has {mapping} entries but the index holds {index} vectors")]
    MappingLengthMismatch { index: usize, mapping: usize },
    #[error("identifier mapping does not belong to this index build")]
    MappingFingerprintMismatch,
    #[error("embedding store is inconsistent: {0}")]
    InvalidStore(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Scoped to a single search call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("query vector has dimension {actual}, index dimension is {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("top_n must be at least 1")]
    InvalidTopN,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedError {
    #[error("embedding dimension must be non-zero")]
    ZeroDimension,
    #[error("embedder produced dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("embedding backend failed: {0}")]
    Backend(String),
    #[error("embedder version is pinned to {pinned:?} but the backend reports {actual:?}")]
    VersionPin { pinned: String, actual: String },
}

pub(crate) fn io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> BuildError {
    let path = path.into();
    move |source| BuildError::Io { path, source }
}

pub(crate) fn load_io_err(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LoadError {
    let path = path.into();
    move |source| LoadError::Io { path, source }
}
