//! Semantic candidate index: the Embedding Store, the exact nearest-neighbor
//! index built from it, and the artifacts that carry the index from the
//! offline build to the query service.

pub mod ann;
pub mod artifacts;
pub mod builder;
pub mod embed;
pub mod error;
pub mod store;

pub use ann::{FlatIndex, Metric, Neighbor, SimilarityIndex};
pub use artifacts::{
    ArtifactPaths, ArtifactReport, LoadedArtifacts, inspect_artifacts, load_artifacts, publish,
};
pub use builder::{IndexBuilder, build};
pub use embed::{Embedder, HashingEmbedder, check_pinned_version};
pub use error::{BuildError, EmbedError, LoadError, SearchError};
pub use store::EmbeddingStore;
