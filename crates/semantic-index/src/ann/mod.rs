//! Nearest-neighbor backends behind a single ranked-output contract.

pub mod flat;

use core_types::Position;
use serde::{Deserialize, Serialize};

use crate::error::SearchError;

pub use flat::FlatIndex;

/// Distance function an index ranks by. Lower is more similar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Squared Euclidean distance. Monotonic with L2, so ranking matches L2.
    SquaredL2,
}

impl Metric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::SquaredL2 => squared_l2(a, b),
        }
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub position: Position,
    pub distance: f32,
}

/// Read-only similarity structure built once from a finalized Embedding Store.
///
/// Implementations must return `min(top_n, len())` neighbors in non-decreasing
/// distance order, ties broken by ascending position, and must be
/// deterministic for identical inputs.
pub trait SimilarityIndex: Send + Sync {
    fn dimension(&self) -> usize;

    /// Number of indexed vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn metric(&self) -> Metric;

    fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<Neighbor>, SearchError>;
}

/// Sum of squared component differences, accumulated left to right.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
