use std::cmp::Ordering;

use core_types::Embedding;
use rayon::prelude::*;

use super::{Metric, Neighbor, SimilarityIndex};
use crate::error::{BuildError, SearchError};

/// Corpora with at least this many stored floats are scored on the rayon pool.
const PARALLEL_SCAN_FLOATS: usize = 1 << 16;

/// Exact (brute-force) index: every query scores every stored vector.
///
/// Vectors live in one row-major buffer; row `i` is the vector inserted at
/// position `i`, so positions line up with the identifier mapping.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    count: usize,
    metric: Metric,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Build from a sequence of equally sized vectors, preserving their order.
    pub fn from_rows(rows: &[Embedding]) -> Result<Self, BuildError> {
        let first = rows.first().ok_or(BuildError::EmptyInput)?;
        let dimension = first.len();
        if dimension == 0 {
            return Err(BuildError::ZeroDimension);
        }

        let mut data = Vec::with_capacity(rows.len() * dimension);
        for (position, row) in rows.iter().enumerate() {
            if row.len() != dimension {
                return Err(BuildError::DimensionMismatch {
                    position,
                    expected: dimension,
                    actual: row.len(),
                });
            }
            data.extend_from_slice(row);
        }

        Ok(Self {
            dimension,
            count: rows.len(),
            metric: Metric::SquaredL2,
            data,
        })
    }

    /// Rebuild from a persisted row-major buffer.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, BuildError> {
        if dimension == 0 {
            return Err(BuildError::ZeroDimension);
        }
        if data.is_empty() {
            return Err(BuildError::EmptyInput);
        }
        if data.len() % dimension != 0 {
            return Err(BuildError::RaggedBuffer {
                len: data.len(),
                dimension,
            });
        }
        Ok(Self {
            dimension,
            count: data.len() / dimension,
            metric: Metric::SquaredL2,
            data,
        })
    }

    /// Row-major view of every stored vector.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn row(&self, position: usize) -> Option<&[f32]> {
        if position >= self.count {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.data[start..start + self.dimension])
    }

    fn score_all(&self, query: &[f32]) -> Vec<Neighbor> {
        let metric = self.metric;
        let score = |(position, row): (usize, &[f32])| Neighbor {
            position,
            distance: metric.distance(query, row),
        };

        if self.data.len() >= PARALLEL_SCAN_FLOATS {
            self.data
                .par_chunks_exact(self.dimension)
                .enumerate()
                .map(score)
                .collect()
        } else {
            self.data
                .chunks_exact(self.dimension)
                .enumerate()
                .map(score)
                .collect()
        }
    }
}

/// Total order used for ranking: distance first, then insertion position.
/// NaN distances (of either sign) rank after every number.
fn rank(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .is_nan()
        .cmp(&b.distance.is_nan())
        .then_with(|| a.distance.total_cmp(&b.distance))
        .then_with(|| a.position.cmp(&b.position))
}

impl SimilarityIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.count
    }

    fn metric(&self) -> Metric {
        self.metric
    }

    fn search(&self, query: &[f32], top_n: usize) -> Result<Vec<Neighbor>, SearchError> {
        if top_n == 0 {
            return Err(SearchError::InvalidTopN);
        }
        if query.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        // Oversized requests are clamped to the corpus, not rejected.
        let k = top_n.min(self.count);
        let mut scored = self.score_all(query);
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, rank);
            scored.truncate(k);
        }
        // `rank` never reports Equal for distinct positions, so this is deterministic.
        scored.sort_unstable_by(rank);
        Ok(scored)
    }
}
