//! Text-to-vector conversion.
//!
//! The index only sees vectors; whatever produces them sits behind
//! [`Embedder`]. The same embedder (name, version, dimension) must be used
//! for building and for querying, which is why the build records
//! [`Embedder::version`] in the index artifact.

use core_types::Embedding;

use crate::error::EmbedError;

pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// Stable label identifying model and dimension.
    fn version(&self) -> &str;

    fn embed(&self, text: &str) -> Result<Embedding, EmbedError>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbedError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Fail unless `embedder` reports the `pinned` version label.
/// An empty pin accepts any embedder.
pub fn check_pinned_version(embedder: &dyn Embedder, pinned: &str) -> Result<(), EmbedError> {
    if pinned.is_empty() || embedder.version() == pinned {
        return Ok(());
    }
    Err(EmbedError::VersionPin {
        pinned: pinned.to_string(),
        actual: embedder.version().to_string(),
    })
}

/// Deterministic feature-hashing embedder.
///
/// Each lowercase alphanumeric token is hashed with FNV-1a into one of
/// `dimension` buckets with a hash-derived sign; adjacent token pairs are
/// hashed as well so word order carries some weight. The result is
/// L2-normalized. Text without tokens maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
    version: String,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Result<Self, EmbedError> {
        if dimension == 0 {
            return Err(EmbedError::ZeroDimension);
        }
        Ok(Self {
            dimension,
            version: format!("fnv1a-hash-v1/d{dimension}"),
        })
    }
}

fn fnv1a(bytes: impl IntoIterator<Item = u8>) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbedError> {
        let mut v = vec![0.0f32; self.dimension];
        let toks = tokens(text);
        let mut add = |hash: u64, weight: f32| {
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            v[bucket] += sign * weight;
        };

        for tok in &toks {
            add(fnv1a(tok.bytes()), 1.0);
        }
        for pair in toks.windows(2) {
            let joined = pair[0].bytes().chain(std::iter::once(b' ')).chain(pair[1].bytes());
            add(fnv1a(joined), 0.5);
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }
}
