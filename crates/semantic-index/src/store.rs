//! Embedding Store: vectors plus a positionally aligned identifier column.
//!
//! Row `i` of the vectors and entry `i` of the ids always describe the same
//! candidate. The store can only be constructed through validating
//! constructors, so that alignment cannot be broken by reordering or
//! filtering one side on its own.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use core_types::{CandidateId, Embedding};
use serde::{Deserialize, Serialize};

use crate::artifacts::{
    commit_pair, ensure_parent, mapping_fingerprint, read_mapping, tmp_path, write_mapping_to,
};
use crate::error::{BuildError, LoadError, io_err, load_io_err};

/// On-disk layout of the embedding matrix.
#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingMatrix {
    rows: u64,
    dimension: u64,
    /// Fingerprint of the id column written alongside this matrix.
    ids_fingerprint: u64,
    data: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingStore {
    ids: Vec<CandidateId>,
    vectors: Vec<Embedding>,
    dimension: usize,
}

impl EmbeddingStore {
    /// Pair ids with vectors. Fails on empty input, uneven lengths, or ragged vectors.
    pub fn new(ids: Vec<CandidateId>, vectors: Vec<Embedding>) -> Result<Self, BuildError> {
        if vectors.is_empty() {
            return Err(BuildError::EmptyInput);
        }
        if ids.len() != vectors.len() {
            return Err(BuildError::IdCountMismatch {
                vectors: vectors.len(),
                ids: ids.len(),
            });
        }
        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(BuildError::ZeroDimension);
        }
        if let Some((position, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(BuildError::DimensionMismatch {
                position,
                expected: dimension,
                actual: v.len(),
            });
        }
        Ok(Self {
            ids,
            vectors,
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn ids(&self) -> &[CandidateId] {
        &self.ids
    }

    pub fn vectors(&self) -> &[Embedding] {
        &self.vectors
    }

    /// Iterate `(id, vector)` pairs in position order.
    pub fn iter(&self) -> impl Iterator<Item = (&CandidateId, &Embedding)> {
        self.ids.iter().zip(&self.vectors)
    }

    pub fn into_parts(self) -> (Vec<CandidateId>, Vec<Embedding>) {
        (self.ids, self.vectors)
    }

    /// Persist the matrix (bincode) and the id column (JSON array).
    ///
    /// Both files are staged and synced first, then swapped in together; a
    /// failed save leaves the previous pair untouched.
    pub fn save(&self, embeddings_path: &Path, ids_path: &Path) -> Result<(), BuildError> {
        ensure_parent(embeddings_path)?;
        ensure_parent(ids_path)?;

        let matrix = EmbeddingMatrix {
            rows: self.len() as u64,
            dimension: self.dimension as u64,
            ids_fingerprint: mapping_fingerprint(&self.ids),
            data: self.vectors.iter().flatten().copied().collect(),
        };
        let embeddings_tmp = tmp_path(embeddings_path);
        let ids_tmp = tmp_path(ids_path);

        let staged = (|| {
            let file = File::create(&embeddings_tmp).map_err(io_err(&embeddings_tmp))?;
            write_matrix_to(file, &matrix, &embeddings_tmp)?;
            let file = File::create(&ids_tmp).map_err(io_err(&ids_tmp))?;
            write_mapping_to(file, &self.ids, &ids_tmp)
        })();
        if let Err(err) = staged {
            let _ = fs::remove_file(&embeddings_tmp);
            let _ = fs::remove_file(&ids_tmp);
            return Err(err);
        }
        commit_pair((&embeddings_tmp, embeddings_path), (&ids_tmp, ids_path))?;

        tracing::debug!(
            rows = self.len(),
            dimension = self.dimension,
            embeddings = %embeddings_path.display(),
            ids = %ids_path.display(),
            "embedding store saved"
        );
        Ok(())
    }

    /// Load a store written by [`EmbeddingStore::save`], re-validating alignment.
    pub fn load(embeddings_path: &Path, ids_path: &Path) -> Result<Self, LoadError> {
        if !embeddings_path.exists() {
            return Err(LoadError::MissingArtifact {
                path: embeddings_path.to_path_buf(),
            });
        }
        let file = File::open(embeddings_path).map_err(load_io_err(embeddings_path))?;
        let matrix: EmbeddingMatrix = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| LoadError::InvalidStore(format!("{}: {e}", embeddings_path.display())))?;

        let rows = usize::try_from(matrix.rows)
            .map_err(|_| LoadError::InvalidStore("row count overflows usize".into()))?;
        let dimension = usize::try_from(matrix.dimension)
            .map_err(|_| LoadError::InvalidStore("dimension overflows usize".into()))?;
        if dimension == 0 || rows.checked_mul(dimension) != Some(matrix.data.len()) {
            return Err(LoadError::InvalidStore(format!(
                "matrix header says {rows}x{dimension} but holds {} floats",
                matrix.data.len()
            )));
        }

        let ids = read_mapping(ids_path)?;
        if mapping_fingerprint(&ids) != matrix.ids_fingerprint {
            return Err(LoadError::InvalidStore(format!(
                "{} was not written with {}",
                ids_path.display(),
                embeddings_path.display()
            )));
        }
        let vectors: Vec<Embedding> = matrix
            .data
            .chunks_exact(dimension)
            .map(<[f32]>::to_vec)
            .collect();

        Self::new(ids, vectors).map_err(|e| LoadError::InvalidStore(e.to_string()))
    }
}

fn write_matrix_to(file: File, matrix: &EmbeddingMatrix, path: &Path) -> Result<(), BuildError> {
    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, matrix).map_err(|e| BuildError::Encode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    writer.flush().map_err(io_err(path))?;
    let file = writer.into_inner().map_err(|e| BuildError::Io {
        path: path.to_path_buf(),
        source: e.into_error(),
    })?;
    file.sync_all().map_err(io_err(path))
}
