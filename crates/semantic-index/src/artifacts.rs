//! Build artifacts: the index blob and the identifier mapping.
//!
//! The two files are always produced together. The index header carries a
//! fingerprint of the mapping it was built with so a stale or foreign mapping
//! is caught at load time even when the lengths happen to agree.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use core_types::CandidateId;
use core_types::config::ResolvedPaths;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::ann::{FlatIndex, Metric, SimilarityIndex};
use crate::error::{BuildError, LoadError, io_err, load_io_err};

const INDEX_MAGIC: [u8; 4] = *b"TMIX";
const INDEX_FORMAT_VERSION: u32 = 1;

/// Where the published index and mapping live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub index: PathBuf,
    pub mapping: PathBuf,
}

impl ArtifactPaths {
    pub fn new(index: impl Into<PathBuf>, mapping: impl Into<PathBuf>) -> Self {
        Self {
            index: index.into(),
            mapping: mapping.into(),
        }
    }

    /// Default file names inside one directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join("candidates.index"), dir.join("candidate_ids.json"))
    }
}

impl From<&ResolvedPaths> for ArtifactPaths {
    fn from(paths: &ResolvedPaths) -> Self {
        Self::new(paths.index.clone(), paths.mapping.clone())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexArtifact {
    magic: [u8; 4],
    format_version: u32,
    metric: Metric,
    dimension: u64,
    count: u64,
    embedder: String,
    mapping_fingerprint: u64,
    data: Vec<f32>,
}

/// Index artifact decoded from disk.
#[derive(Debug)]
pub struct IndexFile {
    pub index: FlatIndex,
    /// Version label of the embedder the vectors came from.
    pub embedder: String,
    pub mapping_fingerprint: u64,
}

/// Index and mapping that passed every startup consistency check.
#[derive(Debug)]
pub struct LoadedArtifacts {
    pub index: FlatIndex,
    pub mapping: Vec<CandidateId>,
    pub embedder: String,
}

/// Operator-facing summary of the published artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactReport {
    pub indexed: usize,
    pub dimension: usize,
    pub embedder: String,
    pub mapping_len: usize,
    pub fingerprint_matches: bool,
}

impl ArtifactReport {
    pub fn is_consistent(&self) -> bool {
        self.indexed == self.mapping_len && self.fingerprint_matches
    }
}

fn codec() -> impl Options {
    bincode::DefaultOptions::new().with_fixint_encoding()
}

/// FNV-1a over every id (with a separator byte) and the id count.
pub fn mapping_fingerprint(ids: &[CandidateId]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    let mut feed = |byte: u8| {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    };
    for id in ids {
        id.as_str().bytes().for_each(&mut feed);
        feed(0xff);
    }
    (ids.len() as u64).to_le_bytes().into_iter().for_each(feed);
    hash
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn backup_path(path: &Path) -> PathBuf {
    sibling(path, ".prev")
}

pub(crate) fn ensure_parent(path: &Path) -> Result<(), BuildError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err(parent))?;
    }
    Ok(())
}

/// Serialize ids as a JSON array of strings and fsync.
pub(crate) fn write_mapping_to(
    file: File,
    ids: &[CandidateId],
    path: &Path,
) -> Result<(), BuildError> {
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, ids).map_err(|e| BuildError::Encode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    writer.flush().map_err(io_err(path))?;
    let file = writer
        .into_inner()
        .map_err(|e| BuildError::Io {
            path: path.to_path_buf(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(io_err(path))
}

/// Rename two staged files over their destinations as one unit.
///
/// The first destination is hard-linked to a `.prev` sibling before it is
/// replaced. If the second rename fails, the first destination is rolled back
/// to that backup (or removed when there was nothing to back up), so readers
/// never see a new first file next to an old second one.
pub(crate) fn commit_pair(
    first: (&Path, &Path),
    second: (&Path, &Path),
) -> Result<(), BuildError> {
    let (first_tmp, first_dest) = first;
    let (second_tmp, second_dest) = second;
    let discard = || {
        let _ = fs::remove_file(first_tmp);
        let _ = fs::remove_file(second_tmp);
    };

    let backup = backup_path(first_dest);
    let _ = fs::remove_file(&backup);
    let had_previous = first_dest.is_file();
    if had_previous {
        fs::hard_link(first_dest, &backup).map_err(|source| {
            discard();
            BuildError::Io {
                path: backup.clone(),
                source,
            }
        })?;
    }

    if let Err(err) = fs::rename(first_tmp, first_dest) {
        discard();
        let _ = fs::remove_file(&backup);
        return Err(BuildError::Io {
            path: first_dest.to_path_buf(),
            source: err,
        });
    }

    if let Err(err) = fs::rename(second_tmp, second_dest) {
        let _ = fs::remove_file(second_tmp);
        let restored = if had_previous {
            fs::rename(&backup, first_dest)
        } else {
            fs::remove_file(first_dest)
        };
        if let Err(rollback) = restored {
            tracing::error!(
                first = %first_dest.display(),
                second = %second_dest.display(),
                error = %rollback,
                "rollback failed; artifacts on disk are inconsistent"
            );
        }
        return Err(BuildError::Io {
            path: second_dest.to_path_buf(),
            source: err,
        });
    }

    let _ = fs::remove_file(&backup);
    Ok(())
}

fn write_index_to(
    file: File,
    index: &FlatIndex,
    embedder: &str,
    fingerprint: u64,
    path: &Path,
) -> Result<(), BuildError> {
    let artifact = IndexArtifact {
        magic: INDEX_MAGIC,
        format_version: INDEX_FORMAT_VERSION,
        metric: index.metric(),
        dimension: index.dimension() as u64,
        count: index.len() as u64,
        embedder: embedder.to_string(),
        mapping_fingerprint: fingerprint,
        data: index.as_slice().to_vec(),
    };
    let mut writer = BufWriter::new(file);
    codec()
        .serialize_into(&mut writer, &artifact)
        .map_err(|e| BuildError::Encode {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    writer.flush().map_err(io_err(path))?;
    let file = writer
        .into_inner()
        .map_err(|e| BuildError::Io {
            path: path.to_path_buf(),
            source: e.into_error(),
        })?;
    file.sync_all().map_err(io_err(path))
}

/// Write both artifacts next to their destinations, then rename them into place.
///
/// Nothing at the destination paths changes unless both temporary files were
/// written and synced successfully and both renames went through.
pub fn publish(
    index: &FlatIndex,
    ids: &[CandidateId],
    embedder: &str,
    paths: &ArtifactPaths,
) -> Result<(), BuildError> {
    if ids.len() != index.len() {
        return Err(BuildError::IdCountMismatch {
            vectors: index.len(),
            ids: ids.len(),
        });
    }
    ensure_parent(&paths.index)?;
    ensure_parent(&paths.mapping)?;

    let index_tmp = tmp_path(&paths.index);
    let mapping_tmp = tmp_path(&paths.mapping);
    let fingerprint = mapping_fingerprint(ids);

    let staged = (|| {
        let file = File::create(&index_tmp).map_err(io_err(&index_tmp))?;
        write_index_to(file, index, embedder, fingerprint, &index_tmp)?;
        let file = File::create(&mapping_tmp).map_err(io_err(&mapping_tmp))?;
        write_mapping_to(file, ids, &mapping_tmp)
    })();
    if let Err(err) = staged {
        let _ = fs::remove_file(&index_tmp);
        let _ = fs::remove_file(&mapping_tmp);
        return Err(err);
    }

    commit_pair((&index_tmp, &paths.index), (&mapping_tmp, &paths.mapping))?;

    tracing::info!(
        vectors = index.len(),
        dimension = index.dimension(),
        embedder,
        index = %paths.index.display(),
        mapping = %paths.mapping.display(),
        "published index artifacts"
    );
    Ok(())
}

/// Decode the index artifact through a read-only memory map.
pub fn read_index(path: &Path) -> Result<IndexFile, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let corrupt = |reason: String| LoadError::CorruptIndex {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(load_io_err(path))?;
    let len = file.metadata().map_err(load_io_err(path))?.len();
    if len == 0 {
        return Err(corrupt("file is empty".into()));
    }
    // SAFETY: build artifacts are replaced by rename, never rewritten in place,
    // so the mapped bytes stay immutable for the lifetime of the map.
    #[allow(unsafe_code)]
    let mmap = unsafe { Mmap::map(&file) }.map_err(load_io_err(path))?;

    let artifact: IndexArtifact = codec()
        .with_limit(len)
        .deserialize(&mmap[..])
        .map_err(|e| corrupt(e.to_string()))?;

    if artifact.magic != INDEX_MAGIC {
        return Err(corrupt("bad magic".into()));
    }
    if artifact.format_version != INDEX_FORMAT_VERSION {
        return Err(corrupt(format!(
            "unsupported format version {} (expected {INDEX_FORMAT_VERSION})",
            artifact.format_version
        )));
    }
    let dimension = usize::try_from(artifact.dimension)
        .map_err(|_| corrupt("dimension overflows usize".into()))?;
    let index =
        FlatIndex::from_raw(dimension, artifact.data).map_err(|e| corrupt(e.to_string()))?;
    if index.len() as u64 != artifact.count {
        return Err(corrupt(format!(
            "header says {} vectors, payload holds {}",
            artifact.count,
            index.len()
        )));
    }

    Ok(IndexFile {
        index,
        embedder: artifact.embedder,
        mapping_fingerprint: artifact.mapping_fingerprint,
    })
}

/// Read an identifier mapping (JSON array of strings).
pub fn read_mapping(path: &Path) -> Result<Vec<CandidateId>, LoadError> {
    if !path.exists() {
        return Err(LoadError::MissingArtifact {
            path: path.to_path_buf(),
        });
    }
    let bytes = fs::read(path).map_err(load_io_err(path))?;
    serde_json::from_slice(&bytes).map_err(|e| LoadError::CorruptMapping {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load both artifacts and enforce the alignment invariant between them.
pub fn load_artifacts(paths: &ArtifactPaths) -> Result<LoadedArtifacts, LoadError> {
    let file = read_index(&paths.index)?;
    let mapping = read_mapping(&paths.mapping)?;

    if mapping.len() != file.index.len() {
        return Err(LoadError::MappingLengthMismatch {
            index: file.index.len(),
            mapping: mapping.len(),
        });
    }
    if mapping_fingerprint(&mapping) != file.mapping_fingerprint {
        return Err(LoadError::MappingFingerprintMismatch);
    }

    Ok(LoadedArtifacts {
        index: file.index,
        mapping,
        embedder: file.embedder,
    })
}

/// Read both artifacts and report on them without rejecting inconsistencies.
pub fn inspect_artifacts(paths: &ArtifactPaths) -> Result<ArtifactReport, LoadError> {
    let file = read_index(&paths.index)?;
    let mapping = read_mapping(&paths.mapping)?;
    Ok(ArtifactReport {
        indexed: file.index.len(),
        dimension: file.index.dimension(),
        embedder: file.embedder,
        mapping_len: mapping.len(),
        fingerprint_matches: mapping_fingerprint(&mapping) == file.mapping_fingerprint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> (FlatIndex, Vec<CandidateId>) {
        let index =
            FlatIndex::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]]).unwrap();
        let ids = ["a", "b", "c"].into_iter().map(CandidateId::from).collect();
        (index, ids)
    }

    #[test]
    fn publish_then_load() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, ids) = sample();
        publish(&index, &ids, "test-embedder", &paths)?;

        let loaded = load_artifacts(&paths)?;
        assert_eq!(loaded.index, index);
        assert_eq!(loaded.mapping, ids);
        assert_eq!(loaded.embedder, "test-embedder");
        assert!(!tmp_path(&paths.index).exists());
        assert!(!tmp_path(&paths.mapping).exists());
        Ok(())
    }

    #[test]
    fn mapping_file_is_a_plain_json_array() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, ids) = sample();
        publish(&index, &ids, "e", &paths)?;
        assert_eq!(fs::read_to_string(&paths.mapping)?, r#"["a","b","c"]"#);
        Ok(())
    }

    #[test]
    fn missing_mapping_is_reported() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, ids) = sample();
        publish(&index, &ids, "e", &paths)?;
        fs::remove_file(&paths.mapping)?;
        assert!(matches!(
            load_artifacts(&paths),
            Err(LoadError::MissingArtifact { path }) if path == paths.mapping
        ));
        Ok(())
    }

    #[test]
    fn short_mapping_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, ids) = sample();
        publish(&index, &ids, "e", &paths)?;
        fs::write(&paths.mapping, r#"["a","b"]"#)?;
        assert!(matches!(
            load_artifacts(&paths),
            Err(LoadError::MappingLengthMismatch {
                index: 3,
                mapping: 2
            })
        ));
        Ok(())
    }

    #[test]
    fn reordered_mapping_is_rejected() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, ids) = sample();
        publish(&index, &ids, "e", &paths)?;
        fs::write(&paths.mapping, r#"["b","a","c"]"#)?;
        assert!(matches!(
            load_artifacts(&paths),
            Err(LoadError::MappingFingerprintMismatch)
        ));

        let report = inspect_artifacts(&paths)?;
        assert_eq!(report.indexed, 3);
        assert_eq!(report.mapping_len, 3);
        assert!(!report.is_consistent());
        Ok(())
    }

    #[test]
    fn garbage_index_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        fs::write(&paths.index, b"not an index at all, definitely not")?;
        fs::write(&paths.mapping, "[]")?;
        assert!(matches!(
            load_artifacts(&paths),
            Err(LoadError::CorruptIndex { .. })
        ));

        fs::write(&paths.index, b"")?;
        assert!(matches!(
            read_index(&paths.index),
            Err(LoadError::CorruptIndex { .. })
        ));
        Ok(())
    }

    #[test]
    fn ragged_payload_is_corrupt() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("index.bin");
        let artifact = IndexArtifact {
            magic: INDEX_MAGIC,
            format_version: INDEX_FORMAT_VERSION,
            metric: Metric::SquaredL2,
            dimension: 3,
            count: 2,
            embedder: "e".into(),
            mapping_fingerprint: 0,
            data: vec![0.0; 7],
        };
        fs::write(&path, codec().serialize(&artifact)?)?;

        match read_index(&path) {
            Err(LoadError::CorruptIndex { reason, .. }) => {
                assert!(reason.contains("not a multiple of dimension 3"), "{reason}");
            }
            other => panic!("expected a corrupt index, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn publish_refuses_misaligned_ids_without_touching_disk() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, mut ids) = sample();
        ids.pop();
        assert!(matches!(
            publish(&index, &ids, "e", &paths),
            Err(BuildError::IdCountMismatch { vectors: 3, ids: 2 })
        ));
        assert!(!paths.index.exists());
        assert!(!paths.mapping.exists());
        Ok(())
    }

    #[test]
    fn failed_mapping_rename_keeps_previous_index() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        let (index, ids) = sample();
        publish(&index, &ids, "v1", &paths)?;
        let before = fs::read(&paths.index)?;

        // A directory at the mapping destination makes the second rename fail.
        fs::remove_file(&paths.mapping)?;
        fs::create_dir(&paths.mapping)?;
        fs::write(paths.mapping.join("occupied"), "x")?;

        let bigger = FlatIndex::from_rows(&[vec![9.0, 9.0], vec![8.0, 8.0]])?;
        let other: Vec<CandidateId> = vec!["x".into(), "y".into()];
        assert!(matches!(
            publish(&bigger, &other, "v2", &paths),
            Err(BuildError::Io { path, .. }) if path == paths.mapping
        ));

        assert_eq!(fs::read(&paths.index)?, before);
        assert!(!tmp_path(&paths.index).exists());
        assert!(!tmp_path(&paths.mapping).exists());
        assert!(!backup_path(&paths.index).exists());
        Ok(())
    }

    #[test]
    fn failed_first_publish_leaves_no_index_behind() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let paths = ArtifactPaths::in_dir(dir.path());
        fs::create_dir(&paths.mapping)?;
        let (index, ids) = sample();

        assert!(publish(&index, &ids, "e", &paths).is_err());
        assert!(!paths.index.exists());
        assert!(!tmp_path(&paths.index).exists());
        assert!(!tmp_path(&paths.mapping).exists());
        Ok(())
    }

    #[test]
    fn fingerprint_depends_on_order_and_boundaries() {
        let ab: Vec<CandidateId> = vec!["a".into(), "b".into()];
        let ba: Vec<CandidateId> = vec!["b".into(), "a".into()];
        let joined: Vec<CandidateId> = vec!["ab".into()];
        assert_ne!(mapping_fingerprint(&ab), mapping_fingerprint(&ba));
        assert_ne!(mapping_fingerprint(&ab), mapping_fingerprint(&joined));
        assert_eq!(mapping_fingerprint(&ab), mapping_fingerprint(&ab.clone()));
    }
}
