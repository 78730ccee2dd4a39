//! Build-then-load scenarios over real artifact files.

use anyhow::Result;
use core_types::CandidateId;
use semantic_index::{
    ArtifactPaths, BuildError, Embedder, EmbeddingStore, HashingEmbedder, IndexBuilder, LoadError,
    SimilarityIndex, load_artifacts,
};
use tempfile::tempdir;

fn ids(raw: &[&str]) -> Vec<CandidateId> {
    raw.iter().map(|s| CandidateId::from(*s)).collect()
}

fn ranked(paths: &ArtifactPaths, query: &[f32], top_n: usize) -> Result<Vec<String>> {
    let loaded = load_artifacts(paths)?;
    let hits = loaded.index.search(query, top_n)?;
    Ok(hits
        .iter()
        .map(|n| loaded.mapping[n.position].to_string())
        .collect())
}

#[test]
fn three_point_corpus_ranks_by_distance() -> Result<()> {
    let dir = tempdir()?;
    let paths = ArtifactPaths::in_dir(dir.path());
    let store = EmbeddingStore::new(
        ids(&["a", "b", "c"]),
        vec![vec![0.0, 0.0], vec![1.0, 0.0], vec![5.0, 5.0]],
    )?;
    IndexBuilder::new(paths.clone()).build_from_store(&store)?;

    assert_eq!(ranked(&paths, &[0.0, 0.0], 2)?, vec!["a", "b"]);
    assert_eq!(ranked(&paths, &[0.0, 0.0], 10)?, vec!["a", "b", "c"]);
    Ok(())
}

#[test]
fn zero_vector_build_creates_no_artifacts() -> Result<()> {
    let dir = tempdir()?;
    let paths = ArtifactPaths::in_dir(dir.path());
    let err = IndexBuilder::new(paths.clone()).build(&[], &[]).unwrap_err();
    assert!(matches!(err, BuildError::EmptyInput));
    assert!(matches!(
        load_artifacts(&paths),
        Err(LoadError::MissingArtifact { .. })
    ));
    Ok(())
}

#[test]
fn stored_embeddings_round_trip_into_an_index() -> Result<()> {
    let dir = tempdir()?;
    let embedder = HashingEmbedder::new(128)?;
    let docs = [
        ("t1", "Skills: Mathematics, Statistics. Experience: Math Teacher at Greenwood High"),
        ("t2", "Skills: Painting. Experience: Art Teacher at Hillside School"),
        ("t3", "Skills: Chemistry, Biology. Education: MSc Chemistry from Delhi University"),
    ];
    let texts: Vec<String> = docs.iter().map(|(_, d)| d.to_string()).collect();
    let store = EmbeddingStore::new(
        docs.iter().map(|(id, _)| CandidateId::from(*id)).collect(),
        embedder.embed_batch(&texts)?,
    )?;

    let emb_path = dir.path().join("embeddings.bin");
    let ids_path = dir.path().join("embedding_ids.json");
    store.save(&emb_path, &ids_path)?;
    let store = EmbeddingStore::load(&emb_path, &ids_path)?;

    let paths = ArtifactPaths::in_dir(dir.path());
    IndexBuilder::new(paths.clone())
        .with_embedder_version(embedder.version())
        .build_from_store(&store)?;

    let query = embedder.embed("chemistry teacher with biology background")?;
    let top = ranked(&paths, &query, 1)?;
    assert_eq!(top, vec!["t3"]);
    Ok(())
}
