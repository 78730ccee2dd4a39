use std::sync::Arc;

use anyhow::Result;
use core_types::{CandidateId, config::AppConfig};
use semantic_index::{Embedder, HashingEmbedder, IndexBuilder};
use service::{prepare_state, serve};
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

fn config_for(dir: &std::path::Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.app.data_dir = dir.to_string_lossy().into_owned();
    cfg.embedder.dimension = 256;
    cfg
}

fn build_corpus(cfg: &AppConfig) -> Result<()> {
    let embedder = HashingEmbedder::new(cfg.embedder.dimension)?;
    let docs = [
        ("c-math", "Skills: algebra, calculus. Experience: Mathematics Teacher at Hill School"),
        ("c-art", "Skills: painting, sculpture. Experience: Art Teacher at Valley Academy"),
        ("c-chem", "Skills: organic chemistry, lab safety. Experience: Chemistry Teacher"),
    ];
    let ids: Vec<CandidateId> = docs.iter().map(|(id, _)| CandidateId::from(*id)).collect();
    let texts: Vec<String> = docs.iter().map(|(_, t)| t.to_string()).collect();
    let vectors = embedder.embed_batch(&texts)?;
    IndexBuilder::new((&cfg.resolved_paths()).into())
        .with_embedder_version(embedder.version())
        .build(&vectors, &ids)?;
    Ok(())
}

async fn http(addr: std::net::SocketAddr, request: String) -> Result<String> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(request.as_bytes()).await?;
    let mut out = String::new();
    stream.read_to_string(&mut out).await?;
    Ok(out)
}

fn post(body: &str) -> String {
    format!(
        "POST /match HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn serves_matches_over_tcp() -> Result<()> {
    let dir = tempdir()?;
    let cfg = config_for(dir.path());
    build_corpus(&cfg)?;

    let state = prepare_state(&cfg)?;
    let host = Arc::clone(&state.host);
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();
    let server = tokio::spawn(serve(listener, state, async {
        let _ = rx.await;
    }));

    let resp = http(addr, post(r#"{"requirement_text":"chemistry lab teacher","top_n":1}"#)).await?;
    assert!(resp.starts_with("HTTP/1.1 200"), "{resp}");
    assert!(resp.contains(r#"{"ranked_candidate_ids":["c-chem"]}"#), "{resp}");

    let resp = http(addr, post(r#"{"requirement_text":""}"#)).await?;
    assert!(resp.starts_with("HTTP/1.1 400"), "{resp}");
    assert_eq!(host.kind(), ipc::ServiceStateKind::Ready);

    let resp = http(addr, post(r#"{"requirement_text":"teacher","top_n":50}"#)).await?;
    assert!(resp.contains("c-math") && resp.contains("c-art") && resp.contains("c-chem"));

    let _ = tx.send(());
    server.await??;
    Ok(())
}

#[test]
fn refuses_to_start_without_artifacts() {
    let dir = tempdir().unwrap();
    let Err(err) = prepare_state(&config_for(dir.path())) else {
        panic!("startup should fail without artifacts");
    };
    assert!(format!("{err:#}").contains("does not exist"), "{err:#}");
}

#[test]
fn refuses_to_start_with_other_embedder_dimension() -> Result<()> {
    let dir = tempdir()?;
    let mut cfg = config_for(dir.path());
    build_corpus(&cfg)?;
    cfg.embedder.dimension = 32;
    let Err(err) = prepare_state(&cfg) else {
        panic!("startup should fail with a different embedder");
    };
    assert!(format!("{err:#}").contains("embedder"), "{err:#}");
    Ok(())
}

#[test]
fn embedder_version_pin_is_enforced_at_startup() -> Result<()> {
    let dir = tempdir()?;
    let mut cfg = config_for(dir.path());
    build_corpus(&cfg)?;

    cfg.embedder.version = "fnv1a-hash-v1/d256".into();
    assert!(prepare_state(&cfg).is_ok());

    cfg.embedder.version = "minilm-l6-v2".into();
    let Err(err) = prepare_state(&cfg) else {
        panic!("startup should fail with a pinned version the embedder does not report");
    };
    assert!(format!("{err:#}").contains("pinned"), "{err:#}");
    Ok(())
}
