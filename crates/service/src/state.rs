//! Service lifecycle: `Uninitialized → Loading → Ready | Failed`.
//!
//! Startup happens exactly once per host. `Ready` and `Failed` are terminal;
//! request handling never mutates the state, so a bad request cannot take a
//! ready service down.

use std::sync::Arc;

use ipc::ServiceStateKind;
use parking_lot::RwLock;
use semantic_index::{ArtifactPaths, EmbedError, Embedder, LoadError, load_artifacts};
use thiserror::Error;
use tracing::{error, info};

use crate::matcher::Matcher;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("embedder unavailable: {0}")]
    Embedder(#[from] EmbedError),
    #[error("index was built with embedder {index:?} but the service is configured with {configured:?}")]
    EmbedderMismatch { index: String, configured: String },
    #[error("index dimension {index} does not match embedder dimension {embedder}")]
    DimensionMismatch { index: usize, embedder: usize },
    #[error("startup already attempted (state: {0:?})")]
    AlreadyStarted(ServiceStateKind),
}

#[derive(Debug, Clone)]
pub enum ServiceState {
    Uninitialized,
    Loading,
    Ready(Arc<Matcher>),
    Failed(String),
}

impl ServiceState {
    pub fn kind(&self) -> ServiceStateKind {
        match self {
            ServiceState::Uninitialized => ServiceStateKind::Uninitialized,
            ServiceState::Loading => ServiceStateKind::Loading,
            ServiceState::Ready(_) => ServiceStateKind::Ready,
            ServiceState::Failed(_) => ServiceStateKind::Failed,
        }
    }
}

/// Owns the lifecycle state of one query service instance.
#[derive(Debug)]
pub struct ServiceHost {
    state: RwLock<ServiceState>,
}

impl Default for ServiceHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceHost {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ServiceState::Uninitialized),
        }
    }

    /// Host that is already serving `matcher`; used by tests and embedders.
    pub fn ready_with(matcher: Matcher) -> Self {
        Self {
            state: RwLock::new(ServiceState::Ready(Arc::new(matcher))),
        }
    }

    /// Load artifacts from `paths` and pair them with `embedder`.
    pub fn load(
        &self,
        paths: &ArtifactPaths,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Arc<Matcher>, StartupError> {
        self.start_with(|| {
            info!(
                index = %paths.index.display(),
                mapping = %paths.mapping.display(),
                "loading artifacts"
            );
            let loaded = load_artifacts(paths)?;
            Matcher::from_artifacts(loaded, embedder)
        })
    }

    /// Run one startup attempt. Any failure moves the host to `Failed`.
    pub fn start_with<F>(&self, init: F) -> Result<Arc<Matcher>, StartupError>
    where
        F: FnOnce() -> Result<Matcher, StartupError>,
    {
        {
            let mut state = self.state.write();
            if !matches!(*state, ServiceState::Uninitialized) {
                return Err(StartupError::AlreadyStarted(state.kind()));
            }
            *state = ServiceState::Loading;
        }

        match init() {
            Ok(matcher) => {
                let matcher = Arc::new(matcher);
                info!(
                    indexed = matcher.indexed(),
                    dimension = matcher.dimension(),
                    embedder = matcher.embedder_version(),
                    "service ready"
                );
                *self.state.write() = ServiceState::Ready(matcher.clone());
                Ok(matcher)
            }
            Err(err) => {
                error!(error = %err, "startup failed");
                *self.state.write() = ServiceState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn kind(&self) -> ServiceStateKind {
        self.state.read().kind()
    }

    pub fn snapshot(&self) -> ServiceState {
        self.state.read().clone()
    }

    /// The matcher, if the host is ready.
    pub fn ready(&self) -> Option<Arc<Matcher>> {
        match &*self.state.read() {
            ServiceState::Ready(m) => Some(m.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::tests::{LookupEmbedder, sample_matcher};
    use semantic_index::{FlatIndex, publish};
    use tempfile::tempdir;

    #[test]
    fn successful_start_is_ready() {
        let host = ServiceHost::new();
        assert_eq!(host.kind(), ServiceStateKind::Uninitialized);
        host.start_with(|| Ok(sample_matcher())).unwrap();
        assert_eq!(host.kind(), ServiceStateKind::Ready);
        assert_eq!(host.ready().unwrap().indexed(), 3);
    }

    #[test]
    fn failure_is_terminal() {
        let host = ServiceHost::new();
        let err = host
            .start_with(|| Err(StartupError::DimensionMismatch { index: 3, embedder: 2 }))
            .unwrap_err();
        assert!(matches!(err, StartupError::DimensionMismatch { .. }));
        assert_eq!(host.kind(), ServiceStateKind::Failed);
        assert!(host.ready().is_none());

        let again = host.start_with(|| Ok(sample_matcher())).unwrap_err();
        assert!(matches!(
            again,
            StartupError::AlreadyStarted(ServiceStateKind::Failed)
        ));
        match host.snapshot() {
            ServiceState::Failed(msg) => assert!(msg.contains("dimension")),
            other => panic!("unexpected state {other:?}"),
        }
    }

    #[test]
    fn missing_artifacts_fail_startup() {
        let dir = tempdir().unwrap();
        let host = ServiceHost::new();
        let err = host
            .load(&ArtifactPaths::in_dir(dir.path()), Arc::new(LookupEmbedder))
            .unwrap_err();
        assert!(matches!(
            err,
            StartupError::Load(LoadError::MissingArtifact { .. })
        ));
        assert_eq!(host.kind(), ServiceStateKind::Failed);
    }

    #[test]
    fn embedder_version_mismatch_fails_startup() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let index = FlatIndex::from_rows(&[vec![0.0, 0.0]]).unwrap();
        publish(&index, &["a".into()], "some-other-model", &paths).unwrap();

        let host = ServiceHost::new();
        let err = host.load(&paths, Arc::new(LookupEmbedder)).unwrap_err();
        match err {
            StartupError::EmbedderMismatch { index, configured } => {
                assert_eq!(index, "some-other-model");
                assert_eq!(configured, "lookup-v1");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn published_artifacts_load_ready() {
        let dir = tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let index = FlatIndex::from_rows(&[vec![0.0, 0.0], vec![1.0, 0.0]]).unwrap();
        publish(&index, &["a".into(), "b".into()], "lookup-v1", &paths).unwrap();

        let host = ServiceHost::new();
        let matcher = host.load(&paths, Arc::new(LookupEmbedder)).unwrap();
        assert_eq!(matcher.indexed(), 2);
        assert_eq!(host.kind(), ServiceStateKind::Ready);
    }
}
