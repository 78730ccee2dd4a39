//! HTTP surface: `POST /match`, `GET /status`, `GET /metrics`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use ipc::{ErrorResponse, MatchResponse, RequestLimits, ServiceStateKind, parse_match_request};
use tracing::{Instrument, debug, info_span, warn};
use uuid::Uuid;

use crate::matcher::MatchError;
use crate::metrics::ServiceMetrics;
use crate::state::ServiceHost;
use crate::status::make_status_response;

#[derive(Clone)]
pub struct AppState {
    pub host: Arc<ServiceHost>,
    pub metrics: Option<Arc<ServiceMetrics>>,
    pub limits: RequestLimits,
}

impl AppState {
    pub fn new(host: Arc<ServiceHost>) -> Self {
        Self {
            host,
            metrics: None,
            limits: RequestLimits::default(),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/match", post(match_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

impl MatchError {
    fn status_code(&self) -> StatusCode {
        match self {
            MatchError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            MatchError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            MatchError::Embed(_)
            | MatchError::Search(_)
            | MatchError::PositionOutOfRange(_)
            | MatchError::TaskFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for MatchError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

async fn match_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("match", %request_id);
    async move {
        let started = Instant::now();
        if let Some(m) = &state.metrics {
            m.record_request();
        }

        let result = run_match(&state, &body).await;
        if let Some(m) = &state.metrics {
            m.observe_latency(started.elapsed());
        }

        match result {
            Ok(ids) => {
                debug!(returned = ids.len(), "match served");
                Json(MatchResponse {
                    ranked_candidate_ids: ids,
                })
                .into_response()
            }
            Err(err) => {
                if let Some(m) = &state.metrics {
                    m.record_error(err.kind());
                }
                if err.status_code().is_server_error() {
                    warn!(error = %err, "match failed");
                } else {
                    debug!(error = %err, "match rejected");
                }
                err.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

async fn run_match(state: &AppState, body: &[u8]) -> Result<Vec<String>, MatchError> {
    let req = parse_match_request(body, state.limits)?;
    let matcher = state.host.ready().ok_or(MatchError::NotReady)?;

    // Scoring is CPU-bound; keep it off the async workers.
    let ranked = tokio::task::spawn_blocking(move || matcher.match_candidates(&req))
        .await
        .map_err(|e| MatchError::TaskFailed(e.to_string()))??;

    Ok(ranked.into_iter().map(|id| id.into_inner()).collect())
}

async fn status_handler(State(state): State<AppState>) -> Response {
    let status = make_status_response(&state.host);
    let code = if status.state == ServiceStateKind::Ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status)).into_response()
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(metrics) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match metrics.scrape() {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "metrics scrape failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
