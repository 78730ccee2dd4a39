//! Candidate matching query service: lifecycle state, request handling,
//! HTTP surface, logging, and metrics.

pub mod bootstrap;
pub mod http;
pub mod matcher;
pub mod metrics;
pub mod state;
pub mod status;

pub use bootstrap::{embedder_from_config, prepare_state, run_app, serve};
pub use http::{AppState, router};
pub use core_types::logging::{init_tracing, init_tracing_with_config};
pub use matcher::{MatchError, Matcher};
pub use metrics::ServiceMetrics;
pub use state::{ServiceHost, ServiceState, StartupError};
pub use status::make_status_response;
