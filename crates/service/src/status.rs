use ipc::StatusResponse;

use crate::state::{ServiceHost, ServiceState};

/// Build a StatusResponse from the host's current state.
pub fn make_status_response(host: &ServiceHost) -> StatusResponse {
    let state = host.snapshot();
    let mut resp = StatusResponse {
        state: state.kind(),
        indexed: None,
        dimension: None,
        embedder: None,
        failure: None,
    };
    match state {
        ServiceState::Ready(m) => {
            resp.indexed = Some(m.indexed());
            resp.dimension = Some(m.dimension());
            resp.embedder = Some(m.embedder_version().to_string());
        }
        ServiceState::Failed(reason) => resp.failure = Some(reason),
        ServiceState::Uninitialized | ServiceState::Loading => {}
    }
    resp
}
