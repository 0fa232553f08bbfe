use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where a bound name can be reached. `host` is absent when the connector
/// listens on every interface; clients then reuse the host from their URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorStub {
    pub host: Option<String>,
    pub port: u16,
}

pub struct RegistryState {
    pub name: String,
    pub stub: ConnectorStub,
}

pub fn router(state: Arc<RegistryState>) -> Router {
    Router::new()
        .route("/jndi/{name}", get(lookup))
        .with_state(state)
}

async fn lookup(
    State(state): State<Arc<RegistryState>>,
    Path(name): Path<String>,
) -> Result<Json<ConnectorStub>, StatusCode> {
    if name != state.name {
        debug!("registry lookup for unbound name {}", name);
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(state.stub.clone()))
}
