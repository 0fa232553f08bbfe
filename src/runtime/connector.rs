use std::{sync::Arc, time::Instant};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use papaya::HashMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::runtime::credentials::{AccessLevel, AuthOutcome, Authenticator, Credentials};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenConnectionRequest {
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenConnectionResponse {
    pub connection_id: Uuid,
    pub access: AccessLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub pid: u32,
    pub uptime_secs: u64,
    pub connection_count: usize,
    pub access: AccessLevel,
}

#[derive(Debug, Clone)]
struct ConnectionEntry {
    principal: Option<String>,
    access: AccessLevel,
}

pub struct ConnectorState {
    authenticator: Authenticator,
    connections: HashMap<Uuid, ConnectionEntry>,
    started_at: Instant,
}

impl ConnectorState {
    pub fn new(authenticator: Authenticator) -> Self {
        Self {
            authenticator,
            connections: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.pin().len()
    }
}

pub fn router(state: Arc<ConnectorState>) -> Router {
    Router::new()
        .route("/connections", post(open_connection))
        .route(
            "/connections/{id}",
            get(connection_info).delete(close_connection),
        )
        .with_state(state)
}

async fn open_connection(
    State(state): State<Arc<ConnectorState>>,
    Json(request): Json<OpenConnectionRequest>,
) -> Result<Json<OpenConnectionResponse>, (StatusCode, String)> {
    let credentials = request.credentials.as_ref();
    let principal = credentials.map(|c| c.username.clone());

    let access = match state.authenticator.authenticate(credentials) {
        AuthOutcome::Granted(access) => access,
        AuthOutcome::Unauthenticated => {
            warn!(
                "authentication failed for {}",
                principal.as_deref().unwrap_or("<anonymous>")
            );
            let message = if credentials.is_none() {
                "credentials required"
            } else {
                "invalid username or password"
            };
            return Err((StatusCode::UNAUTHORIZED, message.to_string()));
        }
        AuthOutcome::Denied => {
            warn!(
                "access denied for {}",
                principal.as_deref().unwrap_or("<anonymous>")
            );
            return Err((StatusCode::FORBIDDEN, "access denied".to_string()));
        }
    };

    let connection_id = Uuid::new_v4();
    info!(
        "opened management connection {} for {} ({})",
        connection_id,
        principal.as_deref().unwrap_or("<anonymous>"),
        access
    );
    state
        .connections
        .pin()
        .insert(connection_id, ConnectionEntry { principal, access });

    Ok(Json(OpenConnectionResponse {
        connection_id,
        access,
    }))
}

async fn connection_info(
    State(state): State<Arc<ConnectorState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentInfo>, StatusCode> {
    let connections = state.connections.pin();
    let Some(entry) = connections.get(&id) else {
        return Err(StatusCode::NOT_FOUND);
    };

    Ok(Json(AgentInfo {
        pid: std::process::id(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        connection_count: connections.len(),
        access: entry.access,
    }))
}

async fn close_connection(
    State(state): State<Arc<ConnectorState>>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    match state.connections.pin().remove(&id) {
        Some(entry) => {
            info!(
                "closed management connection {} for {}",
                id,
                entry.principal.as_deref().unwrap_or("<anonymous>")
            );
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
