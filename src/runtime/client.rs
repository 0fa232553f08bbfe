use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tokio::runtime::Handle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    constants::CONNECT_TIMEOUT_SECS,
    error::ConnectError,
    runtime::{
        connector::{AgentInfo, OpenConnectionRequest, OpenConnectionResponse},
        credentials::{AccessLevel, Credentials},
        registry::ConnectorStub,
        url::{ServiceUrl, host_port},
    },
};

/// An open connection to a management connector.
///
/// Dropping it without calling [`ManagementConnection::close`] still releases
/// the connection on the agent, best effort, when a tokio runtime is around.
#[derive(Debug)]
pub struct ManagementConnection {
    client: Client,
    endpoint: String,
    id: Uuid,
    access: AccessLevel,
    closed: bool,
}

/// Looks the connector up in the registry named by `url`, then opens a
/// connection with the given credentials.
pub async fn connect(
    url: &ServiceUrl,
    credentials: Option<&Credentials>,
) -> Result<ManagementConnection, ConnectError> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|source| ConnectError::Io {
            endpoint: url.to_string(),
            source,
        })?;

    let registry_endpoint = url.registry_endpoint();
    debug!("looking up {} at {}", url.name, registry_endpoint);
    let response = send(client.get(&registry_endpoint), &registry_endpoint).await?;
    let stub: ConnectorStub = match response.status() {
        StatusCode::OK => json(response, &registry_endpoint).await?,
        StatusCode::NOT_FOUND => return Err(ConnectError::ServiceUnavailable(url.name.clone())),
        status => return Err(protocol_error(&registry_endpoint, status)),
    };

    let host = stub.host.unwrap_or_else(|| url.connector_host.clone());
    let endpoint = format!("http://{}/connections", host_port(&host, stub.port));
    debug!("opening connection at {}", endpoint);

    let request = OpenConnectionRequest {
        credentials: credentials.cloned(),
    };
    let response = send(client.post(&endpoint).json(&request), &endpoint).await?;
    let opened: OpenConnectionResponse = match response.status() {
        StatusCode::OK => json(response, &endpoint).await?,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            let reason = response.text().await.unwrap_or_default();
            return Err(ConnectError::Security(reason));
        }
        status => return Err(protocol_error(&endpoint, status)),
    };

    Ok(ManagementConnection {
        client,
        endpoint: format!("{}/{}", endpoint, opened.connection_id),
        id: opened.connection_id,
        access: opened.access,
        closed: false,
    })
}

impl ManagementConnection {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn access(&self) -> AccessLevel {
        self.access
    }

    pub async fn agent_info(&self) -> Result<AgentInfo, ConnectError> {
        let response = send(self.client.get(&self.endpoint), &self.endpoint).await?;
        match response.status() {
            StatusCode::OK => json(response, &self.endpoint).await,
            status => Err(protocol_error(&self.endpoint, status)),
        }
    }

    pub async fn close(mut self) -> Result<(), ConnectError> {
        self.closed = true;
        let response = send(self.client.delete(&self.endpoint), &self.endpoint).await?;
        match response.status() {
            StatusCode::NO_CONTENT => Ok(()),
            status => Err(protocol_error(&self.endpoint, status)),
        }
    }
}

impl Drop for ManagementConnection {
    fn drop(&mut self) {
        if self.closed {
            return;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("no runtime to release connection {}", self.id);
            return;
        };

        let request = self.client.delete(&self.endpoint);
        let id = self.id;
        runtime.spawn(async move {
            match request.send().await {
                Ok(response) => debug!("released connection {}: {}", id, response.status()),
                Err(err) => debug!("failed to release connection {}: {}", id, err),
            }
        });
    }
}

async fn send(request: reqwest::RequestBuilder, endpoint: &str) -> Result<Response, ConnectError> {
    request.send().await.map_err(|source| ConnectError::Io {
        endpoint: endpoint.to_string(),
        source,
    })
}

async fn json<T: serde::de::DeserializeOwned>(
    response: Response,
    endpoint: &str,
) -> Result<T, ConnectError> {
    let status = response.status();
    response.json().await.map_err(|_| protocol_error(endpoint, status))
}

fn protocol_error(endpoint: &str, status: StatusCode) -> ConnectError {
    ConnectError::Protocol {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
    }
}
