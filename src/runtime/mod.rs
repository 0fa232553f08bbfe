//! Minimal registry + connector runtime that the agent hands its socket
//! factories and credential files to.
//!
//! The registry answers name lookups with a [`ConnectorStub`], the connector
//! authenticates clients and tracks open management connections. When both
//! endpoints ask for the same port through equal factories they share one
//! listener.

pub mod client;
pub mod connector;
pub mod credentials;
pub mod registry;
pub mod url;

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener as StdTcpListener},
    sync::Arc,
    time::Duration,
};

use axum::Router;
use tokio::{net::TcpListener, spawn, sync::watch, task::JoinHandle, time::timeout};
use tracing::{info, warn};

use crate::{
    agent::socket_factory::{BoundSocketFactory, ServerSocketFactory},
    error::AgentError,
    runtime::{
        connector::ConnectorState,
        credentials::{Authenticator, CredentialFiles},
        registry::{ConnectorStub, RegistryState},
    },
};

pub use client::{ManagementConnection, connect};
pub use url::ServiceUrl;

#[derive(Debug, Clone)]
pub struct ManagementServerConfig {
    pub name: String,
    pub registry_port: u16,
    pub connector_port: u16,
    pub registry_factory: Arc<dyn ServerSocketFactory>,
    pub connector_factory: Arc<dyn ServerSocketFactory>,
    pub credentials: Option<CredentialFiles>,
}

pub struct ManagementServer {
    registry_addr: SocketAddr,
    connector_addr: SocketAddr,
    connector: Arc<ConnectorState>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

impl ManagementServer {
    pub async fn start(config: ManagementServerConfig) -> Result<Self, AgentError> {
        let authenticator = match &config.credentials {
            Some(files) => Authenticator::load(files).await?,
            None => Authenticator::Anonymous,
        };
        if authenticator.is_anonymous() {
            info!("authentication disabled, anonymous connections are accepted");
        }

        let connector = Arc::new(ConnectorState::new(authenticator));

        let shared = config.registry_port == config.connector_port
            && *config.registry_factory == *config.connector_factory;

        let (registry_listener, registry_addr) =
            create_listener(&*config.registry_factory, config.registry_port)?;

        let (connector_listener, connector_addr) = if shared {
            (None, registry_addr)
        } else {
            let (listener, addr) =
                create_listener(&*config.connector_factory, config.connector_port)?;
            (Some(listener), addr)
        };

        let stub = ConnectorStub {
            host: (!connector_addr.ip().is_unspecified()).then(|| connector_addr.ip().to_string()),
            port: connector_addr.port(),
        };
        let registry = registry::router(Arc::new(RegistryState {
            name: config.name.clone(),
            stub,
        }));
        let connector_router = connector::router(connector.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();
        match connector_listener {
            None => {
                info!(
                    "registry and connector sharing {} for '{}'",
                    registry_addr, config.name
                );
                tasks.push(serve(
                    registry_listener,
                    registry.merge(connector_router),
                    shutdown_rx,
                )?);
            }
            Some(connector_listener) => {
                info!(
                    "registry on {}, connector on {} for '{}'",
                    registry_addr, connector_addr, config.name
                );
                tasks.push(serve(registry_listener, registry, shutdown_rx.clone())?);
                tasks.push(serve(connector_listener, connector_router, shutdown_rx)?);
            }
        }

        Ok(Self {
            registry_addr,
            connector_addr,
            connector,
            shutdown_tx,
            tasks,
        })
    }

    pub fn registry_addr(&self) -> SocketAddr {
        self.registry_addr
    }

    pub fn connector_addr(&self) -> SocketAddr {
        self.connector_addr
    }

    pub fn connection_count(&self) -> usize {
        self.connector.connection_count()
    }

    /// Stops accepting, then waits for open client connections to finish.
    /// Listeners that do not drain within the grace period are aborted.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for mut task in self.tasks {
            if timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!(
                    "management listener on {} did not drain, aborting",
                    self.registry_addr
                );
                task.abort();
                let _ = task.await;
            }
        }
        info!("management server on {} stopped", self.registry_addr);
    }
}

fn create_listener(
    factory: &dyn ServerSocketFactory,
    port: u16,
) -> Result<(StdTcpListener, SocketAddr), AgentError> {
    let bind_error = |source| AgentError::Bind {
        address: factory_address(factory, port),
        source,
    };

    let listener = factory.create_server_socket(port).map_err(bind_error)?;
    let local_addr = listener.local_addr().map_err(bind_error)?;
    listener.set_nonblocking(true).map_err(bind_error)?;

    Ok((listener, local_addr))
}

fn factory_address(factory: &dyn ServerSocketFactory, port: u16) -> SocketAddr {
    let ip = factory
        .as_any()
        .downcast_ref::<BoundSocketFactory>()
        .map(|f| f.address())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    SocketAddr::new(ip, port)
}

fn serve(
    listener: StdTcpListener,
    app: Router,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, AgentError> {
    let address = listener.local_addr().ok();
    let listener = TcpListener::from_std(listener).map_err(|source| AgentError::Bind {
        address: address.unwrap_or_else(|| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0)),
        source,
    })?;

    Ok(spawn(async move {
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|stopping| *stopping).await;
        };
        if let Err(err) = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
        {
            warn!("management listener stopped: {}", err);
        }
    }))
}
