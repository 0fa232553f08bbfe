pub mod address;
pub mod host;
pub mod socket_factory;

use std::{net::SocketAddr, path::PathBuf};

use tracing::info;

use crate::{
    agent::{
        address::{AddressResolver, BindTarget},
        host::{HostResolver, SystemHostResolver},
    },
    constants::{DEFAULT_ADVERTISED_HOST, DEFAULT_MANAGEMENT_PORT, DEFAULT_SERVICE_NAME},
    error::AgentError,
    runtime::{
        ManagementServer, ManagementServerConfig, ServiceUrl, credentials::CredentialFiles,
    },
};

/// Startup settings for the management agent. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub port: u16,
    /// Connector port; the registry port is reused when unset.
    pub rmi_port: Option<u16>,
    /// Host advertised in the service url; also bound when no address is forced.
    pub host: String,
    pub authenticate: bool,
    pub password_file: Option<PathBuf>,
    pub access_file: Option<PathBuf>,
    pub force_local_only: bool,
    pub bind_address: Option<String>,
}

impl AgentConfig {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    pub fn connector_port(&self) -> u16 {
        self.rmi_port.unwrap_or(self.port)
    }

    /// Credential files are handed over when authentication is requested or
    /// a password file is configured.
    pub fn credential_files(&self) -> Option<CredentialFiles> {
        if !self.authenticate && self.password_file.is_none() {
            return None;
        }

        Some(CredentialFiles {
            password_file: self.password_file.clone(),
            access_file: self.access_file.clone(),
        })
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_MANAGEMENT_PORT,
            rmi_port: None,
            host: DEFAULT_ADVERTISED_HOST.to_string(),
            authenticate: false,
            password_file: None,
            access_file: None,
            force_local_only: false,
            bind_address: None,
        }
    }
}

pub struct Agent {
    bind_target: BindTarget,
    service_url: ServiceUrl,
    server: ManagementServer,
}

impl Agent {
    pub async fn start(config: &AgentConfig) -> Result<Self, AgentError> {
        Self::start_with_resolver(config, &SystemHostResolver).await
    }

    pub async fn start_with_resolver<R: HostResolver>(
        config: &AgentConfig,
        hosts: &R,
    ) -> Result<Self, AgentError> {
        let bind_target = AddressResolver::new(hosts).resolve(config).await?;

        // one factory for both endpoints so the runtime can share the socket
        let factory = bind_target.socket_factory();

        let server = ManagementServer::start(ManagementServerConfig {
            name: DEFAULT_SERVICE_NAME.to_string(),
            registry_port: config.port,
            connector_port: config.connector_port(),
            registry_factory: factory.clone(),
            connector_factory: factory,
            credentials: config.credential_files(),
        })
        .await?;

        let host = match &bind_target {
            BindTarget::AdvertisedHost { host, .. } => host.clone(),
            target => target.address().to_string(),
        };
        let service_url = ServiceUrl {
            connector_host: host.clone(),
            connector_port: server.connector_addr().port(),
            registry_host: host,
            registry_port: server.registry_addr().port(),
            name: DEFAULT_SERVICE_NAME.to_string(),
        };
        info!("management agent available at {}", service_url);

        Ok(Self {
            bind_target,
            service_url,
            server,
        })
    }

    pub fn bind_target(&self) -> &BindTarget {
        &self.bind_target
    }

    pub fn service_url(&self) -> &ServiceUrl {
        &self.service_url
    }

    pub fn registry_addr(&self) -> SocketAddr {
        self.server.registry_addr()
    }

    pub fn connector_addr(&self) -> SocketAddr {
        self.server.connector_addr()
    }

    pub async fn shutdown(self) {
        self.server.shutdown().await;
    }
}
