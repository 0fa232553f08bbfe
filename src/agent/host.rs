use std::{io, net::IpAddr};

use async_trait::async_trait;
use tokio::net::lookup_host;

use crate::error::AgentError;

/// Point-in-time view of the addresses registered for the local host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterfaceSet {
    pub canonical_name: String,
    pub addresses: Vec<IpAddr>,
}

impl ResolvedInterfaceSet {
    pub fn non_loopback(&self) -> impl Iterator<Item = IpAddr> + '_ {
        self.addresses.iter().copied().filter(|a| !a.is_loopback())
    }
}

#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn local_interfaces(&self) -> Result<ResolvedInterfaceSet, AgentError>;

    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, AgentError>;
}

/// Resolves through the OS: `gethostname(2)` followed by `getaddrinfo(3)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostResolver;

#[async_trait]
impl HostResolver for SystemHostResolver {
    async fn local_interfaces(&self) -> Result<ResolvedInterfaceSet, AgentError> {
        let canonical_name = nix::unistd::gethostname()
            .map_err(|errno| AgentError::Resolution {
                target: "local host name".to_string(),
                source: io::Error::from(errno),
            })?
            .to_string_lossy()
            .into_owned();

        let addresses = self.lookup(&canonical_name).await?;

        Ok(ResolvedInterfaceSet {
            canonical_name,
            addresses,
        })
    }

    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, AgentError> {
        let resolved = lookup_host((host, 0))
            .await
            .map_err(|source| AgentError::Resolution {
                target: host.to_string(),
                source,
            })?;

        let mut addresses = Vec::new();
        for addr in resolved {
            if !addresses.contains(&addr.ip()) {
                addresses.push(addr.ip());
            }
        }

        Ok(addresses)
    }
}
