use std::{
    net::{IpAddr, Ipv4Addr},
    sync::Arc,
};

use tracing::{debug, info, warn};

use crate::{
    agent::{
        AgentConfig,
        host::{HostResolver, ResolvedInterfaceSet},
        socket_factory::{BoundSocketFactory, ServerSocketFactory},
    },
    error::AgentError,
};

/// Where the management listener ends up bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindTarget {
    Explicit(IpAddr),
    /// Loopback only; `excluded` holds the interfaces that must stay unreachable.
    LocalOnly {
        address: IpAddr,
        excluded: ResolvedInterfaceSet,
    },
    /// Neither flag set; bound to the address the advertised host resolves to.
    AdvertisedHost { host: String, address: IpAddr },
}

impl BindTarget {
    pub fn address(&self) -> IpAddr {
        match self {
            BindTarget::Explicit(address) => *address,
            BindTarget::LocalOnly { address, .. } => *address,
            BindTarget::AdvertisedHost { address, .. } => *address,
        }
    }

    pub fn socket_factory(&self) -> Arc<dyn ServerSocketFactory> {
        Arc::new(BoundSocketFactory::new(self.address()))
    }
}

pub struct AddressResolver<'a, R: HostResolver> {
    hosts: &'a R,
}

impl<'a, R: HostResolver> AddressResolver<'a, R> {
    pub fn new(hosts: &'a R) -> Self {
        Self { hosts }
    }

    /// First match wins: explicit address, then force-local-only, then the
    /// advertised host.
    pub async fn resolve(&self, config: &AgentConfig) -> Result<BindTarget, AgentError> {
        if let Some(bind_address) = &config.bind_address {
            let address = self.resolve_explicit(bind_address).await?;
            if config.force_local_only {
                warn!(
                    "both bind-address and force-local-only are set, using bind-address {}",
                    address
                );
            }
            info!("binding management listener to {}", address);
            return Ok(BindTarget::Explicit(address));
        }

        if config.force_local_only {
            let excluded = self.hosts.local_interfaces().await?;
            for external in excluded.non_loopback() {
                info!(
                    "force-local-only: {} ({}) will not accept management connections",
                    external, excluded.canonical_name
                );
            }

            let address = IpAddr::V4(Ipv4Addr::LOCALHOST);
            info!("binding management listener to loopback {}", address);
            return Ok(BindTarget::LocalOnly { address, excluded });
        }

        let address = self.resolve_host(&config.host).await?;
        info!(
            "no bind address configured, binding management listener to {} ({})",
            address, config.host
        );
        Ok(BindTarget::AdvertisedHost {
            host: config.host.clone(),
            address,
        })
    }

    async fn resolve_explicit(&self, bind_address: &str) -> Result<IpAddr, AgentError> {
        self.resolve_host(bind_address).await
    }

    /// IP literals are used verbatim. Names take their first IPv4 address,
    /// falling back to the first address of any family.
    async fn resolve_host(&self, host: &str) -> Result<IpAddr, AgentError> {
        if let Ok(address) = host.parse::<IpAddr>() {
            return Ok(address);
        }

        let addresses = self.hosts.lookup(host).await?;
        debug!("{} resolved to {:?}", host, addresses);
        addresses
            .iter()
            .find(|address| address.is_ipv4())
            .or_else(|| addresses.first())
            .copied()
            .ok_or_else(|| AgentError::NoAddress {
                target: host.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;

    struct StubHosts {
        interfaces: Option<ResolvedInterfaceSet>,
        names: Vec<(String, Vec<IpAddr>)>,
        enumerations: AtomicUsize,
    }

    impl StubHosts {
        fn new() -> Self {
            Self {
                interfaces: Some(ResolvedInterfaceSet {
                    canonical_name: "mgmt-host".to_string(),
                    addresses: vec![
                        IpAddr::V4(Ipv4Addr::LOCALHOST),
                        IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3)),
                    ],
                }),
                names: vec![
                    (
                        "mgmt.internal".to_string(),
                        vec![IpAddr::V4(Ipv4Addr::new(10, 9, 8, 7))],
                    ),
                    (
                        "localhost".to_string(),
                        vec![
                            IpAddr::V6(std::net::Ipv6Addr::LOCALHOST),
                            IpAddr::V4(Ipv4Addr::LOCALHOST),
                        ],
                    ),
                ],
                enumerations: AtomicUsize::new(0),
            }
        }

        fn unresolvable() -> Self {
            Self {
                interfaces: None,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl HostResolver for StubHosts {
        async fn local_interfaces(&self) -> Result<ResolvedInterfaceSet, AgentError> {
            self.enumerations.fetch_add(1, Ordering::SeqCst);
            self.interfaces.clone().ok_or_else(|| AgentError::Resolution {
                target: "local host name".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such host"),
            })
        }

        async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, AgentError> {
            Ok(self
                .names
                .iter()
                .find(|(name, _)| name == host)
                .map(|(_, addresses)| addresses.clone())
                .unwrap_or_default())
        }
    }

    fn config() -> AgentConfig {
        AgentConfig::new(9000)
    }

    #[tokio::test]
    async fn test_explicit_ip_used_verbatim() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            bind_address: Some("192.0.2.10".to_string()),
            ..config()
        };

        let target = AddressResolver::new(&hosts).resolve(&config).await.unwrap();
        assert_eq!(
            target,
            BindTarget::Explicit(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)))
        );
    }

    #[tokio::test]
    async fn test_explicit_host_name_is_looked_up() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            bind_address: Some("mgmt.internal".to_string()),
            ..config()
        };

        let target = AddressResolver::new(&hosts).resolve(&config).await.unwrap();
        assert_eq!(target.address(), IpAddr::V4(Ipv4Addr::new(10, 9, 8, 7)));
    }

    #[tokio::test]
    async fn test_explicit_host_name_without_address() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            bind_address: Some("nowhere.internal".to_string()),
            ..config()
        };

        let err = AddressResolver::new(&hosts)
            .resolve(&config)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NoAddress { .. }));
    }

    #[tokio::test]
    async fn test_explicit_address_beats_force_local_only() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            bind_address: Some("192.0.2.10".to_string()),
            force_local_only: true,
            ..config()
        };

        let target = AddressResolver::new(&hosts).resolve(&config).await.unwrap();
        assert!(matches!(target, BindTarget::Explicit(_)));
        assert_eq!(hosts.enumerations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_force_local_only_binds_loopback() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            force_local_only: true,
            ..config()
        };

        let target = AddressResolver::new(&hosts).resolve(&config).await.unwrap();
        let BindTarget::LocalOnly { address, excluded } = &target else {
            panic!("expected local-only target, got {:?}", target);
        };
        assert!(address.is_loopback());
        assert_eq!(
            excluded.non_loopback().collect::<Vec<_>>(),
            vec![IpAddr::V4(Ipv4Addr::new(10, 1, 2, 3))]
        );
        assert_eq!(hosts.enumerations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_force_local_only_resolution_failure() {
        let hosts = StubHosts::unresolvable();
        let config = AgentConfig {
            force_local_only: true,
            ..config()
        };

        let err = AddressResolver::new(&hosts)
            .resolve(&config)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Resolution { .. }));
    }

    #[tokio::test]
    async fn test_no_flags_binds_advertised_host() {
        let hosts = StubHosts::new();

        let target = AddressResolver::new(&hosts).resolve(&config()).await.unwrap();
        assert_eq!(
            target,
            BindTarget::AdvertisedHost {
                host: "localhost".to_string(),
                address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            }
        );
        assert!(!target.address().is_unspecified());
        assert_eq!(hosts.enumerations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_flags_advertised_ip_used_verbatim() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            host: "192.0.2.44".to_string(),
            ..config()
        };

        let target = AddressResolver::new(&hosts).resolve(&config).await.unwrap();
        assert_eq!(target.address(), IpAddr::V4(Ipv4Addr::new(192, 0, 2, 44)));
    }

    #[tokio::test]
    async fn test_no_flags_unresolvable_host_fails() {
        let hosts = StubHosts::new();
        let config = AgentConfig {
            host: "nowhere.internal".to_string(),
            ..config()
        };

        let err = AddressResolver::new(&hosts)
            .resolve(&config)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NoAddress { .. }));
    }

    #[test]
    fn test_bound_targets_share_factory_kind() {
        let explicit = BindTarget::Explicit(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)));
        let local = BindTarget::LocalOnly {
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            excluded: ResolvedInterfaceSet {
                canonical_name: "mgmt-host".to_string(),
                addresses: vec![],
            },
        };

        let advertised = BindTarget::AdvertisedHost {
            host: "localhost".to_string(),
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
        };

        assert!(*explicit.socket_factory() == *local.socket_factory());
        assert!(*explicit.socket_factory() == *advertised.socket_factory());
    }
}
