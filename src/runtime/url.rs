use std::{fmt, net::Ipv6Addr, str::FromStr};

use crate::{constants::SERVICE_PROTOCOL, error::AgentError};

/// `service:jmx:rmi://<connector>/jndi/rmi://<registry>/<name>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUrl {
    pub connector_host: String,
    pub connector_port: u16,
    pub registry_host: String,
    pub registry_port: u16,
    pub name: String,
}

impl ServiceUrl {
    pub fn new(host: impl AsRef<str>, port: u16, name: impl AsRef<str>) -> Self {
        let host = host.as_ref().to_string();
        Self {
            connector_host: host.clone(),
            connector_port: port,
            registry_host: host,
            registry_port: port,
            name: name.as_ref().to_string(),
        }
    }

    pub fn registry_endpoint(&self) -> String {
        format!(
            "http://{}/jndi/{}",
            host_port(&self.registry_host, self.registry_port),
            self.name
        )
    }
}

pub(crate) fn host_port(host: &str, port: u16) -> String {
    if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn parse_host_port(value: &str) -> Option<(String, u16)> {
    let (host, port) = if let Some(rest) = value.strip_prefix('[') {
        let (host, rest) = rest.split_once(']')?;
        (host, rest.strip_prefix(':')?)
    } else {
        value.rsplit_once(':')?
    };

    if host.is_empty() {
        return None;
    }

    Some((host.to_string(), port.parse().ok()?))
}

impl FromStr for ServiceUrl {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AgentError::InvalidServiceUrl(s.to_string());

        let rest = s
            .strip_prefix("service:")
            .and_then(|rest| rest.strip_prefix(SERVICE_PROTOCOL))
            .and_then(|rest| rest.strip_prefix(":rmi://"))
            .ok_or_else(invalid)?;

        let (connector, rest) = rest.split_once("/jndi/rmi://").ok_or_else(invalid)?;
        let (registry, name) = rest.split_once('/').ok_or_else(invalid)?;
        if name.is_empty() || name.contains('/') {
            return Err(invalid());
        }

        let (connector_host, connector_port) = parse_host_port(connector).ok_or_else(invalid)?;
        let (registry_host, registry_port) = parse_host_port(registry).ok_or_else(invalid)?;

        Ok(Self {
            connector_host,
            connector_port,
            registry_host,
            registry_port,
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ServiceUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service:{}:rmi://{}/jndi/rmi://{}/{}",
            SERVICE_PROTOCOL,
            host_port(&self.connector_host, self.connector_port),
            host_port(&self.registry_host, self.registry_port),
            self.name
        )
    }
}
