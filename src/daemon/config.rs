use std::path::PathBuf;

use anyhow::{Context, Result};
use mgmt_agent::{
    agent::AgentConfig,
    constants::{DEFAULT_ADVERTISED_HOST, DEFAULT_MANAGEMENT_PORT},
};
use serde::{Deserialize, Serialize};
use tokio::fs::read_to_string;
use tracing::{info, warn};

use crate::cmd::Cli;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(skip_serializing, skip_deserializing)]
    pub config_path: Option<PathBuf>,

    #[serde(rename = "management", default)]
    pub management: ManagementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ManagementConfig {
    #[serde(rename = "port")]
    pub port: u16,
    #[serde(rename = "rmi-port")]
    pub rmi_port: Option<u16>,
    #[serde(rename = "host")]
    pub host: String,
    #[serde(rename = "authenticate")]
    pub authenticate: bool,
    #[serde(rename = "password-file")]
    pub password_file: Option<PathBuf>,
    #[serde(rename = "access-file")]
    pub access_file: Option<PathBuf>,
    #[serde(rename = "force-local-only")]
    pub force_local_only: bool,
    #[serde(rename = "bind-address")]
    pub bind_address: Option<String>,
}

impl Default for ManagementConfig {
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

fn resolve_config_path(path_override: Option<PathBuf>) -> Result<Option<PathBuf>> {
    let config_path =
        path_override.or_else(|| std::env::var("MGMT_AGENT_CONFIG").ok().map(PathBuf::from));

    if let Some(path) = config_path {
        return Ok(Some(path));
    }

    let cwd = std::env::current_dir()?;

    // try to load from $CWD/mgmt-agent.toml
    let path = cwd.join("mgmt-agent.toml");
    if path.exists() {
        return Ok(Some(path));
    }

    // try to load from $HOME/.config/mgmt-agent/config.toml
    if let Some(project_dirs) = directories::ProjectDirs::from("", "", "mgmt-agent") {
        let path = project_dirs.config_dir().join("config.toml");
        if path.exists() {
            return Ok(Some(path));
        }
    }

    let path = PathBuf::from("/etc/mgmt-agent/config.toml");
    if path.exists() {
        return Ok(Some(path));
    }

    warn!("No config file found, using defaults");
    Ok(None)
}

impl Config {
    pub async fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let Some(config_path) = resolve_config_path(path_override)? else {
            return Ok(Self::default());
        };

        info!("loading config from {}", config_path.display());
        let config_str = read_to_string(&config_path)
            .await
            .with_context(|| format!("failed to read config {}", config_path.display()))?;

        let mut config = Self::parse(&config_str)
            .with_context(|| format!("invalid config {}", config_path.display()))?;
        config.config_path = Some(config_path);

        Ok(config)
    }

    pub fn parse(config_str: &str) -> Result<Self> {
        Ok(toml::from_str(config_str)?)
    }

    /// Applies command line overrides; flags only ever switch features on.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        let management = &mut self.management;

        if let Some(port) = cli.port {
            management.port = port;
        }
        if let Some(rmi_port) = cli.rmi_port {
            management.rmi_port = Some(rmi_port);
        }
        if let Some(host) = &cli.host {
            management.host = host.clone();
        }
        if let Some(password_file) = &cli.password_file {
            management.password_file = Some(password_file.clone());
        }
        if let Some(access_file) = &cli.access_file {
            management.access_file = Some(access_file.clone());
        }
        if let Some(bind_address) = &cli.bind_address {
            management.bind_address = Some(bind_address.clone());
        }
        management.authenticate |= cli.authenticate;
        management.force_local_only |= cli.force_local_only;

        self
    }

    pub fn agent_config(&self) -> AgentConfig {
        let management = &self.management;
        AgentConfig {
            port: management.port,
            rmi_port: management.rmi_port,
            host: management.host.clone(),
            authenticate: management.authenticate,
            password_file: management.password_file.clone(),
            access_file: management.access_file.clone(),
            force_local_only: management.force_local_only,
            bind_address: management.bind_address.clone(),
        }
    }
}
