use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "mgmt-agentd")]
#[command(about = "management agent daemon", long_about = None)]
pub struct Cli {
    /// Path to the config file. If not provided, the daemon will look for a config file in the
    /// current working directory (mgmt-agent.toml), in the home config dir or in
    /// /etc/mgmt-agent/config.toml, and fall back to defaults.
    #[arg(long = "config", short = 'c')]
    pub config_path: Option<PathBuf>,

    /// Registry port
    #[arg(long)]
    pub port: Option<u16>,

    /// Connector port, defaults to the registry port
    #[arg(long)]
    pub rmi_port: Option<u16>,

    /// Host advertised in the service url when no address is forced
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long)]
    pub authenticate: bool,

    #[arg(long)]
    pub password_file: Option<PathBuf>,

    #[arg(long)]
    pub access_file: Option<PathBuf>,

    /// Only listen on loopback
    #[arg(long)]
    pub force_local_only: bool,

    /// Address (or host name) to bind the management listener to
    #[arg(long)]
    pub bind_address: Option<String>,
}
