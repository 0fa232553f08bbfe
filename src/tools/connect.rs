use anyhow::{Result, bail};
use clap::Parser;
use mgmt_agent::{
    runtime::{ServiceUrl, connect, credentials::Credentials},
    utils::tracing::init_tracing,
};

#[derive(Parser)]
#[command(name = "mgmt-connect")]
#[command(about = "open a connection to a management agent and print its info", long_about = None)]
struct Cli {
    /// e.g. service:jmx:rmi://localhost:9997/jndi/rmi://localhost:9997/jmxrmi
    url: ServiceUrl,

    #[arg(long, short = 'u', requires = "password")]
    username: Option<String>,

    #[arg(long, short = 'p', requires = "username")]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let credentials = match (&cli.username, &cli.password) {
        (Some(username), Some(password)) => Some(Credentials::new(username, password)),
        (None, None) => None,
        _ => bail!("username and password must be given together"),
    };

    let connection = connect(&cli.url, credentials.as_ref()).await?;
    let info = connection.agent_info().await?;

    println!("connection: {}", connection.id());
    println!("access:     {}", connection.access());
    println!("pid:        {}", info.pid);
    println!("uptime:     {}s", info.uptime_secs);
    println!("clients:    {}", info.connection_count);

    connection.close().await?;

    Ok(())
}
