mod logging;

use std::path::PathBuf;

use clap::Parser;

use waypost_proxy::{Proxy, ProxyConfig, ProxyError};

#[derive(Debug, Parser)]
#[command(name = "waypost", about = "Transparent HTTP/1.x forward proxy")]
struct Cli {
    /// Port to listen on (default 5042)
    port: Option<u16>,
    /// Address to bind
    #[arg(long)]
    host: Option<String>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long = "log-json")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    let cli = Cli::parse();
    logging::init_tracing(cli.log_json);

    let config = build_config(&cli).map_err(|err| err.to_string())?;
    let (proxy, events) = Proxy::new(config).map_err(|err| err.to_string())?;

    let log_task = tokio::spawn(logging::log_events(events));
    let result = proxy.run().await;
    log_task.abort();

    result.map_err(|err| {
        tracing::error!(error = %err, "proxy stopped");
        err.to_string()
    })
}

fn build_config(cli: &Cli) -> Result<ProxyConfig, ProxyError> {
    let mut config = match &cli.config {
        Some(path) => ProxyConfig::load(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(host) = &cli.host {
        config.listen.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.listen.port = port;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, build_config};

    #[test]
    fn defaults_to_port_5042() {
        let cli = Cli::try_parse_from(["waypost"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.listen.port, 5042);
    }

    #[test]
    fn positional_port_overrides_default() {
        let cli = Cli::try_parse_from(["waypost", "8081", "--host", "127.0.0.1"]).unwrap();
        let config = build_config(&cli).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:8081");
    }

    #[test]
    fn rejects_non_numeric_port() {
        assert!(Cli::try_parse_from(["waypost", "http"]).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["waypost", "--config", "/nonexistent/waypost.toml"]).unwrap();
        assert!(build_config(&cli).is_err());
    }
}
