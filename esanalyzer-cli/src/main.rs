use std::path::PathBuf;

use clap::Parser;
use esanalyzer::{AnalyzeRequest, EngineClient, PluginRef, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "esanalyzer", about = "Analyze text with a local Elasticsearch")]
struct Cli {
    /// Cluster-runner version to provision and launch
    #[arg(long, env = "ESANALYZER_VERSION")]
    runner_version: Option<String>,
    #[arg(long, env = "ESANALYZER_CLUSTER_NAME")]
    cluster_name: Option<String>,
    #[arg(long, env = "ESANALYZER_HOST")]
    host: Option<String>,
    #[arg(long, env = "ESANALYZER_HTTP_PORT")]
    http_port: Option<u16>,
    #[arg(long, env = "ESANALYZER_TRANSPORT_PORT")]
    transport_port: Option<u16>,

    /// Cache root (defaults to ~/.esanpy)
    #[arg(long, env = "ESANALYZER_HOME")]
    home: Option<PathBuf>,

    #[arg(long, default_value = "standard")]
    analyzer_name: String,
    /// Text to analyze; tokens are printed one per line
    #[arg(long)]
    text: Option<String>,

    /// Plugin name, group:artifact:version coordinate, or zip URL. Repeatable;
    /// replaces the default plugin set.
    #[arg(long = "plugin", value_name = "PLUGIN")]
    plugins: Vec<PluginRef>,

    #[arg(short, long)]
    verbose: bool,

    /// Stop the engine before exiting
    #[arg(long)]
    stop: bool,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::from_env();
        if let Some(version) = &self.runner_version {
            config.instance.version = version.clone();
        }
        if let Some(name) = &self.cluster_name {
            config.instance.cluster_name = name.clone();
        }
        if let Some(host) = &self.host {
            config.instance.host = host.clone();
        }
        if let Some(port) = self.http_port {
            config.instance.http_port = port;
        }
        if let Some(port) = self.transport_port {
            config.instance.transport_port = port;
        }
        if let Some(home) = &self.home {
            config.home = home.clone();
        }
        if !self.plugins.is_empty() {
            config.plugins = self.plugins.clone();
        }
        config.inherit_output = self.verbose;
        config
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.server_config();
    let outcome = esanalyzer::start_server(&config).await?;
    tracing::debug!("start: {:?}", outcome);

    if let Some(text) = &cli.text {
        let client = EngineClient::new(&config.instance.host, config.instance.http_port);
        let result = client
            .analyze_with(
                &AnalyzeRequest::analyzer(&cli.analyzer_name, text.as_str()),
                esanalyzer::token_texts,
            )
            .await;
        match result {
            Ok(tokens) => {
                for token in tokens {
                    println!("{}", token);
                }
            }
            Err(e) => {
                if cli.stop {
                    esanalyzer::stop_server(&config)?;
                }
                return Err(e.into());
            }
        }
    }

    if cli.stop {
        let outcome = esanalyzer::stop_server(&config)?;
        tracing::debug!("stop: {:?}", outcome);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_overlay_config() {
        let cli = Cli::try_parse_from([
            "esanalyzer",
            "--runner-version",
            "5.6.1.0",
            "--http-port",
            "9200",
            "--home",
            "/tmp/es-cache",
            "--plugin",
            "analysis-icu",
            "--plugin",
            "org.example:my-plugin:1.0",
            "-v",
        ])
        .unwrap();
        let config = cli.server_config();
        assert_eq!(config.instance.version, "5.6.1.0");
        assert_eq!(config.instance.http_port, 9200);
        assert_eq!(config.home, PathBuf::from("/tmp/es-cache"));
        assert_eq!(config.plugins.len(), 2);
        assert!(matches!(config.plugins[1], PluginRef::Coordinate { .. }));
        assert!(config.inherit_output);
        assert_eq!(cli.analyzer_name, "standard");
    }

    #[test]
    fn malformed_plugin_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["esanalyzer", "--plugin", "group:artifact"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
