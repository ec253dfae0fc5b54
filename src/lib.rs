//! Run text through Elasticsearch analyzers without managing Elasticsearch.
//!
//! The library downloads a cluster-runner distribution into `~/.esanpy`,
//! installs analysis plugins, launches a single-node engine on a local port,
//! and exposes the engine's `_analyze` and index-settings endpoints.
//!
//! ```no_run
//! # async fn demo() -> esanalyzer::Result<()> {
//! use esanalyzer::{AnalyzeRequest, EngineClient, ServerConfig};
//!
//! let config = ServerConfig::from_env();
//! esanalyzer::start_server(&config).await?;
//!
//! let client = EngineClient::new(&config.instance.host, config.instance.http_port);
//! let tokens = client.analyze(&AnalyzeRequest::new("This is a pen.")).await?;
//! println!("{:?}", tokens);
//!
//! esanalyzer::stop_server(&config)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod plugin;
pub mod provision;
pub mod supervisor;

pub use cache::CacheLayout;
pub use client::{
    token_records, token_texts, Analysis, AnalysisDefinitions, AnalyzeRequest, AnalyzeToken,
    EngineClient, NamespaceSettings, Pipeline,
};
pub use config::{HealthPolicy, InstanceKey, ResolverConfig, ServerConfig};
pub use error::{EsanalyzerError, Result};
pub use plugin::{PluginInstall, PluginInstaller, PluginRef};
pub use provision::{Installation, Provisioner};
pub use supervisor::{EngineSupervisor, LifecycleState, StartOutcome, StopOutcome};

/// Make sure an engine for `config.instance` is answering, provisioning and
/// launching one if needed.
pub async fn start_server(config: &ServerConfig) -> Result<StartOutcome> {
    EngineSupervisor::new(config.clone()).start().await
}

/// Kill the engine recorded for `config.instance`, if any.
pub fn stop_server(config: &ServerConfig) -> Result<StopOutcome> {
    EngineSupervisor::new(config.clone()).stop()
}
