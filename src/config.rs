use std::path::PathBuf;
use std::time::Duration;

use crate::plugin::PluginRef;

pub const RESOLVER_VERSION: &str = "2.4.0";
pub const DEFAULT_RUNNER_VERSION: &str = "5.6.0.0";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_HTTP_PORT: u16 = 9299;
pub const DEFAULT_TRANSPORT_PORT: u16 = 9399;
pub const DEFAULT_CLUSTER_NAME: &str = "esanpy";
pub const DEFAULT_PLUGINS: &[&str] = &[
    "analysis-icu",
    "analysis-kuromoji",
    "analysis-phonetic",
    "analysis-smartcn",
    "analysis-stempel",
    "analysis-ukrainian",
];
pub const DEFAULT_JAVA_HEAP: &str = "256m";

const HOME_DIR_NAME: &str = ".esanpy";

/// Identifies one launchable engine instance. `http_port` keys the on-disk
/// state (PID file, per-port home directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceKey {
    pub host: String,
    pub http_port: u16,
    pub transport_port: u16,
    pub version: String,
    pub cluster_name: String,
}

impl Default for InstanceKey {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            transport_port: DEFAULT_TRANSPORT_PORT,
            version: DEFAULT_RUNNER_VERSION.to_string(),
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
        }
    }
}

impl InstanceKey {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.http_port)
    }
}

/// Bounded readiness polling: `attempts` probes, sleeping `interval` before each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            attempts: 30,
            interval: Duration::from_secs(1),
        }
    }
}

impl HealthPolicy {
    pub fn ceiling(&self) -> Duration {
        self.interval * self.attempts
    }
}

/// Where the dependency-resolution tool comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub version: String,
    pub repository: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            version: RESOLVER_VERSION.to_string(),
            repository: "https://repo1.maven.org/maven2".to_string(),
        }
    }
}

impl ResolverConfig {
    pub fn jar_name(&self) -> String {
        format!("ivy-{}.jar", self.version)
    }

    pub fn jar_url(&self) -> String {
        format!(
            "{}/org/apache/ivy/ivy/{v}/ivy-{v}.jar",
            self.repository.trim_end_matches('/'),
            v = self.version
        )
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub instance: InstanceKey,
    pub plugins: Vec<PluginRef>,
    /// Cache root, `~/.esanpy` unless overridden.
    pub home: PathBuf,
    pub java_bin: PathBuf,
    pub java_heap: String,
    pub resolver: ResolverConfig,
    pub health: HealthPolicy,
    /// Let child processes write to our stdout/stderr instead of /dev/null.
    pub inherit_output: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            instance: InstanceKey::default(),
            plugins: DEFAULT_PLUGINS
                .iter()
                .map(|name| PluginRef::Name(name.to_string()))
                .collect(),
            home: default_home(),
            java_bin: PathBuf::from("java"),
            java_heap: DEFAULT_JAVA_HEAP.to_string(),
            resolver: ResolverConfig::default(),
            health: HealthPolicy::default(),
            inherit_output: false,
        }
    }
}

impl ServerConfig {
    /// Defaults overlaid with `ESANALYZER_*` environment variables and `JAVA_HOME`.
    /// Values that fail to parse are logged and skipped.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(home) = env_var("ESANALYZER_HOME") {
            config.home = PathBuf::from(home);
        }
        if let Some(host) = env_var("ESANALYZER_HOST") {
            config.instance.host = host;
        }
        if let Some(port) = env_parse::<u16>("ESANALYZER_HTTP_PORT") {
            config.instance.http_port = port;
        }
        if let Some(port) = env_parse::<u16>("ESANALYZER_TRANSPORT_PORT") {
            config.instance.transport_port = port;
        }
        if let Some(version) = env_var("ESANALYZER_VERSION") {
            config.instance.version = version;
        }
        if let Some(name) = env_var("ESANALYZER_CLUSTER_NAME") {
            config.instance.cluster_name = name;
        }
        if let Some(heap) = env_var("ESANALYZER_JAVA_HEAP") {
            config.java_heap = heap;
        }
        if let Some(java_home) = env_var("JAVA_HOME") {
            config.java_bin = PathBuf::from(java_home).join("bin").join("java");
        }
        if let Some(plugins) = env_var("ESANALYZER_PLUGINS") {
            let mut parsed = Vec::new();
            for raw in plugins.split(',').map(str::trim).filter(|s| !s.is_empty()) {
                match raw.parse::<PluginRef>() {
                    Ok(plugin) => parsed.push(plugin),
                    Err(e) => tracing::warn!("Ignoring ESANALYZER_PLUGINS entry {}: {}", raw, e),
                }
            }
            config.plugins = parsed;
        }

        config
    }
}

/// `~/.esanpy`, falling back to a relative `.esanpy` when no home directory is known.
pub fn default_home() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(HOME_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(HOME_DIR_NAME))
}

pub(crate) fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env_var(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("Ignoring {}={}: {}", name, raw, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ESANALYZER_HOME",
        "ESANALYZER_HOST",
        "ESANALYZER_HTTP_PORT",
        "ESANALYZER_TRANSPORT_PORT",
        "ESANALYZER_VERSION",
        "ESANALYZER_CLUSTER_NAME",
        "ESANALYZER_JAVA_HEAP",
        "ESANALYZER_PLUGINS",
        "JAVA_HOME",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_instance_defaults() {
        let key = InstanceKey::default();
        assert_eq!(key.http_port, 9299);
        assert_eq!(key.transport_port, 9399);
        assert_eq!(key.version, "5.6.0.0");
        assert_eq!(key.cluster_name, "esanpy");
        assert_eq!(key.base_url(), "http://localhost:9299");
    }

    #[test]
    fn test_health_policy_ceiling() {
        assert_eq!(HealthPolicy::default().ceiling(), Duration::from_secs(30));
    }

    #[test]
    fn test_resolver_url() {
        let resolver = ResolverConfig::default();
        assert_eq!(resolver.jar_name(), "ivy-2.4.0.jar");
        assert_eq!(
            resolver.jar_url(),
            "https://repo1.maven.org/maven2/org/apache/ivy/ivy/2.4.0/ivy-2.4.0.jar"
        );
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = ServerConfig::from_env();
        assert_eq!(config.instance, InstanceKey::default());
        assert_eq!(config.plugins.len(), DEFAULT_PLUGINS.len());
        assert!(config.home.ends_with(".esanpy"));
        assert_eq!(config.java_bin, PathBuf::from("java"));
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("ESANALYZER_HOME", "/tmp/esanalyzer-test-home");
        std::env::set_var("ESANALYZER_HTTP_PORT", "19299");
        std::env::set_var("ESANALYZER_CLUSTER_NAME", "analysis");
        std::env::set_var("ESANALYZER_PLUGINS", "analysis-icu, org.codelibs:elasticsearch-analysis-ja:5.6.0");
        std::env::set_var("JAVA_HOME", "/opt/jdk");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.home, PathBuf::from("/tmp/esanalyzer-test-home"));
        assert_eq!(config.instance.http_port, 19299);
        assert_eq!(config.instance.transport_port, DEFAULT_TRANSPORT_PORT);
        assert_eq!(config.instance.cluster_name, "analysis");
        assert_eq!(config.java_bin, PathBuf::from("/opt/jdk/bin/java"));
        assert_eq!(config.plugins.len(), 2);
        assert!(matches!(config.plugins[1], PluginRef::Coordinate { .. }));
    }

    #[test]
    #[serial]
    fn test_from_env_ignores_bad_values() {
        clear_env();
        std::env::set_var("ESANALYZER_HTTP_PORT", "not-a-port");
        std::env::set_var("ESANALYZER_PLUGINS", "broken:coordinate,analysis-icu");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.instance.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.plugins, vec![PluginRef::Name("analysis-icu".into())]);
    }
}
