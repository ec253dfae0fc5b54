use std::path::{Path, PathBuf};
use std::process::Stdio;

use crate::cache::{self, CacheLayout};
use crate::error::{EsanalyzerError, Result};
use crate::plugin::{PluginInstaller, PluginRef};

const RUNNER_GROUP: &str = "org.codelibs";
const RUNNER_ARTIFACT: &str = "elasticsearch-cluster-runner";
const RETRIEVE_PATTERN: &str = "lib/[artifact]-[revision](-[classifier]).[ext]";

/// Jars pulled in by the resolver that clash with the engine's own copies.
const CONFLICTING_JAR_PREFIXES: &[&str] = &["asm-debug-all", "commons-codec"];

/// A runnable engine installation for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Installation {
    pub version: String,
    pub home: PathBuf,
    pub lib_dir: PathBuf,
    pub es_home: PathBuf,
    pub plugin_home: PathBuf,
    layout: CacheLayout,
}

impl Installation {
    pub fn classpath(&self) -> Result<String> {
        self.layout.classpath(&self.version)
    }
}

/// Makes sure the resolver, the engine runtime, and the requested plugins are
/// on disk. Every step is skipped when its output already exists.
pub struct Provisioner {
    layout: CacheLayout,
    http: reqwest::Client,
    java_bin: PathBuf,
    inherit_output: bool,
}

impl Provisioner {
    pub fn new(layout: CacheLayout, http: reqwest::Client, java_bin: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            http,
            java_bin: java_bin.into(),
            inherit_output: false,
        }
    }

    pub fn with_inherited_output(mut self, inherit: bool) -> Self {
        self.inherit_output = inherit;
        self
    }

    pub fn layout(&self) -> &CacheLayout {
        &self.layout
    }

    pub async fn ensure_installation(
        &self,
        version: &str,
        http_port: u16,
        plugins: &[PluginRef],
    ) -> Result<Installation> {
        std::fs::create_dir_all(self.layout.root())?;

        let resolver_jar = self.layout.resolver_jar();
        if !resolver_jar.exists() {
            tracing::info!("Downloading dependency resolver to {}", resolver_jar.display());
            cache::download(&self.http, &self.layout.resolver().jar_url(), &resolver_jar).await?;
        }

        let home = self.layout.version_home(version);
        std::fs::create_dir_all(&home)?;

        if !self.layout.runner_marker(version).exists() {
            tracing::info!(version, "Resolving engine runtime");
            self.resolve_runtime(version, &home).await?;
            remove_conflicting_jars(&self.layout.lib_dir(version))?;
        }

        let installer = PluginInstaller::new(self.layout.clone(), self.http.clone());
        for plugin in plugins {
            installer.install(plugin, http_port, version).await?;
        }

        Ok(Installation {
            version: version.to_string(),
            home,
            lib_dir: self.layout.lib_dir(version),
            es_home: self.layout.es_home(version, http_port),
            plugin_home: self.layout.plugin_home(version, http_port),
            layout: self.layout.clone(),
        })
    }

    async fn resolve_runtime(&self, version: &str, home: &Path) -> Result<()> {
        let resolver_jar = format!("../{}", self.layout.resolver().jar_name());
        let mut cmd = tokio::process::Command::new(&self.java_bin);
        cmd.arg("-jar")
            .arg(&resolver_jar)
            .arg("-dependency")
            .arg(RUNNER_GROUP)
            .arg(RUNNER_ARTIFACT)
            .arg(version)
            .arg("-retrieve")
            .arg(RETRIEVE_PATTERN)
            .current_dir(home);
        if !self.inherit_output {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let status = cmd.status().await.map_err(|e| {
            EsanalyzerError::Setup(format!(
                "Failed to run {}: {e}",
                self.java_bin.display()
            ))
        })?;

        if !status.success() {
            let code = status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(EsanalyzerError::Setup(format!(
                "Failed to download jar files. exit code: {code}"
            )));
        }
        Ok(())
    }
}

fn remove_conflicting_jars(lib_dir: &Path) -> Result<()> {
    if !lib_dir.exists() {
        return Ok(());
    }
    for entry in std::fs::read_dir(lib_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if CONFLICTING_JAR_PREFIXES.iter().any(|p| name.starts_with(p)) {
            tracing::debug!("Removing conflicting jar {}", name);
            std::fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
