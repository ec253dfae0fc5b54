use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::cache::{self, CacheLayout};
use crate::error::{EsanalyzerError, Result};

const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
const OFFICIAL_PLUGINS: &str = "https://artifacts.elastic.co/downloads/elasticsearch-plugins";

/// A plugin to install into an engine instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginRef {
    /// Official plugin short name, e.g. `analysis-kuromoji`.
    Name(String),
    /// Maven coordinate of a zip artifact, `group:artifact:version`.
    Coordinate {
        group: String,
        artifact: String,
        version: String,
    },
    Url(url::Url),
}

impl FromStr for PluginRef {
    type Err = EsanalyzerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EsanalyzerError::InvalidArgument(
                "Empty plugin name".to_string(),
            ));
        }

        if s.starts_with("http://") || s.starts_with("https://") {
            let url = url::Url::parse(s).map_err(|e| {
                EsanalyzerError::InvalidArgument(format!("Invalid plugin URL {s}: {e}"))
            })?;
            return Ok(PluginRef::Url(url));
        }

        if s.contains(':') {
            let parts: Vec<&str> = s.split(':').collect();
            if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
                return Err(EsanalyzerError::InvalidArgument(format!(
                    "Unknown plugin name: {s}"
                )));
            }
            return Ok(PluginRef::Coordinate {
                group: parts[0].to_string(),
                artifact: parts[1].to_string(),
                version: parts[2].to_string(),
            });
        }

        Ok(PluginRef::Name(s.to_string()))
    }
}

impl fmt::Display for PluginRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginRef::Name(name) => write!(f, "{name}"),
            PluginRef::Coordinate {
                group,
                artifact,
                version,
            } => write!(f, "{group}:{artifact}:{version}"),
            PluginRef::Url(url) => write!(f, "{url}"),
        }
    }
}

impl PluginRef {
    /// Download URL. Official names are pinned to the first three components
    /// of the engine version (`5.6.0.0` → `5.6.0`).
    pub fn resolve_url(&self, engine_version: &str) -> String {
        match self {
            PluginRef::Url(url) => url.to_string(),
            PluginRef::Coordinate {
                group,
                artifact,
                version,
            } => format!(
                "{MAVEN_CENTRAL}/{}/{artifact}/{version}/{artifact}-{version}.zip",
                group.replace('.', "/")
            ),
            PluginRef::Name(name) => {
                let release = engine_version
                    .split('.')
                    .take(3)
                    .collect::<Vec<_>>()
                    .join(".");
                format!("{OFFICIAL_PLUGINS}/{name}/{name}-{release}.zip")
            }
        }
    }

    /// Directory name the plugin is unpacked to: last URL path segment with
    /// the archive extension stripped.
    pub fn slug(&self, engine_version: &str) -> String {
        let url = self.resolve_url(engine_version);
        let last = url
            .split(['?', '#'])
            .next()
            .unwrap_or(&url)
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        last.strip_suffix(".zip").unwrap_or(last).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginInstall {
    Installed(PathBuf),
    AlreadyPresent(PathBuf),
}

impl PluginInstall {
    pub fn path(&self) -> &Path {
        match self {
            PluginInstall::Installed(p) | PluginInstall::AlreadyPresent(p) => p,
        }
    }
}

/// Fetches and unpacks plugin archives into an instance's plugin directory.
pub struct PluginInstaller {
    layout: CacheLayout,
    http: reqwest::Client,
}

impl PluginInstaller {
    pub fn new(layout: CacheLayout, http: reqwest::Client) -> Self {
        Self { layout, http }
    }

    /// Idempotent: returns `AlreadyPresent` without any network traffic when
    /// the plugin directory exists.
    pub async fn install(
        &self,
        plugin: &PluginRef,
        http_port: u16,
        version: &str,
    ) -> Result<PluginInstall> {
        let plugin_home = self.layout.plugin_home(version, http_port);
        std::fs::create_dir_all(&plugin_home)?;

        let plugin_dir = plugin_home.join(plugin.slug(version));
        if plugin_dir.exists() {
            tracing::debug!("Plugin {} already installed at {}", plugin, plugin_dir.display());
            return Ok(PluginInstall::AlreadyPresent(plugin_dir));
        }

        let url = plugin.resolve_url(version);
        let staging_root = self.layout.version_home(version);
        let archive_dir = tempfile::TempDir::new_in(&staging_root)?;
        let archive_path = archive_dir.path().join("plugin.zip");
        cache::download(&self.http, &url, &archive_path).await?;

        let extract_dir = tempfile::TempDir::new_in(&staging_root)?;
        unpack(&archive_path, extract_dir.path())?;

        let top = single_top_level_dir(extract_dir.path()).map_err(|e| {
            EsanalyzerError::Setup(format!("Unexpected layout in plugin archive {url}: {e}"))
        })?;

        tracing::debug!("Renaming to {}", plugin_dir.display());
        std::fs::rename(&top, &plugin_dir)?;
        tracing::info!(plugin = %plugin, "Installed plugin into {}", plugin_dir.display());

        Ok(PluginInstall::Installed(plugin_dir))
    }
}

fn unpack(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    archive.extract(dest)?;
    Ok(())
}

fn single_top_level_dir(dir: &Path) -> std::result::Result<PathBuf, String> {
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| e.to_string())? {
        let entry = entry.map_err(|e| e.to_string())?;
        let name = entry.file_name();
        if name.to_string_lossy().starts_with("__MACOSX") {
            continue;
        }
        if entry.path().is_dir() {
            dirs.push(entry.path());
        }
    }
    match dirs.len() {
        1 => Ok(dirs.remove(0)),
        0 => Err("no top-level directory".to_string()),
        n => Err(format!("{n} top-level directories")),
    }
}
