//! On-disk artifact cache.
//!
//! Layout under the cache root (`~/.esanpy` by default):
//! - `ivy-<resolver>.jar`: dependency resolver, downloaded once
//! - `<version>/lib/*.jar`: engine launcher classpath, resolved once per version
//! - `<version>/es_home_<port>/`: per-port data and plugin root
//! - `<version>/<port>.pid`: process record of a launched engine

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ResolverConfig;
use crate::error::{EsanalyzerError, Result};

/// Pure path arithmetic over the cache root. Nothing here touches the disk
/// except [`CacheLayout::classpath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    root: PathBuf,
    resolver: ResolverConfig,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>, resolver: ResolverConfig) -> Self {
        Self {
            root: root.into(),
            resolver,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn resolver(&self) -> &ResolverConfig {
        &self.resolver
    }

    pub fn resolver_jar(&self) -> PathBuf {
        self.root.join(self.resolver.jar_name())
    }

    pub fn version_home(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    pub fn lib_dir(&self, version: &str) -> PathBuf {
        self.version_home(version).join("lib")
    }

    /// Present once the runner's dependencies have been retrieved.
    pub fn runner_marker(&self, version: &str) -> PathBuf {
        self.lib_dir(version)
            .join(format!("elasticsearch-cluster-runner-{}.jar", version))
    }

    pub fn es_home(&self, version: &str, http_port: u16) -> PathBuf {
        self.version_home(version)
            .join(format!("es_home_{}", http_port))
    }

    pub fn plugin_home(&self, version: &str, http_port: u16) -> PathBuf {
        self.es_home(version, http_port).join("plugins")
    }

    pub fn pid_file(&self, version: &str, http_port: u16) -> PathBuf {
        self.version_home(version)
            .join(format!("{}.pid", http_port))
    }

    pub fn log_file(&self, version: &str, http_port: u16, cluster_name: &str) -> PathBuf {
        self.es_home(version, http_port)
            .join("logs")
            .join("node_1")
            .join(format!("{}.log", cluster_name))
    }

    /// Every `*.jar` in the version's `lib/` directory, sorted.
    pub fn classpath_entries(&self, version: &str) -> Result<Vec<PathBuf>> {
        let lib_dir = self.lib_dir(version);
        let mut jars = Vec::new();
        for entry in std::fs::read_dir(&lib_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jar") {
                jars.push(path);
            }
        }
        jars.sort();
        Ok(jars)
    }

    /// Classpath string joined with the platform separator.
    pub fn classpath(&self, version: &str) -> Result<String> {
        let entries = self.classpath_entries(version)?;
        let joined = std::env::join_paths(&entries)
            .map_err(|e| EsanalyzerError::Setup(format!("invalid classpath entry: {e}")))?;
        Ok(joined.to_string_lossy().into_owned())
    }
}

/// Download `url` to `dest`. The body lands in a temp file next to `dest` and
/// is renamed into place only when complete.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    tracing::debug!("Downloading {} to {}", url, dest.display());

    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| EsanalyzerError::Setup(format!("Failed to download {url}: {e}")))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(EsanalyzerError::Setup(format!(
            "Failed to download {url}: server returned {status}"
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| EsanalyzerError::Setup(format!("Failed to read {url}: {e}")))?;

    let parent = dest
        .parent()
        .ok_or_else(|| EsanalyzerError::Io(format!("no parent directory for {}", dest.display())))?;
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(&bytes)?;
    tmp.flush()?;
    tmp.persist(dest).map_err(|e| EsanalyzerError::Io(e.error.to_string()))?;

    tracing::debug!("Downloaded {} ({} bytes)", url, bytes.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn layout(root: &Path) -> CacheLayout {
        CacheLayout::new(root, ResolverConfig::default())
    }

    #[test]
    fn test_layout_paths() {
        let l = layout(Path::new("/home/u/.esanpy"));
        assert_eq!(l.resolver_jar(), PathBuf::from("/home/u/.esanpy/ivy-2.4.0.jar"));
        assert_eq!(l.version_home("5.6.0.0"), PathBuf::from("/home/u/.esanpy/5.6.0.0"));
        assert_eq!(l.lib_dir("5.6.0.0"), PathBuf::from("/home/u/.esanpy/5.6.0.0/lib"));
        assert_eq!(
            l.runner_marker("5.6.0.0"),
            PathBuf::from("/home/u/.esanpy/5.6.0.0/lib/elasticsearch-cluster-runner-5.6.0.0.jar")
        );
        assert_eq!(
            l.es_home("5.6.0.0", 9299),
            PathBuf::from("/home/u/.esanpy/5.6.0.0/es_home_9299")
        );
        assert_eq!(
            l.plugin_home("5.6.0.0", 9299),
            PathBuf::from("/home/u/.esanpy/5.6.0.0/es_home_9299/plugins")
        );
        assert_eq!(
            l.pid_file("5.6.0.0", 9299),
            PathBuf::from("/home/u/.esanpy/5.6.0.0/9299.pid")
        );
        assert_eq!(
            l.log_file("5.6.0.0", 9299, "esanpy"),
            PathBuf::from("/home/u/.esanpy/5.6.0.0/es_home_9299/logs/node_1/esanpy.log")
        );
    }

    #[test]
    fn test_classpath_only_jars_sorted() {
        let tmp = TempDir::new().unwrap();
        let l = layout(tmp.path());
        let lib = l.lib_dir("5.6.0.0");
        std::fs::create_dir_all(&lib).unwrap();
        for name in ["b.jar", "a.jar", "notes.txt", "c.jar.part"] {
            std::fs::write(lib.join(name), b"").unwrap();
        }

        let entries = l.classpath_entries("5.6.0.0").unwrap();
        assert_eq!(entries, vec![lib.join("a.jar"), lib.join("b.jar")]);

        let cp = l.classpath("5.6.0.0").unwrap();
        assert!(cp.contains("a.jar"));
        assert!(!cp.contains("notes.txt"));
    }

    #[test]
    fn test_classpath_missing_lib_dir() {
        let tmp = TempDir::new().unwrap();
        let result = layout(tmp.path()).classpath("9.9.9.9");
        assert!(matches!(result, Err(EsanalyzerError::Io(_))));
    }

    #[tokio::test]
    async fn test_download_writes_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ivy.jar"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jar-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("nested").join("ivy.jar");
        download(&reqwest::Client::new(), &format!("{}/ivy.jar", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jar-bytes");
    }

    #[tokio::test]
    async fn test_download_error_leaves_no_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("ivy.jar");
        let result =
            download(&reqwest::Client::new(), &format!("{}/ivy.jar", server.uri()), &dest).await;

        assert!(matches!(result, Err(EsanalyzerError::Setup(ref m)) if m.contains("404")));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
