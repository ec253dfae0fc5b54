pub mod analyze;
pub mod namespace;

pub use analyze::{token_records, token_texts, Analysis, AnalyzeRequest, AnalyzeToken, Pipeline};
pub use namespace::{AnalysisDefinitions, NamespaceSettings};

use crate::config::{DEFAULT_HOST, DEFAULT_HTTP_PORT};
use crate::error::EsanalyzerError;

/// Thin JSON-over-HTTP client for a running engine. Stateless apart from the
/// connection pool; the engine is the source of truth for everything.
#[derive(Debug, Clone)]
pub struct EngineClient {
    base_url: String,
    http: reqwest::Client,
    namespace_settings: NamespaceSettings,
}

impl Default for EngineClient {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_HTTP_PORT)
    }
}

impl EngineClient {
    pub fn new(host: &str, http_port: u16) -> Self {
        Self::with_base_url(format!("http://{}:{}", host, http_port))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            namespace_settings: NamespaceSettings::from_env(),
        }
    }

    pub fn with_namespace_settings(mut self, settings: NamespaceSettings) -> Self {
        self.namespace_settings = settings;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn namespace_settings(&self) -> &NamespaceSettings {
        &self.namespace_settings
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Body text of a failed response, for error messages.
async fn error_body(resp: reqwest::Response) -> String {
    resp.text()
        .await
        .unwrap_or_else(|_| "failed to read response body".into())
}

fn server_error(context: &str, status: reqwest::StatusCode, body: &str) -> EsanalyzerError {
    EsanalyzerError::Server(format!("{context}: {status}: {body}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls() {
        let client = EngineClient::new("localhost", 9299);
        assert_eq!(client.base_url(), "http://localhost:9299");
        assert_eq!(client.url("/_analyze"), "http://localhost:9299/_analyze");
        assert_eq!(client.url("case1/_analyze"), "http://localhost:9299/case1/_analyze");

        let client = EngineClient::with_base_url("http://127.0.0.1:1234/");
        assert_eq!(client.url("case1"), "http://127.0.0.1:1234/case1");
    }

    #[test]
    fn test_default_points_at_default_port() {
        assert_eq!(EngineClient::default().base_url(), "http://localhost:9299");
    }
}
