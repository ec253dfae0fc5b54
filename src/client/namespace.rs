use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::{error_body, server_error, EngineClient};
use crate::config::env_parse;
use crate::error::{EsanalyzerError, Result};

const JSON: &str = "application/json";

/// The four definition maps registered under a namespace's `analysis` block.
/// Each maps a component name to its JSON definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDefinitions {
    #[serde(default)]
    pub analyzer: Map<String, Value>,
    #[serde(default)]
    pub tokenizer: Map<String, Value>,
    #[serde(default)]
    pub filter: Map<String, Value>,
    #[serde(default)]
    pub char_filter: Map<String, Value>,
}

impl AnalysisDefinitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyzer(mut self, name: impl Into<String>, def: Value) -> Self {
        self.analyzer.insert(name.into(), def);
        self
    }

    pub fn tokenizer(mut self, name: impl Into<String>, def: Value) -> Self {
        self.tokenizer.insert(name.into(), def);
        self
    }

    pub fn filter(mut self, name: impl Into<String>, def: Value) -> Self {
        self.filter.insert(name.into(), def);
        self
    }

    pub fn char_filter(mut self, name: impl Into<String>, def: Value) -> Self {
        self.char_filter.insert(name.into(), def);
        self
    }
}

/// Index settings used when a namespace is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    /// `-1` disables periodic refresh.
    pub refresh_interval: i64,
}

impl Default for NamespaceSettings {
    fn default() -> Self {
        let shards = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self {
            number_of_shards: shards,
            number_of_replicas: 0,
            refresh_interval: -1,
        }
    }
}

impl NamespaceSettings {
    /// Defaults with `ESANALYZER_SHARDS` applied when set.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(shards) = env_parse::<u32>("ESANALYZER_SHARDS") {
            if shards > 0 {
                settings.number_of_shards = shards;
            } else {
                tracing::warn!("ESANALYZER_SHARDS must be positive, keeping {}", settings.number_of_shards);
            }
        }
        settings
    }

    pub fn with_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = shards.max(1);
        self
    }

    fn create_body(&self, defs: &AnalysisDefinitions) -> Value {
        json!({
            "settings": {
                "index": {
                    "refresh_interval": self.refresh_interval,
                    "number_of_replicas": self.number_of_replicas,
                    "number_of_shards": self.number_of_shards,
                    "analysis": {
                        "filter": defs.filter,
                        "char_filter": defs.char_filter,
                        "analyzer": defs.analyzer,
                        "tokenizer": defs.tokenizer,
                    }
                }
            }
        })
    }
}

impl EngineClient {
    /// Register `defs` under `namespace`. Returns `false` without touching
    /// anything when the namespace already exists.
    pub async fn create_analysis(
        &self,
        namespace: &str,
        defs: &AnalysisDefinitions,
    ) -> Result<bool> {
        let url = self.url(namespace);

        let resp = self.http.head(&url).header(CONTENT_TYPE, JSON).send().await?;
        match resp.status() {
            StatusCode::OK => {
                tracing::debug!(namespace, "namespace already exists");
                return Ok(false);
            }
            StatusCode::NOT_FOUND => {}
            status => {
                return Err(EsanalyzerError::Setup(format!(
                    "Failed to check namespace {namespace}: {status}"
                )))
            }
        }

        let body = self.namespace_settings.create_body(defs);
        let resp = self.http.put(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(EsanalyzerError::Setup(format!(
                "Failed to create namespace {namespace}: {status}: {body}"
            )));
        }

        tracing::info!(namespace, "created namespace");
        Ok(true)
    }

    /// The namespace's `analysis` settings block, or `None` when the
    /// namespace is missing or carries no analysis settings.
    pub async fn get_analysis(&self, namespace: &str) -> Result<Option<Value>> {
        let resp = self
            .http
            .get(self.url(namespace))
            .header(CONTENT_TYPE, JSON)
            .send()
            .await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(EsanalyzerError::Setup(format!(
                "Failed to get namespace {namespace}: {status}: {body}"
            )));
        }

        let mut raw: Value = resp.json().await?;
        Ok(raw
            .get_mut(namespace)
            .and_then(|ns| ns.get_mut("settings"))
            .and_then(|s| s.get_mut("index"))
            .and_then(|i| i.get_mut("analysis"))
            .map(Value::take))
    }

    pub async fn delete_analysis(&self, namespace: &str) -> Result<()> {
        let resp = self
            .http
            .delete(self.url(namespace))
            .header(CONTENT_TYPE, JSON)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(server_error(
                &format!("Failed to delete namespace {namespace}"),
                status,
                &body,
            ));
        }
        tracing::info!(namespace, "deleted namespace");
        Ok(())
    }
}
