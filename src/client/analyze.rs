use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{error_body, server_error, EngineClient};
use crate::error::{EsanalyzerError, Result};

pub const DEFAULT_ANALYZER: &str = "standard";
pub const DEFAULT_TOKENIZER: &str = "keyword";

/// Which analysis chain to run: a registered analyzer, or an ad hoc
/// tokenizer + filters. Filters may be names or inline JSON definitions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Pipeline {
    Named {
        analyzer: String,
    },
    Custom {
        tokenizer: String,
        filter: Vec<Value>,
        char_filter: Vec<Value>,
    },
}

/// Body of `POST /_analyze` (or `/<namespace>/_analyze`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyzeRequest {
    #[serde(flatten)]
    pub pipeline: Pipeline,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    explain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<Vec<String>>,
    #[serde(skip)]
    namespace: Option<String>,
}

impl AnalyzeRequest {
    /// Run `text` through the `standard` analyzer.
    pub fn new(text: impl Into<String>) -> Self {
        Self::analyzer(DEFAULT_ANALYZER, text)
    }

    pub fn analyzer(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::with_pipeline(
            Pipeline::Named {
                analyzer: name.into(),
            },
            text,
        )
    }

    pub fn custom<F, C>(
        tokenizer: impl Into<String>,
        filters: F,
        char_filters: C,
        text: impl Into<String>,
    ) -> Self
    where
        F: IntoIterator,
        F::Item: Into<Value>,
        C: IntoIterator,
        C::Item: Into<Value>,
    {
        Self::with_pipeline(
            Pipeline::Custom {
                tokenizer: tokenizer.into(),
                filter: filters.into_iter().map(Into::into).collect(),
                char_filter: char_filters.into_iter().map(Into::into).collect(),
            },
            text,
        )
    }

    fn with_pipeline(pipeline: Pipeline, text: impl Into<String>) -> Self {
        Self {
            pipeline,
            text: text.into(),
            explain: None,
            attributes: None,
            namespace: None,
        }
    }

    /// Analyze inside a namespace so its registered analysis chains resolve.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Ask for per-stage explain output restricted to `attributes`.
    pub fn explain<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.explain = Some(true);
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_explain(&self) -> bool {
        self.explain == Some(true)
    }

    pub fn path(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("/{ns}/_analyze"),
            None => "/_analyze".to_string(),
        }
    }
}

/// One token of a plain (non-explain) analyze response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeToken {
    pub token: String,
    #[serde(default)]
    pub start_offset: u64,
    #[serde(default)]
    pub end_offset: u64,
    #[serde(default)]
    pub position: u64,
    #[serde(rename = "type", default)]
    pub token_type: String,
    /// Backend-specific fields, e.g. explain attributes.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TokensEnvelope {
    tokens: Vec<AnalyzeToken>,
}

/// Result of [`EngineClient::analyze`].
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    /// Token texts in order; the default conversion.
    Tokens(Vec<String>),
    /// Unconverted response, returned for explain requests.
    Raw(Value),
}

impl Analysis {
    /// Token texts, or `None` for an unconverted explain response.
    pub fn into_tokens(self) -> Option<Vec<String>> {
        match self {
            Analysis::Tokens(tokens) => Some(tokens),
            Analysis::Raw(_) => None,
        }
    }
}

fn parse_tokens(raw: Value) -> Result<Vec<AnalyzeToken>> {
    if raw.get("tokens").is_none() {
        return Err(EsanalyzerError::Json(
            "analyze response has no tokens array".to_string(),
        ));
    }
    let envelope: TokensEnvelope = serde_json::from_value(raw)?;
    Ok(envelope.tokens)
}

/// Default converter: the ordered token texts.
pub fn token_texts(raw: Value) -> Result<Vec<String>> {
    Ok(parse_tokens(raw)?.into_iter().map(|t| t.token).collect())
}

/// Converter keeping offsets, positions and types.
pub fn token_records(raw: Value) -> Result<Vec<AnalyzeToken>> {
    parse_tokens(raw)
}

impl EngineClient {
    /// Analyze with the default conversion. Explain requests come back
    /// unconverted as [`Analysis::Raw`]; use [`EngineClient::analyze_with`] to
    /// shape them.
    pub async fn analyze(&self, req: &AnalyzeRequest) -> Result<Analysis> {
        if req.text.is_empty() {
            return Ok(Analysis::Tokens(Vec::new()));
        }
        let raw = self.send_analyze(req).await?;
        if req.is_explain() {
            Ok(Analysis::Raw(raw))
        } else {
            token_texts(raw).map(Analysis::Tokens)
        }
    }

    /// Analyze and hand the raw response to `convert`. Empty text makes no
    /// request; `convert` receives `{"tokens": []}` instead.
    pub async fn analyze_with<T, F>(&self, req: &AnalyzeRequest, convert: F) -> Result<T>
    where
        F: FnOnce(Value) -> Result<T>,
    {
        if req.text.is_empty() {
            return convert(serde_json::json!({ "tokens": [] }));
        }
        let raw = self.send_analyze(req).await?;
        convert(raw)
    }

    /// Token texts for `text` under the named analyzer.
    pub async fn analyze_text(&self, analyzer: &str, text: &str) -> Result<Vec<String>> {
        self.analyze_with(&AnalyzeRequest::analyzer(analyzer, text), token_texts)
            .await
    }

    /// Token texts for an ad hoc tokenizer + filter chain, no namespace needed.
    pub async fn custom_analyze<F, C>(
        &self,
        text: &str,
        tokenizer: &str,
        filters: F,
        char_filters: C,
    ) -> Result<Vec<String>>
    where
        F: IntoIterator,
        F::Item: Into<Value>,
        C: IntoIterator,
        C::Item: Into<Value>,
    {
        let req = AnalyzeRequest::custom(tokenizer, filters, char_filters, text);
        self.analyze_with(&req, token_texts).await
    }

    async fn send_analyze(&self, req: &AnalyzeRequest) -> Result<Value> {
        let resp = self
            .http
            .post(self.url(&req.path()))
            .json(req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = error_body(resp).await;
            return Err(server_error("Failed to analyze text", status, &body));
        }

        Ok(resp.json::<Value>().await?)
    }
}
