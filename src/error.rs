use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum EsanalyzerError {
    /// Dependency download/resolution failed, or the engine rejected a
    /// namespace create/get. Carries the remote body where there is one.
    #[error("Setup error: {0}")]
    Setup(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Startup error: {0}")]
    Startup(String),

    #[error("Startup error: provisioning failed: {0}")]
    Provisioning(#[source] Box<EsanalyzerError>),

    #[error("Server error: {0}")]
    Server(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(String),

    #[error("Archive error: {0}")]
    Archive(String),
}

pub type Result<T> = std::result::Result<T, EsanalyzerError>;

impl From<std::io::Error> for EsanalyzerError {
    fn from(e: std::io::Error) -> Self {
        EsanalyzerError::Io(e.to_string())
    }
}

impl From<reqwest::Error> for EsanalyzerError {
    fn from(e: reqwest::Error) -> Self {
        EsanalyzerError::Http(e.to_string())
    }
}

impl From<serde_json::Error> for EsanalyzerError {
    fn from(e: serde_json::Error) -> Self {
        EsanalyzerError::Json(e.to_string())
    }
}

impl From<zip::result::ZipError> for EsanalyzerError {
    fn from(e: zip::result::ZipError) -> Self {
        EsanalyzerError::Archive(e.to_string())
    }
}

impl EsanalyzerError {
    /// True for both startup variants, whatever the underlying cause.
    pub fn is_startup(&self) -> bool {
        matches!(
            self,
            EsanalyzerError::Startup(_) | EsanalyzerError::Provisioning(_)
        )
    }
}
