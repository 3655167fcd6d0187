use thiserror::Error;

/// Crate-wide error type, covering only the failures that abort a run:
/// bad configuration and the output destination. Service and parsing
/// failures never surface here; they are absorbed into `Stats`.
#[derive(Error, Debug)]
pub enum GnResolverError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl GnResolverError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, GnResolverError>;
