mod gnindex;

pub use gnindex::GnIndexClient;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::models::{NameRequest, ResolvedResponse};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service returned status {0}")]
    Status(u16),

    #[error("GraphQL error: {0}")]
    GraphQl(String),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// The remote name-matching backend. The pipeline depends only on this
/// contract, so tests substitute an in-memory implementation.
#[async_trait]
pub trait NameResolutionService: Send + Sync {
    async fn resolve(
        &self,
        names: &[NameRequest],
        data_source_ids: &[i32],
    ) -> Result<Vec<ResolvedResponse>, ServiceError>;
}
