use std::time::Duration;

use crate::core::error::{GnResolverError, Result};
use crate::{DEFAULT_BATCH_SIZE, DEFAULT_RESOLVER_URL, DEFAULT_TIMEOUT_SECS, MAX_WORKERS};

/// Settings for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    pub resolver_url: String,
    pub data_source_ids: Vec<i32>,
    pub batch_size: usize,
    pub workers: usize,
    pub skip_original: bool,
    pub with_classification: bool,
    pub timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolver_url: resolver_url_from_env(),
            data_source_ids: Vec::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            workers: 1,
            skip_original: false,
            with_classification: false,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(GnResolverError::configuration("batch size must be positive"));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(GnResolverError::configuration(format!(
                "worker count must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        Ok(())
    }
}

pub fn resolver_url_from_env() -> String {
    std::env::var("GN_RESOLVER_URL").unwrap_or_else(|_| DEFAULT_RESOLVER_URL.to_string())
}
