use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::core::config::ResolverConfig;
use crate::core::error::Result;
use crate::core::resolver::{ResolveControl, Resolver};
use crate::core::stats::Stats;
use crate::io::reader::NameReader;
use crate::io::writer::CsvWriter;
use crate::service::{GnIndexClient, NameResolutionService};

/// File-to-file run settings.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub alt_headers: Vec<String>,
    pub config: ResolverConfig,
}

impl RunOptions {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            alt_headers: Vec::new(),
            config: ResolverConfig::default(),
        }
    }
}

/// Wires reader, service client, resolver and writer for a whole run and
/// returns the final Stats.
pub async fn run<F>(opts: RunOptions, on_progress: F) -> Result<Stats>
where
    F: FnMut(&Stats) -> ResolveControl,
{
    let client = Arc::new(GnIndexClient::new(
        opts.config.resolver_url.clone(),
        opts.config.timeout,
    ));
    run_with_service(opts, client, on_progress).await
}

pub async fn run_with_service<F>(
    opts: RunOptions,
    service: Arc<dyn NameResolutionService>,
    on_progress: F,
) -> Result<Stats>
where
    F: FnMut(&Stats) -> ResolveControl,
{
    opts.config.validate()?;
    let mut stats = Stats::new();

    let input = File::open(&opts.input)?;
    let reader = NameReader::new(
        input,
        opts.input.display().to_string(),
        opts.config.skip_original,
        opts.alt_headers.clone(),
    );
    let read = reader.read(&mut stats)?;

    let output = File::create(&opts.output)?;
    let writer = CsvWriter::new(
        output,
        &read.original_fields,
        opts.config.with_classification,
        opts.output.display().to_string(),
    )?;

    let workers = opts.config.workers;
    let mut resolver = Resolver::with_stats(service, Box::new(writer), opts.config, stats)?;
    let stats = if workers > 1 {
        resolver.resolve_parallel(&read.queries, on_progress).await?
    } else {
        resolver.resolve(&read.queries, on_progress).await?
    };
    info!(
        "Run finished: {}/{} records resolved",
        stats.resolved_records, stats.total_records
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::GnResolverError;

    #[tokio::test]
    async fn test_missing_input_is_io_error() {
        let opts = RunOptions::new("/nonexistent/input.csv", "/nonexistent/output.csv");
        let err = run(opts, |_| ResolveControl::Continue).await.unwrap_err();
        assert!(matches!(err, GnResolverError::Io(_)));
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_any_io() {
        let mut opts = RunOptions::new("/nonexistent/input.csv", "/nonexistent/output.csv");
        opts.config.workers = 0;
        let err = run(opts, |_| ResolveControl::Continue).await.unwrap_err();
        assert!(matches!(err, GnResolverError::Configuration(_)));
    }
}
