mod job;
mod processor;

pub use job::{JobOutcome, ResolverJob};
pub use processor::ResultProcessor;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{error, info, warn};

use crate::core::config::ResolverConfig;
use crate::core::error::Result;
use crate::core::models::{NameQuery, NameRequest, ResolvedResponse, RowMeta};
use crate::core::stats::Stats;
use crate::io::writer::RowWriter;
use crate::service::NameResolutionService;

/// Verdict a progress callback returns after each batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveControl {
    Continue,
    Stop,
}

/// Orchestrates a run: batches the queries, calls the resolution service
/// with per-item fallback, streams results through the processor and keeps
/// Stats current for the caller's progress callback.
pub struct Resolver {
    service: Arc<dyn NameResolutionService>,
    processor: ResultProcessor,
    config: ResolverConfig,
    stats: Stats,
}

impl Resolver {
    pub fn new(
        service: Arc<dyn NameResolutionService>,
        writer: Box<dyn RowWriter>,
        config: ResolverConfig,
    ) -> Result<Self> {
        Self::with_stats(service, writer, config, Stats::new())
    }

    /// Builds a resolver around stats that already carry ingestion counts.
    pub fn with_stats(
        service: Arc<dyn NameResolutionService>,
        writer: Box<dyn RowWriter>,
        config: ResolverConfig,
        stats: Stats,
    ) -> Result<Self> {
        config.validate()?;
        let processor = ResultProcessor::new(writer, config.with_classification);
        Ok(Self {
            service,
            processor,
            config,
            stats,
        })
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub async fn resolve_all(&mut self, queries: &[NameQuery]) -> Result<Stats> {
        self.resolve(queries, |_| ResolveControl::Continue).await
    }

    /// Sequential baseline: one batch fully completes before the next
    /// begins, so output order mirrors input order.
    pub async fn resolve<F>(&mut self, queries: &[NameQuery], mut on_progress: F) -> Result<Stats>
    where
        F: FnMut(&Stats) -> ResolveControl,
    {
        self.stats.begin_resolution(queries.len());
        let mut seen = 0;

        for batch in queries.chunks(self.config.batch_size) {
            self.log_batch(seen, batch.len());
            seen += batch.len();

            let meta = collect_meta(batch);
            let started = Instant::now();
            let responses = resolve_with_fallback(
                self.service.as_ref(),
                batch,
                &self.config.data_source_ids,
                &mut self.stats,
            )
            .await;
            self.processor.process(&responses, &meta, &mut self.stats)?;

            let seconds = started.elapsed().as_secs_f64();
            self.stats.add_batch_time(seconds);
            self.stats.update_eta(batch.len() as f64 / seconds);

            if on_progress(&self.stats) == ResolveControl::Stop {
                info!("Cancellation requested, stopping after this batch");
                break;
            }
        }

        self.wrap_up(&mut on_progress)
    }

    /// Parallel variant: a bounded window of in-flight jobs, one batch per
    /// job. Writing and stats merging stay on this task, so row order holds
    /// within a batch but not across batches. Cancellation stops dispatch;
    /// jobs already in flight are drained and written.
    pub async fn resolve_parallel<F>(
        &mut self,
        queries: &[NameQuery],
        mut on_progress: F,
    ) -> Result<Stats>
    where
        F: FnMut(&Stats) -> ResolveControl,
    {
        if self.config.workers <= 1 {
            return self.resolve(queries, on_progress).await;
        }

        self.stats.begin_resolution(queries.len());
        let mut batches = queries.chunks(self.config.batch_size);
        let mut in_flight = FuturesUnordered::new();
        let mut seen = 0;
        let mut stopped = false;

        for _ in 0..self.config.workers {
            if let Some(batch) = batches.next() {
                self.log_batch(seen, batch.len());
                seen += batch.len();
                in_flight.push(self.spawn_job(batch));
            }
        }

        while let Some(joined) = in_flight.next().await {
            match joined {
                Ok(outcome) => {
                    self.processor
                        .process(&outcome.responses, &outcome.meta, &mut self.stats)?;
                    self.stats.merge(&outcome.stats);
                    self.stats
                        .update_eta(outcome.batch_len as f64 / outcome.seconds);
                }
                Err(err) => {
                    error!("Resolver job failed: {}", err);
                    self.stats.record_error(format!("resolver job failed: {}", err));
                }
            }

            if !stopped && on_progress(&self.stats) == ResolveControl::Stop {
                info!("Cancellation requested, draining jobs in flight");
                stopped = true;
            }
            if !stopped {
                if let Some(batch) = batches.next() {
                    self.log_batch(seen, batch.len());
                    seen += batch.len();
                    in_flight.push(self.spawn_job(batch));
                }
            }
        }

        self.wrap_up(&mut on_progress)
    }

    fn spawn_job(&self, batch: &[NameQuery]) -> tokio::task::JoinHandle<JobOutcome> {
        let job = ResolverJob::new(
            batch.to_vec(),
            self.config.data_source_ids.clone(),
            self.service.clone(),
        );
        tokio::spawn(job.run())
    }

    fn wrap_up<F>(&mut self, on_progress: &mut F) -> Result<Stats>
    where
        F: FnMut(&Stats) -> ResolveControl,
    {
        self.stats.finish();
        self.processor.close()?;
        on_progress(&self.stats);
        Ok(self.stats.clone())
    }

    fn log_batch(&self, seen: usize, batch_len: usize) {
        let end = (seen + batch_len).min(self.stats.total_records);
        info!(
            "Resolve {}-{} out of {} records at {}",
            seen + 1,
            end,
            self.stats.total_records,
            self.config.resolver_url
        );
    }
}

pub(crate) fn collect_meta(batch: &[NameQuery]) -> HashMap<String, RowMeta> {
    batch
        .iter()
        .map(|query| {
            (
                query.id.clone(),
                RowMeta {
                    original: query.original.clone(),
                    rank: query.rank.clone(),
                },
            )
        })
        .collect()
}

/// One batch against the service. A failed batch call retries name by name;
/// a per-item failure is logged and counted, never fatal.
pub(crate) async fn resolve_with_fallback(
    service: &dyn NameResolutionService,
    batch: &[NameQuery],
    data_source_ids: &[i32],
    stats: &mut Stats,
) -> Vec<ResolvedResponse> {
    let requests: Vec<NameRequest> = batch.iter().map(NameRequest::from_query).collect();
    match service.resolve(&requests, data_source_ids).await {
        Ok(responses) => responses,
        Err(batch_err) => {
            warn!("Batch call failed ({}), retrying name by name", batch_err);
            let mut responses = Vec::with_capacity(batch.len());
            for query in batch {
                let request = [NameRequest::from_query(query)];
                match service.resolve(&request, data_source_ids).await {
                    Ok(mut single) => responses.append(&mut single),
                    Err(err) => {
                        error!("Resolver broke on '{}': {}", query.name, err);
                        stats.record_error(format!("'{}': {}", query.name, err));
                    }
                }
            }
            responses
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::core::match_kind::MatchKind;
    use crate::core::models::CandidateMatch;
    use crate::core::stats::RunStatus;
    use crate::io::writer::testing::MemoryWriter;
    use crate::service::ServiceError;

    #[derive(Clone, Copy, PartialEq)]
    enum Mode {
        Ok,
        FailBatches,
    }

    /// Canned backend: names containing "nonsense" get no candidates,
    /// names containing "bad" fail even when sent alone, everything else
    /// gets one exact match. `FailBatches` rejects multi-name calls to
    /// exercise the per-item fallback.
    struct MockService {
        mode: Mode,
        calls: AtomicUsize,
    }

    impl MockService {
        fn new(mode: Mode) -> Arc<Self> {
            Arc::new(Self {
                mode,
                calls: AtomicUsize::new(0),
            })
        }
    }

    fn exact_candidate(name: &str) -> CandidateMatch {
        CandidateMatch {
            kind: MatchKind::ExactMatch,
            kind_score: Some(1.0),
            edit_distance: Some(0),
            matched_name: name.to_string(),
            canonical_name: Some(name.to_string()),
            synonym: Some(false),
            accepted_name: None,
            taxon_id: "42".to_string(),
            classification_path: Vec::new(),
            classification_ranks: Vec::new(),
            score: Some(0.9),
        }
    }

    #[async_trait]
    impl NameResolutionService for MockService {
        async fn resolve(
            &self,
            names: &[NameRequest],
            _data_source_ids: &[i32],
        ) -> std::result::Result<Vec<ResolvedResponse>, ServiceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.mode == Mode::FailBatches && names.len() > 1 {
                return Err(ServiceError::Status(500));
            }
            let mut responses = Vec::new();
            for name in names {
                if name.value.contains("bad") {
                    return Err(ServiceError::Status(500));
                }
                let candidates = if name.value.contains("nonsense") {
                    Vec::new()
                } else {
                    vec![exact_candidate(&name.value)]
                };
                responses.push(ResolvedResponse {
                    supplied_id: name.supplied_id.clone(),
                    supplied_input: name.value.clone(),
                    total: candidates.len(),
                    candidates,
                });
            }
            Ok(responses)
        }
    }

    fn query(id: &str, name: &str) -> NameQuery {
        NameQuery {
            id: id.to_string(),
            name: name.to_string(),
            rank: String::new(),
            original: vec![id.to_string(), name.to_string()],
        }
    }

    fn resolver_with(
        service: Arc<dyn NameResolutionService>,
        batch_size: usize,
        workers: usize,
    ) -> (
        Resolver,
        crate::io::writer::testing::Rows,
        std::sync::Arc<std::sync::Mutex<usize>>,
    ) {
        let (writer, rows, closes) = MemoryWriter::new();
        let config = ResolverConfig {
            batch_size,
            workers,
            data_source_ids: vec![1],
            ..Default::default()
        };
        let resolver = Resolver::new(service, Box::new(writer), config).unwrap();
        (resolver, rows, closes)
    }

    #[tokio::test]
    async fn test_match_and_empty_scenario() {
        let service = MockService::new(Mode::Ok);
        let (mut resolver, rows, closes) = resolver_with(service, 1000, 1);

        let queries = vec![query("1", "Puma concolor"), query("2", "Xyzzyxnonsense")];
        let stats = resolver.resolve_all(&queries).await.unwrap();

        assert_eq!(rows.lock().unwrap().len(), 2);
        assert_eq!(stats.resolved_records, 2);
        assert_eq!(stats.match_histogram[&MatchKind::ExactMatch], 1);
        assert_eq!(stats.match_histogram[&MatchKind::EmptyMatch], 1);
        assert_eq!(stats.status, RunStatus::Finished);
        assert!(stats.start_time.is_some() && stats.stop_time.is_some());
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_input_completes_immediately() {
        let service = MockService::new(Mode::Ok);
        let (mut resolver, rows, closes) = resolver_with(service, 1000, 1);

        let stats = resolver.resolve_all(&[]).await.unwrap();
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.resolved_records, 0);
        assert_eq!(stats.status, RunStatus::Finished);
        assert!(rows.lock().unwrap().is_empty());
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_failure_falls_back_to_per_item() {
        let service = MockService::new(Mode::FailBatches);
        let (mut resolver, rows, _) = resolver_with(service.clone(), 1000, 1);

        let queries = vec![query("1", "Puma concolor"), query("2", "Parus major")];
        let stats = resolver.resolve_all(&queries).await.unwrap();

        // batch call + one call per name
        assert_eq!(service.calls.load(Ordering::SeqCst), 3);
        assert_eq!(rows.lock().unwrap().len(), 2);
        assert_eq!(stats.resolved_records, 2);
        assert!(stats.errors.is_empty());
        assert_eq!(stats.match_histogram[&MatchKind::ExactMatch], 2);
    }

    #[tokio::test]
    async fn test_per_item_failure_degrades_and_continues() {
        let service = MockService::new(Mode::FailBatches);
        let (mut resolver, rows, _) = resolver_with(service, 1000, 1);

        let queries = vec![query("1", "bad name"), query("2", "Parus major")];
        let stats = resolver.resolve_all(&queries).await.unwrap();

        assert_eq!(rows.lock().unwrap().len(), 1);
        assert_eq!(stats.match_histogram[&MatchKind::ErrorInMatch], 1);
        assert_eq!(stats.match_histogram[&MatchKind::ExactMatch], 1);
        assert_eq!(stats.resolved_records, 2);
        assert_eq!(stats.errors.len(), 1);
        assert_eq!(stats.matched_total(), 2);
    }

    #[tokio::test]
    async fn test_cancellation_is_batch_granular() {
        let service = MockService::new(Mode::Ok);
        let (mut resolver, rows, closes) = resolver_with(service, 1, 1);

        let queries = vec![
            query("1", "Puma concolor"),
            query("2", "Parus major"),
            query("3", "Bubo bubo"),
        ];
        let mut progress_calls = 0;
        let stats = resolver
            .resolve(&queries, |snapshot| {
                if snapshot.status == RunStatus::Finished {
                    return ResolveControl::Continue;
                }
                progress_calls += 1;
                ResolveControl::Stop
            })
            .await
            .unwrap();

        // exactly the first batch was written, nothing after it
        assert_eq!(rows.lock().unwrap().len(), 1);
        assert_eq!(rows.lock().unwrap()[0][0].as_deref(), Some("1"));
        assert_eq!(progress_calls, 1);
        assert_eq!(stats.resolved_records, 1);
        assert_eq!(stats.status, RunStatus::Finished);
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_progress_sees_speed_and_eta() {
        let service = MockService::new(Mode::Ok);
        let (mut resolver, _, _) = resolver_with(service, 1, 1);

        let queries = vec![query("1", "Puma concolor"), query("2", "Parus major")];
        let mut snapshots = 0;
        resolver
            .resolve(&queries, |snapshot| {
                if snapshot.status == RunStatus::Resolution {
                    snapshots += 1;
                    assert!(snapshot.eta_seconds.map_or(true, |eta| eta >= 0.0));
                    assert!(!snapshot.last_batch_times.is_empty());
                }
                ResolveControl::Continue
            })
            .await
            .unwrap();
        assert_eq!(snapshots, 2);
    }

    #[tokio::test]
    async fn test_parallel_resolves_everything() {
        let service = MockService::new(Mode::Ok);
        let (mut resolver, rows, closes) = resolver_with(service, 1, 3);

        let queries: Vec<NameQuery> = (1..=5)
            .map(|i| query(&i.to_string(), &format!("Species number{}", i)))
            .collect();
        let stats = resolver
            .resolve_parallel(&queries, |_| ResolveControl::Continue)
            .await
            .unwrap();

        assert_eq!(rows.lock().unwrap().len(), 5);
        assert_eq!(stats.resolved_records, 5);
        assert_eq!(stats.match_histogram[&MatchKind::ExactMatch], 5);
        assert_eq!(stats.status, RunStatus::Finished);
        assert_eq!(*closes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_parallel_cancellation_drains_in_flight() {
        let service = MockService::new(Mode::Ok);
        let (mut resolver, rows, _) = resolver_with(service, 1, 2);

        let queries: Vec<NameQuery> = (1..=4)
            .map(|i| query(&i.to_string(), &format!("Species number{}", i)))
            .collect();
        let stats = resolver
            .resolve_parallel(&queries, |snapshot| {
                if snapshot.status == RunStatus::Finished {
                    ResolveControl::Continue
                } else {
                    ResolveControl::Stop
                }
            })
            .await
            .unwrap();

        // two jobs were dispatched before the stop; both complete and write
        assert_eq!(rows.lock().unwrap().len(), 2);
        assert_eq!(stats.resolved_records, 2);
        assert_eq!(stats.status, RunStatus::Finished);
    }

    #[tokio::test]
    async fn test_job_returns_local_outcome() {
        let service = MockService::new(Mode::Ok);
        let batch = vec![query("1", "Puma concolor"), query("2", "Xyzzyxnonsense")];
        let job = ResolverJob::new(batch, vec![1], service);
        let outcome = job.run().await;

        assert_eq!(outcome.responses.len(), 2);
        assert_eq!(outcome.batch_len, 2);
        assert_eq!(outcome.meta.len(), 2);
        // the job's stats carry only its own timing, no match counts
        assert_eq!(outcome.stats.resolved_records, 0);
        assert_eq!(outcome.stats.last_batch_times.len(), 1);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let service = MockService::new(Mode::Ok);
        let (writer, _, _) = MemoryWriter::new();
        let config = ResolverConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(Resolver::new(service, Box::new(writer), config).is_err());
    }
}
