use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use super::{collect_meta, resolve_with_fallback};
use crate::core::models::{NameQuery, ResolvedResponse, RowMeta};
use crate::core::stats::Stats;
use crate::service::NameResolutionService;

/// Self-contained resolution of one batch. Owns everything it needs, never
/// touches the shared writer or aggregate stats; the orchestrator merges
/// the outcome.
pub struct ResolverJob {
    batch: Vec<NameQuery>,
    data_source_ids: Vec<i32>,
    service: Arc<dyn NameResolutionService>,
}

/// What a job hands back for merging. `stats` carries only this batch's
/// timing and per-item failures.
pub struct JobOutcome {
    pub responses: Vec<ResolvedResponse>,
    pub meta: HashMap<String, RowMeta>,
    pub stats: Stats,
    pub batch_len: usize,
    pub seconds: f64,
}

impl ResolverJob {
    pub fn new(
        batch: Vec<NameQuery>,
        data_source_ids: Vec<i32>,
        service: Arc<dyn NameResolutionService>,
    ) -> Self {
        Self {
            batch,
            data_source_ids,
            service,
        }
    }

    pub async fn run(self) -> JobOutcome {
        debug!("Resolver job started ({} names)", self.batch.len());
        let meta = collect_meta(&self.batch);
        let mut stats = Stats::new();
        let started = Instant::now();
        let responses = resolve_with_fallback(
            self.service.as_ref(),
            &self.batch,
            &self.data_source_ids,
            &mut stats,
        )
        .await;
        let seconds = started.elapsed().as_secs_f64();
        stats.add_batch_time(seconds);
        JobOutcome {
            responses,
            meta,
            stats,
            batch_len: self.batch.len(),
            seconds,
        }
    }
}
