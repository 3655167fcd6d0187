use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;

use super::match_kind::MatchKind;

const SMOOTHING: f64 = 0.05;
const BATCH_TIME_WINDOW: usize = 2;
const THREAD_PENALTY: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Init,
    Ingestion,
    Resolution,
    Finished,
}

/// Progress and outcome accounting for one resolution run. Owned by the
/// resolver; callers see read-only snapshots between batches.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub status: RunStatus,
    pub total_records: usize,
    pub ingested_records: usize,
    pub resolved_records: usize,
    pub match_histogram: BTreeMap<MatchKind, u64>,
    pub last_batch_times: VecDeque<f64>,
    pub speed: Option<f64>,
    pub eta_seconds: Option<f64>,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub fn new() -> Self {
        // Every kind is pre-seeded so histogram iteration is total.
        let match_histogram = MatchKind::iter().map(|k| (k, 0)).collect();
        Self {
            status: RunStatus::Init,
            total_records: 0,
            ingested_records: 0,
            resolved_records: 0,
            match_histogram,
            last_batch_times: VecDeque::with_capacity(BATCH_TIME_WINDOW + 1),
            speed: None,
            eta_seconds: None,
            start_time: None,
            stop_time: None,
            errors: Vec::new(),
        }
    }

    pub fn begin_resolution(&mut self, total_records: usize) {
        self.total_records = total_records;
        self.status = RunStatus::Resolution;
        self.start_time = Some(Utc::now());
    }

    pub fn finish(&mut self) {
        self.status = RunStatus::Finished;
        self.stop_time = Some(Utc::now());
    }

    /// Counts one resolved response under the given kind.
    pub fn record_match(&mut self, kind: MatchKind) {
        *self.match_histogram.entry(kind).or_insert(0) += 1;
        self.resolved_records += 1;
    }

    /// Counts one failed record. The record stays in the totals so a run
    /// always accounts for every input it attempted.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.record_match(MatchKind::ErrorInMatch);
        self.errors.push(message.into());
    }

    /// Keeps the wall-clock durations of the two most recent batches.
    pub fn add_batch_time(&mut self, seconds: f64) {
        if self.last_batch_times.len() >= BATCH_TIME_WINDOW {
            self.last_batch_times.pop_front();
        }
        self.last_batch_times.push_back(seconds);
    }

    /// Exponential-moving-average throughput update, seeded by the first
    /// observation. A zero or non-finite speed leaves the estimate absent
    /// rather than dividing by it.
    pub fn update_eta(&mut self, current_speed: f64) {
        if !current_speed.is_finite() || current_speed <= 0.0 {
            self.eta_seconds = None;
            return;
        }
        let smoothed = match self.speed {
            Some(speed) => speed * (1.0 - SMOOTHING) + current_speed * SMOOTHING,
            None => current_speed,
        };
        self.speed = Some(smoothed);
        if smoothed > 0.0 {
            let remaining = self.total_records.saturating_sub(self.resolved_records);
            self.eta_seconds = Some(remaining as f64 / smoothed);
        } else {
            self.eta_seconds = None;
        }
    }

    /// Diminishing-returns weight for adding workers: sum of 0.7^(k-1) for
    /// k in 1..=threads. A heuristic for sizing the pool, not a guarantee.
    pub fn penalty(&self, threads: usize) -> f64 {
        (0..threads).map(|k| THREAD_PENALTY.powi(k as i32)).sum()
    }

    /// Folds a job-local Stats into this aggregate.
    pub fn merge(&mut self, other: &Stats) {
        self.resolved_records += other.resolved_records;
        for (kind, count) in &other.match_histogram {
            *self.match_histogram.entry(*kind).or_insert(0) += count;
        }
        self.errors.extend(other.errors.iter().cloned());
        for seconds in &other.last_batch_times {
            self.add_batch_time(*seconds);
        }
    }

    pub fn matched_total(&self) -> u64 {
        self.match_histogram.values().sum()
    }
}
