use std::collections::HashMap;

use tracing::warn;

use crate::core::error::Result;
use crate::core::match_kind::MatchKind;
use crate::core::models::{CandidateMatch, ResolvedResponse, RowMeta};
use crate::core::stats::Stats;
use crate::io::writer::RowWriter;
use crate::parser::{default_parser, GnaParser, ResettingParser};

/// Turns service responses into output rows and folds outcomes into Stats.
///
/// One row per candidate, or exactly one "no match" row for an empty
/// response. Writer failures are fatal; everything else degrades to null
/// cells and a warning.
pub struct ResultProcessor {
    writer: Box<dyn RowWriter>,
    parser: ResettingParser<GnaParser, fn() -> GnaParser>,
    with_classification: bool,
}

impl ResultProcessor {
    pub fn new(writer: Box<dyn RowWriter>, with_classification: bool) -> Self {
        Self {
            writer,
            parser: default_parser(),
            with_classification,
        }
    }

    pub fn process(
        &mut self,
        responses: &[ResolvedResponse],
        meta: &HashMap<String, RowMeta>,
        stats: &mut Stats,
    ) -> Result<()> {
        for response in responses {
            let Some(row_meta) = meta.get(&response.supplied_id) else {
                warn!(
                    "No input row for supplied id '{}', skipping",
                    response.supplied_id
                );
                continue;
            };
            if response.candidates.is_empty() {
                self.write_empty_result(response, row_meta, stats)?;
            } else {
                self.write_result(response, row_meta, stats)?;
            }
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.writer.close()
    }

    fn write_empty_result(
        &mut self,
        response: &ResolvedResponse,
        meta: &RowMeta,
        stats: &mut Stats,
    ) -> Result<()> {
        stats.record_match(MatchKind::EmptyMatch);
        let input_canonical = self.parser.canonical(&response.supplied_input);

        let mut row = original_cells(meta);
        row.extend([
            Some(MatchKind::EmptyMatch.label().to_string()),
            Some("0".to_string()),
            Some(response.supplied_input.clone()),
            None,
            input_canonical,
            None,
            None,
            non_empty(&meta.rank),
            None,
            None,
            None,
            None,
            None,
        ]);
        if self.with_classification {
            row.push(None);
        }
        self.writer.write(&row)
    }

    fn write_result(
        &mut self,
        response: &ResolvedResponse,
        meta: &RowMeta,
        stats: &mut Stats,
    ) -> Result<()> {
        stats.record_match(best_kind(&response.candidates));
        let input_canonical = self.parser.canonical(&response.supplied_input);

        for candidate in &response.candidates {
            let mut row = original_cells(meta);
            row.extend(self.candidate_cells(response, meta, candidate, &input_canonical));
            self.writer.write(&row)?;
        }
        Ok(())
    }

    fn candidate_cells(
        &self,
        response: &ResolvedResponse,
        meta: &RowMeta,
        candidate: &CandidateMatch,
        input_canonical: &Option<String>,
    ) -> Vec<Option<String>> {
        let current_name = candidate
            .accepted_name
            .clone()
            .or_else(|| non_empty(&candidate.matched_name));
        let mut cells = vec![
            Some(candidate.kind.label().to_string()),
            Some(response.total.to_string()),
            Some(response.supplied_input.clone()),
            non_empty(&candidate.matched_name),
            input_canonical.clone(),
            candidate.canonical_name.clone(),
            candidate.edit_distance.map(|d| d.to_string()),
            non_empty(&meta.rank),
            matched_rank(candidate),
            candidate.synonym.map(|s| s.to_string()),
            current_name,
            candidate.score.map(|s| format!("{:.3}", s)),
            non_empty(&candidate.taxon_id),
        ];
        if self.with_classification {
            cells.push(render_classification(candidate));
        }
        cells
    }
}

/// The histogram bucket for a response goes to the candidate with the
/// lowest match-type score; ties keep the first one seen. No usable score
/// at all classifies as an empty match.
fn best_kind(candidates: &[CandidateMatch]) -> MatchKind {
    let mut best: Option<(f64, MatchKind)> = None;
    for candidate in candidates {
        if let Some(score) = candidate.kind_score {
            if best.map_or(true, |(current, _)| score < current) {
                best = Some((score, candidate.kind));
            }
        }
    }
    best.map(|(_, kind)| kind).unwrap_or(MatchKind::EmptyMatch)
}

/// Matched rank is the last segment of the classification rank path.
fn matched_rank(candidate: &CandidateMatch) -> Option<String> {
    candidate
        .classification_ranks
        .last()
        .and_then(|r| non_empty(r))
}

/// Renders `Name(Rank)` pairs when path and ranks line up, the raw path
/// otherwise, nothing when the path is blank.
fn render_classification(candidate: &CandidateMatch) -> Option<String> {
    let path = &candidate.classification_path;
    let ranks = &candidate.classification_ranks;
    if path.is_empty() {
        return None;
    }
    if path.len() == ranks.len() {
        let rendered: Vec<String> = path
            .iter()
            .zip(ranks)
            .map(|(name, rank)| format!("{}({})", name, rank))
            .collect();
        Some(rendered.join(", "))
    } else {
        Some(path.join(", "))
    }
}

fn original_cells(meta: &RowMeta) -> Vec<Option<String>> {
    meta.original.iter().map(|v| Some(v.clone())).collect()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
