use serde::{Deserialize, Serialize};

use super::match_kind::MatchKind;

/// One input record produced by the reader. Immutable after ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameQuery {
    pub id: String,
    pub name: String,
    pub rank: String,
    pub original: Vec<String>,
}

/// The `(suppliedId, name)` pair sent to the index service.
#[derive(Debug, Clone, Serialize)]
pub struct NameRequest {
    #[serde(rename = "suppliedId")]
    pub supplied_id: String,
    pub value: String,
}

impl NameRequest {
    pub fn from_query(query: &NameQuery) -> Self {
        Self {
            supplied_id: query.id.clone(),
            value: query.name.clone(),
        }
    }
}

/// One candidate match for a supplied name.
///
/// `kind_score` is the service's numeric ranking of the match type (lower is
/// better) and drives best-candidate selection; `score` is the overall match
/// score and goes to output only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateMatch {
    pub kind: MatchKind,
    pub kind_score: Option<f64>,
    pub edit_distance: Option<i64>,
    pub matched_name: String,
    pub canonical_name: Option<String>,
    pub synonym: Option<bool>,
    pub accepted_name: Option<String>,
    pub taxon_id: String,
    pub classification_path: Vec<String>,
    pub classification_ranks: Vec<String>,
    pub score: Option<f64>,
}

/// Everything the service returned for one supplied id. An empty candidate
/// list means no match was found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedResponse {
    pub supplied_id: String,
    pub supplied_input: String,
    pub total: usize,
    pub candidates: Vec<CandidateMatch>,
}

/// Per-id context the resolver captures at batch time for the processor:
/// the original row to echo and the rank the caller supplied, which the
/// service response does not carry.
#[derive(Debug, Clone)]
pub struct RowMeta {
    pub original: Vec<String>,
    pub rank: String,
}
