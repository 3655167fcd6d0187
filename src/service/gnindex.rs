use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{NameResolutionService, ServiceError};
use crate::core::match_kind::MatchKind;
use crate::core::models::{CandidateMatch, NameRequest, ResolvedResponse};

const NAME_RESOLVER_QUERY: &str = r#"
query($names: [name!]!, $dataSourceIds: [Int!]) {
  nameResolver(names: $names, dataSourceIds: $dataSourceIds) {
    responses {
      suppliedId suppliedInput total
      results {
        name { value }
        canonicalName { value }
        acceptedName { name { value } }
        synonym
        matchType { kind score editDistance }
        taxonId
        classification { path pathRanks }
        score { value }
      }
    }
  }
}
"#;

/// GraphQL client for the Global Names index. Constructed once and shared
/// behind an `Arc`; holds no per-request state.
pub struct GnIndexClient {
    http: Client,
    url: String,
}

impl GnIndexClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let url = url.into();
        debug!("GN index client initialized (url={})", url);
        Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to create HTTP client"),
            url,
        }
    }
}

#[async_trait]
impl NameResolutionService for GnIndexClient {
    async fn resolve(
        &self,
        names: &[NameRequest],
        data_source_ids: &[i32],
    ) -> Result<Vec<ResolvedResponse>, ServiceError> {
        let body = json!({
            "query": NAME_RESOLVER_QUERY,
            "variables": {
                "names": names,
                "dataSourceIds": data_source_ids,
            },
        });

        let response = self.http.post(&self.url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }

        let envelope = response.json::<WireEnvelope>().await?;
        if let Some(errors) = envelope.errors {
            if !errors.is_empty() {
                return Err(ServiceError::GraphQl(
                    errors
                        .into_iter()
                        .map(|e| e.message)
                        .collect::<Vec<_>>()
                        .join("; "),
                ));
            }
        }

        let resolver = envelope
            .data
            .and_then(|d| d.name_resolver)
            .ok_or_else(|| ServiceError::Malformed("missing nameResolver payload".into()))?;

        Ok(resolver
            .responses
            .into_iter()
            .map(WireResponse::into_model)
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    data: Option<WireData>,
    errors: Option<Vec<WireGraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct WireGraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct WireData {
    #[serde(rename = "nameResolver")]
    name_resolver: Option<WireNameResolver>,
}

#[derive(Debug, Deserialize)]
struct WireNameResolver {
    #[serde(default)]
    responses: Vec<WireResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    supplied_id: String,
    #[serde(default)]
    supplied_input: String,
    total: Option<usize>,
    #[serde(default)]
    results: Vec<WireResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResult {
    name: Option<WireValue>,
    canonical_name: Option<WireValue>,
    accepted_name: Option<WireAcceptedName>,
    synonym: Option<bool>,
    match_type: Option<WireMatchType>,
    taxon_id: Option<String>,
    classification: Option<WireClassification>,
    score: Option<WireScore>,
}

#[derive(Debug, Deserialize)]
struct WireValue {
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireAcceptedName {
    name: Option<WireValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMatchType {
    kind: Option<String>,
    score: Option<f64>,
    edit_distance: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireClassification {
    path: Option<String>,
    path_ranks: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireScore {
    value: Option<f64>,
}

impl WireResponse {
    /// Flattens the wire shape into the uniform match record: every
    /// candidate shares the response's supplied id/input/total, and the
    /// pipe-delimited classification strings become ordered lists.
    fn into_model(self) -> ResolvedResponse {
        let candidates: Vec<CandidateMatch> =
            self.results.into_iter().map(WireResult::into_model).collect();
        let total = self.total.unwrap_or(candidates.len());
        ResolvedResponse {
            supplied_id: self.supplied_id,
            supplied_input: self.supplied_input,
            total,
            candidates,
        }
    }
}

impl WireResult {
    fn into_model(self) -> CandidateMatch {
        let match_type = self.match_type;
        let (kind, kind_score, edit_distance) = match match_type {
            Some(mt) => (
                mt.kind
                    .as_deref()
                    .map(MatchKind::from_wire)
                    .unwrap_or(MatchKind::ErrorInMatch),
                mt.score,
                mt.edit_distance,
            ),
            None => (MatchKind::ErrorInMatch, None, None),
        };
        let (path, ranks) = match self.classification {
            Some(c) => (split_pipes(c.path), split_pipes(c.path_ranks)),
            None => (Vec::new(), Vec::new()),
        };
        CandidateMatch {
            kind,
            kind_score,
            edit_distance,
            matched_name: self.name.and_then(|v| v.value).unwrap_or_default(),
            canonical_name: self.canonical_name.and_then(|v| v.value),
            synonym: self.synonym,
            accepted_name: self.accepted_name.and_then(|a| a.name).and_then(|v| v.value),
            taxon_id: self.taxon_id.unwrap_or_default(),
            classification_path: path,
            classification_ranks: ranks,
            score: self.score.and_then(|s| s.value),
        }
    }
}

fn split_pipes(value: Option<String>) -> Vec<String> {
    match value {
        Some(s) if !s.is_empty() => s.split('|').map(str::to_string).collect(),
        _ => Vec::new(),
    }
}
