use std::io::Read;

use tracing::{info, warn};
use uuid::Uuid;

use crate::core::error::{GnResolverError, Result};
use crate::core::models::NameQuery;
use crate::core::stats::{RunStatus, Stats};

/// Namespace for ids derived from name strings when the id cell is blank.
const GN_NAMESPACE: Uuid = match Uuid::try_parse("90187a02-90c3-5d7f-ac61-13b9f6b02c93") {
    Ok(uuid) => uuid,
    Err(_) => panic!("invalid namespace uuid"),
};

const ID_FIELD: &str = "taxonid";
const NAME_FIELD: &str = "scientificname";
const RANK_FIELDS: [&str; 2] = ["taxonrank", "rank"];

#[derive(Debug)]
pub struct ReadOutput {
    pub queries: Vec<NameQuery>,
    pub original_fields: Vec<String>,
}

/// Parses delimited input into the ordered sequence of name queries.
///
/// Column names resolve case-insensitively; Darwin Core style URI headers
/// are trimmed to their last path segment. When `alt_headers` is non-empty
/// the input is treated as headerless and `alt_headers` takes the header's
/// place.
pub struct NameReader<R: Read> {
    input: R,
    name: String,
    skip_original: bool,
    alt_headers: Vec<String>,
}

impl<R: Read> NameReader<R> {
    pub fn new(
        input: R,
        name: impl Into<String>,
        skip_original: bool,
        alt_headers: Vec<String>,
    ) -> Self {
        Self {
            input,
            name: name.into(),
            skip_original,
            alt_headers,
        }
    }

    pub fn read(mut self, stats: &mut Stats) -> Result<ReadOutput> {
        info!("Reading input from {}", self.name);
        stats.status = RunStatus::Ingestion;

        let mut content = String::new();
        self.input.read_to_string(&mut content)?;
        let delimiter = sniff_delimiter(&content);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .has_headers(false)
            .from_reader(content.as_bytes());

        let mut records = csv_reader.records();
        let headers: Vec<String> = if self.alt_headers.is_empty() {
            match records.next() {
                Some(record) => record?.iter().map(str::to_string).collect(),
                None => Vec::new(),
            }
        } else {
            self.alt_headers.clone()
        };

        let fields: Vec<String> = headers.iter().map(|h| prepare_field(h)).collect();
        let columns = Columns::detect(&fields)?;

        let original_fields = if self.skip_original {
            vec![headers[columns.id].clone()]
        } else {
            headers.clone()
        };

        let mut queries = Vec::new();
        for record in records {
            let record = record?;
            let name = cell(&record, Some(columns.name));
            if name.is_empty() {
                warn!("Skipping row without a scientific name");
                continue;
            }
            let id = match cell(&record, Some(columns.id)) {
                id if id.is_empty() => Uuid::new_v5(&GN_NAMESPACE, name.as_bytes()).to_string(),
                id => id,
            };
            let rank = cell(&record, columns.rank);
            let original = if self.skip_original {
                vec![id.clone()]
            } else {
                record.iter().map(str::to_string).collect()
            };
            queries.push(NameQuery {
                id,
                name,
                rank,
                original,
            });
            stats.ingested_records += 1;
        }

        info!("Ingested {} records from {}", queries.len(), self.name);
        Ok(ReadOutput {
            queries,
            original_fields,
        })
    }
}

struct Columns {
    id: usize,
    name: usize,
    rank: Option<usize>,
}

impl Columns {
    fn detect(fields: &[String]) -> Result<Self> {
        let id = fields.iter().position(|f| f.as_str() == ID_FIELD).ok_or_else(|| {
            GnResolverError::configuration(
                "taxonID must be present in the header (or supplied via header override)",
            )
        })?;
        let name = fields
            .iter()
            .position(|f| f.as_str() == NAME_FIELD)
            .ok_or_else(|| {
                GnResolverError::configuration(
                    "scientificName must be present in the header (or supplied via header override)",
                )
            })?;
        let rank = fields
            .iter()
            .position(|f| RANK_FIELDS.contains(&f.as_str()));
        Ok(Self { id, name, rank })
    }
}

fn cell(record: &csv::StringRecord, index: Option<usize>) -> String {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .unwrap_or("")
        .to_string()
}

/// Normalizes a header cell: namespace separators become path separators,
/// only the last path segment counts, case-insensitive.
fn prepare_field(field: &str) -> String {
    let field = field.replace(':', "/");
    field
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.contains('\t') {
        b'\t'
    } else {
        b','
    }
}
