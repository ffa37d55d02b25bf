use crate::cleaner::GENE_ID;
use crate::config::LookupConfig;
use crate::error::{PipelineError, Result};
use crate::table::require_columns;
use crate::types::ExpressionTable;
use polars::prelude::*;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Column added by the symbol mapping stage
pub const GENE_SYMBOL: &str = "gene_symbol";

/// Symbol recorded for every identifier that could not be resolved
pub const UNKNOWN: &str = "Unknown";

/// Result of looking up one gene identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved(String),
    /// The service rejected the identifier
    InvalidId,
    /// Transport or server failure
    Failed(String),
}

/// Resolves a gene identifier to its display name.
pub trait SymbolLookup {
    fn lookup(&self, gene_id: &str) -> LookupOutcome;
}

impl<F> SymbolLookup for F
where
    F: Fn(&str) -> LookupOutcome,
{
    fn lookup(&self, gene_id: &str) -> LookupOutcome {
        self(gene_id)
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    display_name: Option<String>,
}

/// Blocking client for the Ensembl `lookup/id` endpoint
pub struct EnsemblClient {
    client: Client,
    base_url: Url,
}

impl EnsemblClient {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| PipelineError::Config(format!("lookup.base_url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(PipelineError::Config(format!(
                "lookup.base_url '{}' cannot take a path",
                config.base_url
            )));
        }

        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { client, base_url })
    }

    /// `{base_url}/lookup/id/{gene_id}`, with the identifier percent-encoded as one path segment
    pub fn url(&self, gene_id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["lookup", "id", gene_id]);
        }
        url
    }
}

impl SymbolLookup for EnsemblClient {
    fn lookup(&self, gene_id: &str) -> LookupOutcome {
        let response = match self
            .client
            .get(self.url(gene_id))
            .header(CONTENT_TYPE, "application/json")
            .send()
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Request error for Ensembl ID {}: {}", gene_id, e);
                return LookupOutcome::Failed(e.to_string());
            }
        };

        match response.status() {
            StatusCode::OK => match response.json::<LookupResponse>() {
                Ok(LookupResponse {
                    display_name: Some(name),
                }) => {
                    debug!("{} -> {}", gene_id, name);
                    LookupOutcome::Resolved(name)
                }
                Ok(_) => {
                    warn!("No display name for Ensembl ID {}", gene_id);
                    LookupOutcome::Failed("response has no display_name".into())
                }
                Err(e) => {
                    warn!("Malformed response for Ensembl ID {}: {}", gene_id, e);
                    LookupOutcome::Failed(e.to_string())
                }
            },
            StatusCode::BAD_REQUEST => {
                warn!("Invalid Ensembl ID: {}", gene_id);
                LookupOutcome::InvalidId
            }
            status => {
                warn!(
                    "Failed request for Ensembl ID: {}, status code: {}",
                    gene_id,
                    status.as_u16()
                );
                LookupOutcome::Failed(format!("HTTP {}", status.as_u16()))
            }
        }
    }
}

/// Lookup backed by a fixed table; unlisted identifiers are invalid.
#[derive(Debug, Default)]
pub struct StaticLookup {
    entries: HashMap<String, LookupOutcome>,
    queries: RefCell<Vec<String>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, gene_id: &str, symbol: &str) -> Self {
        self.entries
            .insert(gene_id.to_string(), LookupOutcome::Resolved(symbol.to_string()));
        self
    }

    pub fn with_outcome(mut self, gene_id: &str, outcome: LookupOutcome) -> Self {
        self.entries.insert(gene_id.to_string(), outcome);
        self
    }

    /// Identifiers queried so far, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries.borrow().clone()
    }
}

impl SymbolLookup for StaticLookup {
    fn lookup(&self, gene_id: &str) -> LookupOutcome {
        self.queries.borrow_mut().push(gene_id.to_string());
        self.entries
            .get(gene_id)
            .cloned()
            .unwrap_or(LookupOutcome::InvalidId)
    }
}

/// Pauses applied around the lookups of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Throttle {
    pub request_interval: Option<Duration>,
    pub post_batch_delay: Option<Duration>,
}

fn non_zero_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

impl From<&LookupConfig> for Throttle {
    fn from(config: &LookupConfig) -> Self {
        Throttle {
            request_interval: non_zero_ms(config.request_interval_ms),
            post_batch_delay: non_zero_ms(config.post_batch_delay_ms),
        }
    }
}

/// Counts of lookup outcomes for one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingSummary {
    pub resolved: usize,
    pub invalid: usize,
    pub failed: usize,
    /// Rows with an empty `gene_id`, which are never looked up
    pub skipped: usize,
}

impl MappingSummary {
    pub fn unresolved(&self) -> usize {
        self.invalid + self.failed + self.skipped
    }
}

#[derive(Debug, Clone)]
pub struct SymbolMapping {
    pub table: ExpressionTable,
    pub summary: MappingSummary,
}

/// Annotates every row with the display name of its `gene_id`.
///
/// Each identifier is looked up exactly once, in row order. Any identifier that
/// does not resolve to a non-empty name is recorded as `"Unknown"`.
///
/// # Arguments
/// * `df` - Cleaned expression table with a `gene_id` column
/// * `lookup` - Identifier resolver
/// * `throttle` - Pauses between lookups and after the batch
///
/// # Returns
/// * `Result<SymbolMapping>` - The input table plus a `gene_symbol` column, and outcome counts
///
/// # Errors
/// * Returns `PipelineError::MissingColumn` if `gene_id` is absent
pub fn map_gene_symbols(
    df: &ExpressionTable,
    lookup: &dyn SymbolLookup,
    throttle: &Throttle,
) -> Result<SymbolMapping> {
    require_columns(df, &[GENE_ID], "expression table")?;
    let ids = df.column(GENE_ID)?.str()?;

    let mut summary = MappingSummary::default();
    let mut symbols: Vec<String> = Vec::with_capacity(ids.len());

    for (idx, id) in ids.into_iter().enumerate() {
        if idx > 0 {
            if let Some(interval) = throttle.request_interval {
                thread::sleep(interval);
            }
        }

        let symbol = match id {
            None => {
                summary.skipped += 1;
                UNKNOWN.to_string()
            }
            Some(id) => match lookup.lookup(id) {
                LookupOutcome::Resolved(name) if !name.is_empty() => {
                    summary.resolved += 1;
                    name
                }
                LookupOutcome::InvalidId => {
                    summary.invalid += 1;
                    UNKNOWN.to_string()
                }
                LookupOutcome::Resolved(_) | LookupOutcome::Failed(_) => {
                    summary.failed += 1;
                    UNKNOWN.to_string()
                }
            },
        };
        symbols.push(symbol);
    }

    // single pause per batch, not per request
    if let Some(delay) = throttle.post_batch_delay {
        thread::sleep(delay);
    }

    let mut table = df.clone();
    table.with_column(Column::new(GENE_SYMBOL.into(), symbols))?;

    Ok(SymbolMapping { table, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn symbols(mapping: &SymbolMapping) -> Vec<String> {
        mapping
            .table
            .column(GENE_SYMBOL)
            .unwrap()
            .str()
            .unwrap()
            .into_iter()
            .map(|s| s.unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_unresolved_ids_become_unknown() {
        let df = df!("gene_id" => [Some("ENSG1"), Some("ENSG2"), Some("ENSG3"), None, Some("ENSG5")]).unwrap();
        let lookup = StaticLookup::new()
            .with("ENSG1", "TP53")
            .with_outcome("ENSG3", LookupOutcome::Failed("HTTP 503".into()))
            .with("ENSG5", "");

        let mapping = map_gene_symbols(&df, &lookup, &Throttle::default()).unwrap();

        assert_eq!(symbols(&mapping), vec!["TP53", "Unknown", "Unknown", "Unknown", "Unknown"]);
        assert_eq!(
            mapping.summary,
            MappingSummary {
                resolved: 1,
                invalid: 1,
                failed: 2,
                skipped: 1
            }
        );
        assert_eq!(mapping.summary.unresolved(), 4);
    }

    #[test]
    fn test_empty_display_name_counts_as_failed() {
        let df = df!("gene_id" => ["ENSG1"]).unwrap();
        let lookup = StaticLookup::new().with("ENSG1", "");

        let mapping = map_gene_symbols(&df, &lookup, &Throttle::default()).unwrap();
        assert_eq!(symbols(&mapping), vec!["Unknown"]);
        assert_eq!(mapping.summary.failed, 1);
        assert_eq!(mapping.summary.invalid, 0);
    }

    #[test]
    fn test_each_row_looked_up_once_in_order() {
        let df = df!("gene_id" => ["B", "A", "B"], "TPM" => ["1", "2", "3"]).unwrap();
        let lookup = StaticLookup::new().with("A", "GENEA").with("B", "GENEB");

        let mapping = map_gene_symbols(&df, &lookup, &Throttle::default()).unwrap();

        assert_eq!(lookup.queries(), vec!["B", "A", "B"]);
        assert_eq!(mapping.table.height(), 3);
        assert_eq!(mapping.table.width(), 3);
        assert_eq!(symbols(&mapping), vec!["GENEB", "GENEA", "GENEB"]);
    }

    #[test]
    fn test_closure_lookup() {
        let df = df!("gene_id" => ["ENSG1"]).unwrap();
        let lookup = |id: &str| LookupOutcome::Resolved(format!("sym-{id}"));

        let mapping = map_gene_symbols(&df, &lookup, &Throttle::default()).unwrap();
        assert_eq!(symbols(&mapping), vec!["sym-ENSG1"]);
    }

    #[test]
    fn test_post_batch_delay_applied_once() {
        let df = df!("gene_id" => ["A", "B", "C"]).unwrap();
        let throttle = Throttle {
            request_interval: None,
            post_batch_delay: Some(Duration::from_millis(20)),
        };

        let start = Instant::now();
        map_gene_symbols(&df, &StaticLookup::new(), &throttle).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_throttle_from_config() {
        let config = LookupConfig::default();
        let throttle = Throttle::from(&config);
        assert_eq!(throttle.request_interval, None);
        assert_eq!(throttle.post_batch_delay, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_missing_gene_id() {
        let df = df!("Gene name" => ["A"]).unwrap();
        assert!(map_gene_symbols(&df, &StaticLookup::new(), &Throttle::default()).is_err());
    }

    #[test]
    fn test_ensembl_url() {
        let config = LookupConfig {
            base_url: "https://rest.ensembl.org/".into(),
            ..LookupConfig::default()
        };
        let client = EnsemblClient::new(&config).unwrap();
        assert_eq!(
            client.url("ENSG00000141510").as_str(),
            "https://rest.ensembl.org/lookup/id/ENSG00000141510"
        );
    }

    #[test]
    fn test_ensembl_url_encodes_identifier() {
        let config = LookupConfig {
            base_url: "http://rest.ensembl.org".into(),
            ..LookupConfig::default()
        };
        let client = EnsemblClient::new(&config).unwrap();
        assert_eq!(
            client.url("ENSG1/x?y#z").as_str(),
            "http://rest.ensembl.org/lookup/id/ENSG1%2Fx%3Fy%23z"
        );

        let nested = EnsemblClient::new(&LookupConfig {
            base_url: "http://localhost:8080/ensembl/".into(),
            ..LookupConfig::default()
        })
        .unwrap();
        assert_eq!(
            nested.url("ENSG1").as_str(),
            "http://localhost:8080/ensembl/lookup/id/ENSG1"
        );
    }

    #[test]
    fn test_ensembl_rejects_invalid_base_url() {
        let config = LookupConfig {
            base_url: "not a url".into(),
            ..LookupConfig::default()
        };
        assert!(matches!(
            EnsemblClient::new(&config),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_ensembl_unreachable_host_is_failure() {
        let config = LookupConfig {
            base_url: "http://127.0.0.1:9".into(),
            timeout_secs: 2,
            ..LookupConfig::default()
        };
        let client = EnsemblClient::new(&config).unwrap();
        assert!(matches!(client.lookup("ENSG1"), LookupOutcome::Failed(_)));
    }
}
