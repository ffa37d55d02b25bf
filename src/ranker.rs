use crate::config::RankingConfig;
use crate::error::{PipelineError, Result};
use crate::table::{read_table, require_columns, write_table};
use crate::types::{Delimiter, ExpressionSet, MergedRecord};
use polars::prelude::*;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

pub const GENE_NAME: &str = "Gene name";
pub const TPM: &str = "TPM";
pub const ABS_LOG_FOLD_CHANGE: &str = "Abs_log_fold_change";

/// Delimiters tried, in order, when reading a TPM table
pub const EXPRESSION_ATTEMPTS: [Delimiter; 2] = [Delimiter::Comma, Delimiter::Tab];

/// Filtered rows in join order, and the same rows ranked
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub filtered: Vec<MergedRecord>,
    pub sorted: Vec<MergedRecord>,
}

/// `|ln(a / b)|`; non-finite when either value is zero, infinite or NaN.
pub fn abs_log_fold_change(a: f64, b: f64) -> f64 {
    (a / b).ln().abs()
}

/// Present in both conditions and at least 1 TPM in one of them.
pub fn is_expressed(a: f64, b: f64) -> bool {
    a > 0.0 && b > 0.0 && (a >= 1.0 || b >= 1.0)
}

impl MergedRecord {
    pub fn new(gene_name: impl Into<String>, tpm_a: f64, tpm_b: f64) -> Self {
        MergedRecord {
            gene_name: gene_name.into(),
            tpm_a,
            tpm_b,
            abs_log_fold_change: abs_log_fold_change(tpm_a, tpm_b),
        }
    }
}

fn parse_tpm(row: usize, value: Option<&str>) -> Result<f64> {
    match value.map(str::trim) {
        None | Some("") => Ok(f64::NAN),
        Some(text) => text
            .parse::<f64>()
            .map_err(|_| PipelineError::invalid_value(TPM, row, text)),
    }
}

/// Extracts the `Gene name` and `TPM` columns of a table.
///
/// Empty TPM cells become NaN.
///
/// # Errors
/// * `PipelineError::MissingColumn` if `Gene name` or `TPM` is absent
/// * `PipelineError::InvalidValue` if a TPM cell is not a number
pub fn expression_set(df: &DataFrame, label: &str) -> Result<ExpressionSet> {
    require_columns(df, &[GENE_NAME, TPM], label)?;

    let names = df.column(GENE_NAME)?.cast(&DataType::String)?;
    let values = df.column(TPM)?.cast(&DataType::String)?;

    let genes: Vec<Option<String>> = names
        .str()?
        .into_iter()
        .map(|gene| gene.map(str::to_string))
        .collect();
    let tpm = values
        .str()?
        .into_iter()
        .enumerate()
        .map(|(row, value)| parse_tpm(row, value))
        .collect::<Result<Vec<f64>>>()?;

    Ok(ExpressionSet {
        label: label.to_string(),
        genes,
        tpm,
    })
}

/// Reads a TPM table (comma-delimited, tab as fallback) into an expression set.
pub fn load_expression_set<P: AsRef<Path>>(path: P, label: &str) -> Result<ExpressionSet> {
    let df = read_table(path, &EXPRESSION_ATTEMPTS, &[GENE_NAME, TPM])?;
    expression_set(&df, label)
}

/// Inner join of two expression sets on gene name.
///
/// Rows come out in the order of `a`; a gene repeated in `b` yields one row per
/// match, in the order of `b`. Rows without a gene name never match.
pub fn merge_sets(a: &ExpressionSet, b: &ExpressionSet) -> Vec<MergedRecord> {
    let mut index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, gene) in b.genes.iter().enumerate() {
        if let Some(gene) = gene {
            index.entry(gene.as_str()).or_default().push(idx);
        }
    }

    let mut merged = Vec::new();
    for (gene, &tpm_a) in a.genes.iter().zip(&a.tpm) {
        let Some(gene) = gene else { continue };
        if let Some(matches) = index.get(gene.as_str()) {
            for &idx in matches {
                merged.push(MergedRecord::new(gene.as_str(), tpm_a, b.tpm[idx]));
            }
        }
    }
    merged
}

// descending, NaN last
fn by_fold_change_desc(x: &MergedRecord, y: &MergedRecord) -> Ordering {
    let (x, y) = (x.abs_log_fold_change, y.abs_log_fold_change);
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => y.total_cmp(&x),
    }
}

/// Stable sort by absolute log fold-change, largest first.
pub fn rank(records: &[MergedRecord]) -> Vec<MergedRecord> {
    let mut sorted = records.to_vec();
    sorted.sort_by(by_fold_change_desc);
    sorted
}

/// Joins two conditions, keeps expressed genes and ranks them.
///
/// # Arguments
/// * `a` - First condition, e.g. HUVEC
/// * `b` - Second condition, e.g. IMR90
///
/// # Returns
/// * `Ranking` - The filtered rows in join order and the same rows sorted
///   by descending `|ln(a / b)|`, ties kept in join order
pub fn merge_and_rank(a: &ExpressionSet, b: &ExpressionSet) -> Ranking {
    let filtered: Vec<MergedRecord> = merge_sets(a, b)
        .into_iter()
        .filter(|record| is_expressed(record.tpm_a, record.tpm_b))
        .collect();
    let sorted = rank(&filtered);
    Ranking { filtered, sorted }
}

/// Builds the output table with columns `Gene name`, `TPM_<a>`, `TPM_<b>`, `Abs_log_fold_change`.
pub fn to_frame(records: &[MergedRecord], label_a: &str, label_b: &str) -> Result<DataFrame> {
    let genes: Vec<&str> = records.iter().map(|r| r.gene_name.as_str()).collect();
    let tpm_a: Vec<f64> = records.iter().map(|r| r.tpm_a).collect();
    let tpm_b: Vec<f64> = records.iter().map(|r| r.tpm_b).collect();
    let fold_change: Vec<f64> = records.iter().map(|r| r.abs_log_fold_change).collect();

    let df = DataFrame::new(vec![
        Column::new(GENE_NAME.into(), genes),
        Column::new(format!("TPM_{label_a}").into(), tpm_a),
        Column::new(format!("TPM_{label_b}").into(), tpm_b),
        Column::new(ABS_LOG_FOLD_CHANGE.into(), fold_change),
    ])?;

    Ok(df)
}

/// Merges the two TPM files and writes the filtered and the sorted tables.
///
/// # Arguments
/// * `path_a` - TPM table of the first condition
/// * `path_b` - TPM table of the second condition
/// * `merged_output` - Filtered rows in join order
/// * `sorted_output` - Filtered rows by descending fold-change
/// * `labels` - Condition labels for the TPM columns
///
/// # Errors
/// * `PipelineError::MissingColumn` if either table lacks `Gene name` or `TPM`
pub fn merge_and_filter<P, Q, R, S>(
    path_a: P,
    path_b: Q,
    merged_output: R,
    sorted_output: S,
    labels: &RankingConfig,
) -> Result<Ranking>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
    S: AsRef<Path>,
{
    let a = load_expression_set(path_a, &labels.label_a)?;
    let b = load_expression_set(path_b, &labels.label_b)?;
    let ranking = merge_and_rank(&a, &b);

    let mut filtered = to_frame(&ranking.filtered, &a.label, &b.label)?;
    write_table(&mut filtered, merged_output, Delimiter::Comma)?;

    let mut sorted = to_frame(&ranking.sorted, &a.label, &b.label)?;
    write_table(&mut sorted, sorted_output, Delimiter::Comma)?;

    Ok(ranking)
}
