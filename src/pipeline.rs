//! Runs the four stages in order: clean, map symbols, merge and rank, subset the TF matrix.

use crate::cleaner::load_and_clean;
use crate::config::PipelineConfig;
use crate::error::{Result, Stage};
use crate::ranker::merge_and_filter;
use crate::subset::filter_tf_data;
use crate::symbols::{map_gene_symbols, MappingSummary, SymbolLookup, Throttle};
use crate::table::write_table;
use crate::types::Delimiter;
use std::path::PathBuf;
use tracing::{info, warn};

/// Inputs and outputs of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelinePaths {
    pub input_file: PathBuf,
    pub huvec_file: PathBuf,
    pub imr90_file: PathBuf,
    pub tf_file: PathBuf,
    pub cleaned_file: PathBuf,
    pub symbol_mapped_file: PathBuf,
    pub merged_tpm_file: PathBuf,
    pub sorted_tpm_file: PathBuf,
    pub filtered_tf_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub cleaned_rows: usize,
    pub mapping: MappingSummary,
    pub ranked_genes: usize,
    pub tf_rows: usize,
    /// Gene columns in the filtered TF matrix, row key excluded
    pub tf_genes: usize,
}

/// Runs every stage, stopping at the first failure.
///
/// Lookup failures in the symbol stage are recorded as `"Unknown"` and never
/// stop the run. Any other error is returned tagged with its stage.
pub fn run(
    paths: &PipelinePaths,
    config: &PipelineConfig,
    lookup: &dyn SymbolLookup,
) -> Result<PipelineReport> {
    let cleaned = load_and_clean(&paths.input_file, &paths.cleaned_file)
        .map_err(|e| e.in_stage(Stage::Clean))?;
    info!(
        "Cleaned file saved to {} ({} rows)",
        paths.cleaned_file.display(),
        cleaned.height()
    );

    let throttle = Throttle::from(&config.lookup);
    let mapping = map_gene_symbols(&cleaned, lookup, &throttle)
        .map_err(|e| e.in_stage(Stage::MapSymbols))?;
    let summary = mapping.summary;
    let mut mapped = mapping.table;
    write_table(&mut mapped, &paths.symbol_mapped_file, Delimiter::Comma)
        .map_err(|e| e.in_stage(Stage::MapSymbols))?;
    if summary.unresolved() > 0 {
        warn!(
            "{} of {} gene ids unresolved ({} invalid, {} failed requests, {} empty)",
            summary.unresolved(),
            mapped.height(),
            summary.invalid,
            summary.failed,
            summary.skipped
        );
    }
    info!(
        "Gene symbols mapped and saved to {}",
        paths.symbol_mapped_file.display()
    );

    let ranking = merge_and_filter(
        &paths.huvec_file,
        &paths.imr90_file,
        &paths.merged_tpm_file,
        &paths.sorted_tpm_file,
        &config.ranking,
    )
    .map_err(|e| e.in_stage(Stage::MergeRank))?;
    info!(
        "Filtered TPM dataset saved to {} ({} genes)",
        paths.merged_tpm_file.display(),
        ranking.filtered.len()
    );
    info!(
        "Sorted TPM dataset saved to {}",
        paths.sorted_tpm_file.display()
    );

    let top_n = config.subset.top_n;
    let filtered_tf = filter_tf_data(
        &paths.tf_file,
        &paths.sorted_tpm_file,
        &paths.filtered_tf_file,
        top_n,
    )
    .map_err(|e| e.in_stage(Stage::SubsetTf))?;
    let tf_genes = filtered_tf.width().saturating_sub(1);
    if tf_genes < top_n.min(ranking.sorted.len()) {
        warn!(
            "Top {} genes contain repeated names, {} distinct columns kept",
            top_n, tf_genes
        );
    }
    info!(
        "Filtered TF data saved to {}",
        paths.filtered_tf_file.display()
    );

    Ok(PipelineReport {
        cleaned_rows: cleaned.height(),
        mapping: summary,
        ranked_genes: ranking.sorted.len(),
        tf_rows: filtered_tf.height(),
        tf_genes,
    })
}
