use crate::error::{PipelineError, Result};
use crate::ranker::{EXPRESSION_ATTEMPTS, GENE_NAME};
use crate::table::{read_table, require_columns, write_table};
use crate::types::{Delimiter, FactorMatrix};
use polars::prelude::*;
use std::path::Path;

/// Number of top-ranked genes kept from the factor matrix
pub const DEFAULT_TOP_N: usize = 75;

/// Takes the first `n` gene names of a ranked table.
///
/// Returns fewer names when the table is shorter than `n`. A name repeated
/// within the first `n` rows is kept once, at its first position.
///
/// # Errors
/// * `PipelineError::MissingColumn` if `Gene name` is absent
/// * `PipelineError::MissingGene` if one of the first `n` rows has no gene name
pub fn top_genes(sorted: &DataFrame, n: usize) -> Result<Vec<String>> {
    require_columns(sorted, &[GENE_NAME], "sorted table")?;
    let names = sorted.column(GENE_NAME)?.cast(&DataType::String)?;

    let mut genes: Vec<String> = Vec::with_capacity(n.min(sorted.height()));
    for gene in names.str()?.into_iter().take(n) {
        let gene = gene.ok_or_else(|| PipelineError::missing_gene("<empty>"))?;
        if !genes.iter().any(|g| g.as_str() == gene) {
            genes.push(gene.to_string());
        }
    }
    Ok(genes)
}

/// Keeps the row key column and exactly `genes`, in that order.
///
/// # Arguments
/// * `matrix` - Factor matrix whose first column is the row key
/// * `genes` - Gene columns to keep
///
/// # Errors
/// * `PipelineError::MissingGene` for the first gene that is not a data column of the matrix
pub fn select_genes(matrix: &FactorMatrix, genes: &[String]) -> Result<FactorMatrix> {
    let columns = matrix.get_column_names();
    let (key, data_columns) = columns
        .split_first()
        .ok_or_else(|| PipelineError::missing_column("row key", "factor matrix"))?;

    if let Some(gene) = genes
        .iter()
        .find(|gene| !data_columns.iter().any(|c| c.as_str() == gene.as_str()))
    {
        return Err(PipelineError::missing_gene(gene.as_str()));
    }

    let selection: Vec<PlSmallStr> = std::iter::once((*key).clone())
        .chain(genes.iter().map(|gene| PlSmallStr::from(gene.as_str())))
        .collect();

    Ok(matrix.select(selection)?)
}

/// Writes the factor matrix restricted to the `n` top-ranked genes.
///
/// # Arguments
/// * `tf_path` - Comma-delimited factor matrix, first column is the row key
/// * `sorted_path` - Ranked TPM table with a `Gene name` column
/// * `output` - Where the filtered matrix is written, comma-delimited
/// * `n` - Number of top genes to keep
///
/// # Returns
/// * `Result<FactorMatrix>` - The filtered matrix
///
/// # Errors
/// * `PipelineError::MissingGene` if a top gene is not a matrix column
pub fn filter_tf_data<P, Q, R>(tf_path: P, sorted_path: Q, output: R, n: usize) -> Result<FactorMatrix>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
    R: AsRef<Path>,
{
    let matrix = read_table(tf_path, &[Delimiter::Comma], &[])?;
    let sorted = read_table(sorted_path, &EXPRESSION_ATTEMPTS, &[GENE_NAME])?;

    let genes = top_genes(&sorted, n)?;
    let mut filtered = select_genes(&matrix, &genes)?;
    write_table(&mut filtered, output, Delimiter::Comma)?;

    Ok(filtered)
}
