use crate::error::Result;
use crate::table::{read_table, require_columns, write_table};
use crate::types::{Delimiter, ExpressionTable};
use polars::prelude::*;
use std::path::Path;

/// Column holding Ensembl gene identifiers in the raw RNA-seq table
pub const GENE_ID: &str = "gene_id";

/// Delimiters tried, in order, when reading the raw table
pub const RAW_ATTEMPTS: [Delimiter; 2] = [Delimiter::Tab, Delimiter::Comma];

/// Drops the version suffix of an Ensembl identifier.
///
/// Everything from the first `.` on is removed; identifiers without a `.`
/// are returned unchanged.
///
/// # Example
/// ```
/// use rnaseq_tf_rs::cleaner::strip_version;
///
/// assert_eq!(strip_version("ENSG00000141510.17"), "ENSG00000141510");
/// assert_eq!(strip_version("ENSG00000141510"), "ENSG00000141510");
/// ```
pub fn strip_version(id: &str) -> &str {
    id.split_once('.').map_or(id, |(head, _)| head)
}

/// Replaces every `gene_id` with its unversioned form.
///
/// All other columns and the row order are left as they are. Null identifiers stay null.
///
/// # Errors
/// * Returns `PipelineError::MissingColumn` if `gene_id` is absent
pub fn clean_gene_ids(df: &ExpressionTable) -> Result<ExpressionTable> {
    require_columns(df, &[GENE_ID], "expression table")?;

    let ids = df.column(GENE_ID)?.str()?;
    let cleaned: Vec<Option<&str>> = ids.into_iter().map(|id| id.map(strip_version)).collect();

    let mut out = df.clone();
    out.with_column(Column::new(GENE_ID.into(), cleaned))?;
    Ok(out)
}

/// Reads the raw RNA-seq table, strips identifier versions and writes it tab-delimited.
///
/// # Arguments
/// * `input` - Tab- or comma-delimited file with a `gene_id` column
/// * `output` - Where the cleaned, tab-delimited table is written
///
/// # Returns
/// * `Result<ExpressionTable>` - The cleaned table, for the symbol mapping stage
///
/// # Errors
/// * `PipelineError::Parse` if neither delimiter parses the file
/// * `PipelineError::MissingColumn` if no parse yields a `gene_id` column
pub fn load_and_clean<P: AsRef<Path>, Q: AsRef<Path>>(
    input: P,
    output: Q,
) -> Result<ExpressionTable> {
    let raw = read_table(input, &RAW_ATTEMPTS, &[GENE_ID])?;
    let mut cleaned = clean_gene_ids(&raw)?;
    write_table(&mut cleaned, output, Delimiter::Tab)?;
    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_version() {
        assert_eq!(strip_version("ENSG001.3"), "ENSG001");
        assert_eq!(strip_version("ENSG002"), "ENSG002");
        assert_eq!(strip_version("ENSG003.1.2"), "ENSG003");
        assert_eq!(strip_version(".5"), "");
        assert_eq!(strip_version(""), "");
    }

    #[test]
    fn test_clean_gene_ids_keeps_other_columns() {
        let df = df!(
            "gene_id" => [Some("ENSG001.3"), Some("ENSG002"), None],
            "gene_name" => ["GeneA", "GeneB", "GeneC"],
        )
        .unwrap();

        let cleaned = clean_gene_ids(&df).unwrap();
        let ids: Vec<Option<&str>> = cleaned.column("gene_id").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some("ENSG001"), Some("ENSG002"), None]);
        let names: Vec<Option<&str>> = cleaned.column("gene_name").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(names, vec![Some("GeneA"), Some("GeneB"), Some("GeneC")]);
        assert_eq!(cleaned.get_column_names(), df.get_column_names());
    }

    #[test]
    fn test_versions_can_collide() {
        let df = df!("gene_id" => ["ENSG001.1", "ENSG001.2"]).unwrap();
        let cleaned = clean_gene_ids(&df).unwrap();
        assert_eq!(cleaned.height(), 2);
        let ids: Vec<Option<&str>> = cleaned.column("gene_id").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(ids, vec![Some("ENSG001"), Some("ENSG001")]);
    }

    #[test]
    fn test_missing_gene_id_column() {
        let df = df!("id" => ["ENSG001.3"]).unwrap();
        assert!(clean_gene_ids(&df).is_err());
    }
}
