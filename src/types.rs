use polars::prelude::*;

/// An expression table as read from disk
/// Every column is kept as text until a stage interprets it
pub type ExpressionTable = DataFrame;

/// Represents a transcription factor matrix
/// First column is the row key, remaining columns are gene names
pub type FactorMatrix = DataFrame;

/// Field delimiter of a tabular file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    Tab,
    Comma,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Tab => b'\t',
            Delimiter::Comma => b',',
        }
    }
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Delimiter::Tab => write!(f, "tab"),
            Delimiter::Comma => write!(f, "comma"),
        }
    }
}

/// TPM values of one condition, keyed by gene name
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionSet {
    /// Condition label, used for the `TPM_<label>` output column
    pub label: String,
    pub genes: Vec<Option<String>>,
    pub tpm: Vec<f64>,
}

impl ExpressionSet {
    pub fn new(label: impl Into<String>) -> Self {
        ExpressionSet {
            label: label.into(),
            genes: Vec::new(),
            tpm: Vec::new(),
        }
    }

    /// Builder-style row insertion, mostly for tests
    pub fn with(mut self, gene: &str, tpm: f64) -> Self {
        self.genes.push(Some(gene.to_string()));
        self.tpm.push(tpm);
        self
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}

/// One gene present in both conditions
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRecord {
    pub gene_name: String,
    pub tpm_a: f64,
    pub tpm_b: f64,
    pub abs_log_fold_change: f64,
}
