use polars::prelude::PolarsError;
use std::fmt;
use std::io;
use thiserror::Error;

/// The pipeline stage an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    MapSymbols,
    MergeRank,
    SubsetTf,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Clean => "clean",
            Stage::MapSymbols => "map-symbols",
            Stage::MergeRank => "merge-rank",
            Stage::SubsetTf => "subset-tf",
        };
        write!(f, "{s}")
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not parse {path}: {}", .attempts.join("; "))]
    Parse { path: String, attempts: Vec<String> },

    #[error("Missing column '{column}' in {table}")]
    MissingColumn { column: String, table: String },

    #[error("Invalid value in column '{column}' at row {row}: '{value}'")]
    InvalidValue {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Gene '{gene}' is not a column of the factor matrix")]
    MissingGene { gene: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<PipelineError>,
    },
}

/// Type alias for Result with PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create a new MissingColumn error
    pub fn missing_column(column: impl Into<String>, table: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            column: column.into(),
            table: table.into(),
        }
    }

    /// Create a new InvalidValue error
    pub fn invalid_value(column: impl Into<String>, row: usize, value: impl ToString) -> Self {
        PipelineError::InvalidValue {
            column: column.into(),
            row,
            value: value.to_string(),
        }
    }

    /// Create a new MissingGene error
    pub fn missing_gene(gene: impl Into<String>) -> Self {
        PipelineError::MissingGene { gene: gene.into() }
    }

    /// Tag an error with the stage it was raised in
    pub fn in_stage(self, stage: Stage) -> Self {
        PipelineError::StageFailed {
            stage,
            source: Box::new(self),
        }
    }

    /// The innermost error, looking through stage wrappers
    pub fn root(&self) -> &PipelineError {
        match self {
            PipelineError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }
}
