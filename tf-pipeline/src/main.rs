use clap::Parser;
use rnaseq_tf_rs::config::PipelineConfig;
use rnaseq_tf_rs::error::PipelineError;
use rnaseq_tf_rs::pipeline::{self, PipelinePaths};
use rnaseq_tf_rs::symbols::EnsemblClient;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Could not set up logging: {0}")]
    Logging(String),
}

#[derive(Parser)]
#[command(
    name = "tf-pipeline",
    about = "Cleans an RNA-seq table, maps gene symbols, ranks genes by fold-change and filters a TF matrix",
    long_about = "A four stage pipeline: strips Ensembl version suffixes from an RNA-seq table, \
                  annotates each gene id with its symbol from the Ensembl REST API, merges HUVEC and \
                  IMR90 TPM tables and ranks expressed genes by absolute log fold-change, and keeps \
                  the columns of the top ranked genes from a transcription factor matrix.",
    version,
    after_help = "Example usage:\n    \
                  tf-pipeline --input-file rnaseq.tsv --huvec-file huvec.csv --imr90-file imr90.csv \\\n        \
                  --tf-file tf.csv --cleaned-file out/cleaned.tsv --symbol-mapped-file out/mapped.csv \\\n        \
                  --merged-tpm-file out/merged.csv --sorted-tpm-file out/sorted.csv \\\n        \
                  --filtered-tf-file out/tf_top75.csv",
    color = clap::ColorChoice::Always
)]
#[derive(Debug)]
struct Args {
    /// Path to the input RNA-seq file (tab or comma delimited)
    /// Must contain a 'gene_id' column
    #[arg(long, value_name = "FILE")]
    input_file: PathBuf,

    /// Path to the HUVEC dataset, with 'Gene name' and 'TPM' columns
    #[arg(long, value_name = "FILE")]
    huvec_file: PathBuf,

    /// Path to the IMR90 dataset, with 'Gene name' and 'TPM' columns
    #[arg(long = "imr90-file", value_name = "FILE")]
    imr90_file: PathBuf,

    /// Path to the TF dataset, first column is the TF name
    #[arg(long, value_name = "FILE")]
    tf_file: PathBuf,

    /// Path to save the cleaned RNA-seq file
    #[arg(long, value_name = "FILE")]
    cleaned_file: PathBuf,

    /// Path to save the symbol-mapped file
    #[arg(long, value_name = "FILE")]
    symbol_mapped_file: PathBuf,

    /// Path to save the merged TPM file
    #[arg(long, value_name = "FILE")]
    merged_tpm_file: PathBuf,

    /// Path to save the sorted TPM file
    #[arg(long, value_name = "FILE")]
    sorted_tpm_file: PathBuf,

    /// Path to save the filtered TF data
    #[arg(long, value_name = "FILE")]
    filtered_tf_file: PathBuf,

    /// Optional TOML file overriding lookup, ranking and subset settings
    #[arg(long, value_name = "TOML")]
    config: Option<PathBuf>,
}

impl Args {
    fn paths(&self) -> PipelinePaths {
        PipelinePaths {
            input_file: self.input_file.clone(),
            huvec_file: self.huvec_file.clone(),
            imr90_file: self.imr90_file.clone(),
            tf_file: self.tf_file.clone(),
            cleaned_file: self.cleaned_file.clone(),
            symbol_mapped_file: self.symbol_mapped_file.clone(),
            merged_tpm_file: self.merged_tpm_file.clone(),
            sorted_tpm_file: self.sorted_tpm_file.clone(),
            filtered_tf_file: self.filtered_tf_file.clone(),
        }
    }
}

fn init_logging() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("tf_pipeline=info,rnaseq_tf_rs=info")),
        )
        .try_init()
        .map_err(|e| CliError::Logging(e.to_string()))
}

fn main() -> Result<(), CliError> {
    let start_time = std::time::Instant::now();

    let args = Args::parse();
    init_logging()?;

    let config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    info!("Symbol lookups against {}", config.lookup.base_url);

    let client = EnsemblClient::new(&config.lookup)?;
    let report = pipeline::run(&args.paths(), &config, &client)?;

    info!(
        "{} rows cleaned, {} symbols resolved, {} genes ranked, {} x {} TF matrix written",
        report.cleaned_rows,
        report.mapping.resolved,
        report.ranked_genes,
        report.tf_rows,
        report.tf_genes
    );

    let elapsed = start_time.elapsed();
    info!(
        "Total execution time: {:.4} minutes",
        elapsed.as_secs_f64() / 60.0
    );

    Ok(())
}
