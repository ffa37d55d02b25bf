use rnaseq_tf_rs::config::PipelineConfig;
use rnaseq_tf_rs::error::{PipelineError, Stage};
use rnaseq_tf_rs::pipeline::{self, PipelinePaths};
use rnaseq_tf_rs::symbols::{LookupOutcome, MappingSummary, StaticLookup};
use std::fs;
use std::path::Path;

fn paths(out: &Path, tf_file: &str) -> PipelinePaths {
    PipelinePaths {
        input_file: "tests/data/rnaseq_raw.tsv".into(),
        huvec_file: "tests/data/huvec.csv".into(),
        imr90_file: "tests/data/imr90.csv".into(),
        tf_file: tf_file.into(),
        cleaned_file: out.join("cleaned.tsv"),
        symbol_mapped_file: out.join("mapped.csv"),
        merged_tpm_file: out.join("merged.csv"),
        sorted_tpm_file: out.join("sorted.csv"),
        filtered_tf_file: out.join("tf_top.csv"),
    }
}

fn offline_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.lookup.post_batch_delay_ms = 0;
    config
}

fn lookup() -> StaticLookup {
    StaticLookup::new()
        .with("ENSG001", "TP53")
        .with_outcome("ENSG002", LookupOutcome::Failed("HTTP 503".into()))
}

#[test]
fn test_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path(), "tests/data/tf_matrix.csv");
    let lookup = lookup();

    let report = pipeline::run(&paths, &offline_config(), &lookup).unwrap();

    assert_eq!(report.cleaned_rows, 3);
    assert_eq!(
        report.mapping,
        MappingSummary {
            resolved: 1,
            invalid: 1,
            failed: 1,
            skipped: 0
        }
    );
    assert_eq!(report.ranked_genes, 4);
    assert_eq!(report.tf_rows, 3);
    assert_eq!(report.tf_genes, 4);
    assert_eq!(lookup.queries(), vec!["ENSG001", "ENSG002", "ENSG003"]);

    assert_eq!(
        fs::read_to_string(&paths.symbol_mapped_file).unwrap(),
        "gene_id,gene_name,TPM,gene_symbol\n\
         ENSG001,GeneA,1.5,TP53\n\
         ENSG002,GeneB,2,Unknown\n\
         ENSG003,GeneC,0,Unknown\n"
    );

    let tf = fs::read_to_string(&paths.filtered_tf_file).unwrap();
    let header = tf.lines().next().unwrap();
    assert_eq!(header, "TF,G3,G6,G1,G4");
    assert_eq!(tf.lines().count(), 4);
}

#[test]
fn test_top_n_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path(), "tests/data/tf_matrix.csv");
    let mut config = offline_config();
    config.subset.top_n = 1;

    let report = pipeline::run(&paths, &config, &lookup()).unwrap();
    assert_eq!(report.tf_genes, 1);

    let tf = fs::read_to_string(&paths.filtered_tf_file).unwrap();
    assert_eq!(tf.lines().next().unwrap(), "TF,G3");
}

#[test]
fn test_missing_tf_column_halts_in_subset_stage() {
    let dir = tempfile::tempdir().unwrap();
    let paths = paths(dir.path(), "tests/data/tf_matrix_no_g6.csv");

    let err = pipeline::run(&paths, &offline_config(), &lookup()).unwrap_err();
    match &err {
        PipelineError::StageFailed { stage, .. } => assert_eq!(*stage, Stage::SubsetTf),
        other => panic!("unexpected error: {other}"),
    }
    assert!(matches!(err.root(), PipelineError::MissingGene { gene } if gene == "G6"));

    // earlier stages still wrote their outputs
    assert!(paths.sorted_tpm_file.exists());
    assert!(!paths.filtered_tf_file.exists());
}

#[test]
fn test_schema_error_halts_in_clean_stage() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = paths(dir.path(), "tests/data/tf_matrix.csv");
    paths.input_file = "tests/data/rnaseq_no_gene_id.csv".into();
    let lookup = lookup();

    let err = pipeline::run(&paths, &offline_config(), &lookup).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::StageFailed {
            stage: Stage::Clean,
            ..
        }
    ));
    assert!(lookup.queries().is_empty());
    assert!(!paths.symbol_mapped_file.exists());
}
