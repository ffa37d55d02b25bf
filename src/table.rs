use crate::error::{PipelineError, Result};
use crate::types::Delimiter;
use polars::prelude::*;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// Parses a delimited file once, with every column read as text.
fn parse_with(path: &Path, delimiter: Delimiter) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| opts.with_separator(delimiter.as_byte()))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()
}

/// Returns the first of `columns` that `df` does not have, if any.
fn first_missing<'a>(df: &DataFrame, columns: &[&'a str]) -> Option<&'a str> {
    columns
        .iter()
        .copied()
        .find(|name| df.get_column_index(name).is_none())
}

/// Reads a delimited text file with a header row, trying each delimiter in order.
///
/// An attempt is accepted when the file parses with that delimiter and the
/// resulting table holds every column in `required`. All columns are read as
/// strings so that values a stage does not interpret are written back unchanged.
///
/// # Arguments
/// * `path` - File to read
/// * `attempts` - Delimiters to try, in order
/// * `required` - Columns the table must contain
///
/// # Errors
/// * `PipelineError::Io` if the file does not exist
/// * `PipelineError::Parse` if no delimiter produced a table
/// * `PipelineError::MissingColumn` if a table was parsed but lacked a required column
pub fn read_table<P: AsRef<Path>>(
    path: P,
    attempts: &[Delimiter],
    required: &[&str],
) -> Result<DataFrame> {
    let path = path.as_ref();
    let shown = path.display().to_string();

    // polars reports a missing file as a generic compute error
    if !path.exists() {
        return Err(PipelineError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{shown} does not exist"),
        )));
    }

    let mut failures = Vec::with_capacity(attempts.len());
    let mut missing: Option<&str> = None;

    for &delimiter in attempts {
        match parse_with(path, delimiter) {
            Ok(df) => match first_missing(&df, required) {
                None => {
                    debug!(
                        "Read {} with {} delimiter ({} rows, {} columns)",
                        shown,
                        delimiter,
                        df.height(),
                        df.width()
                    );
                    return Ok(df);
                }
                Some(column) => {
                    debug!(
                        "Parsed {} with {} delimiter but column '{}' is absent",
                        shown, delimiter, column
                    );
                    missing.get_or_insert(column);
                }
            },
            Err(e) => {
                debug!("Failed to parse {} with {} delimiter: {}", shown, delimiter, e);
                failures.push(format!("{delimiter}: {e}"));
            }
        }
    }

    match missing {
        Some(column) => Err(PipelineError::missing_column(column, shown)),
        None => Err(PipelineError::Parse {
            path: shown,
            attempts: failures,
        }),
    }
}

/// Checks that `df` holds every column in `columns`.
pub fn require_columns(df: &DataFrame, columns: &[&str], table: &str) -> Result<()> {
    match first_missing(df, columns) {
        Some(column) => Err(PipelineError::missing_column(column, table)),
        None => Ok(()),
    }
}

fn quote_field(field: &str, delimiter: Delimiter) -> String {
    let separator = delimiter.as_byte() as char;
    if field.contains(|c: char| c == separator || matches!(c, '"' | '\n' | '\r')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Header line of `df`, quoting only names that need it.
///
/// An empty name stays an empty field, as written by tools that leave the
/// index column unnamed.
fn header_line(df: &DataFrame, delimiter: Delimiter) -> String {
    let separator = (delimiter.as_byte() as char).to_string();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| quote_field(name.as_str(), delimiter))
        .collect();
    format!("{}\n", names.join(&separator))
}

/// Writes a table with a header row, creating the parent directory if needed.
pub fn write_table<P: AsRef<Path>>(df: &mut DataFrame, path: P, delimiter: Delimiter) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = File::create(path)?;
    file.write_all(header_line(df, delimiter).as_bytes())?;
    CsvWriter::new(&mut file)
        .include_header(false)
        .with_separator(delimiter.as_byte())
        .finish(df)?;

    Ok(())
}
