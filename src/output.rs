//! Result formatting: plain text, JSON, CSV.
//!
//! Formatting targets any [`Write`]; [`emit`] picks a file or standard output
//! and wraps write failures in an [`OutputError`] that still carries the results.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::OutputFormat;
use crate::error::{OutputError, Result};
use crate::types::{FetchOutcome, FetchResult, ResultSet};

/// Write `results` to `writer` in `format`
pub fn write_results<W: Write>(
    results: &ResultSet,
    format: OutputFormat,
    writer: &mut W,
) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(results, writer),
        OutputFormat::Json => write_json(results, writer),
        OutputFormat::Csv => write_csv(results, writer),
    }
}

/// Write `results` to `path`, or to standard output when `path` is `None`
///
/// On success the results are handed back; on failure they travel inside
/// the returned [`OutputError`].
pub fn emit(results: ResultSet, format: OutputFormat, path: Option<&Path>) -> Result<ResultSet> {
    let written = match path {
        Some(path) => write_file(&results, format, path),
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            write_results(&results, format, &mut lock).and_then(|()| lock.flush())
        }
    };

    match written {
        Ok(()) => {
            let destination = path.map_or_else(|| "stdout".into(), |p| p.display().to_string());
            tracing::info!(
                format = %format,
                destination = %destination,
                entries = results.len(),
                "Results written"
            );
            Ok(results)
        }
        Err(source) => {
            tracing::error!(error = %source, "Failed to write results");
            Err(OutputError {
                path: path.map(Path::to_path_buf),
                source,
                results: Box::new(results),
            }
            .into())
        }
    }
}

fn write_file(results: &ResultSet, format: OutputFormat, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_results(results, format, &mut writer)?;
    writer.flush()
}

fn write_plain<W: Write>(results: &ResultSet, writer: &mut W) -> io::Result<()> {
    for (i, result) in results.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        match &result.outcome {
            FetchOutcome::Success(payload) => {
                writeln!(
                    writer,
                    "{}\tsuccess\t{} ({} bytes)",
                    result.url,
                    payload.status_code,
                    payload.body.len()
                )?;
                writer.write_all(payload.body.as_bytes())?;
                if !payload.body.ends_with('\n') {
                    writeln!(writer)?;
                }
            }
            FetchOutcome::Failure(failure) => {
                writeln!(
                    writer,
                    "{}\tfailure\t{}: {}",
                    result.url, failure.kind, failure.detail
                )?;
            }
        }
    }
    Ok(())
}

fn write_json<W: Write>(results: &ResultSet, writer: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, results.as_slice())?;
    writeln!(writer)
}

fn write_csv<W: Write>(results: &ResultSet, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "URL,Status,Result")?;
    for result in results {
        let (status, text) = csv_columns(result);
        writeln!(
            writer,
            "{},{},{}",
            csv_field(&result.url),
            status,
            csv_field(&text)
        )?;
    }
    Ok(())
}

fn csv_columns(result: &FetchResult) -> (&'static str, Cow<'_, str>) {
    match &result.outcome {
        FetchOutcome::Success(payload) => ("success", Cow::Borrowed(payload.body.as_str())),
        FetchOutcome::Failure(failure) => (
            "failure",
            Cow::Owned(format!("{}: {}", failure.kind, failure.detail)),
        ),
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break (RFC 4180)
fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}
