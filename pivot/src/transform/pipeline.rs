//! High-level pipeline: long-format export in, wide spreadsheet out.
//!
//! ```text
//! read ──► question order ──► pivot ──► layout ──► reformat ──► sort ──► write
//!  │                                      │                               │
//!  CsvError                          PivotError                     ExportError
//! ```
//!
//! Every fault before the write aborts the run, so a misaligned or partial
//! table never reaches disk. All state lives in one call.
//!
//! # Example
//!
//! ```rust,ignore
//! use survey_pivot::profile::builtin;
//! use survey_pivot::transform::pipeline::{default_output_path, run};
//! use std::path::Path;
//!
//! let input = Path::new("survey_oct.csv");
//! let profile = builtin("retailer-survey").unwrap();
//! let summary = run(input, &default_output_path(input), &profile)?;
//! println!("{} visits", summary.stats.records);
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};

use super::columns::{layout, question_order};
use super::grouper::flat_to_wide;
use super::rows::{reformat_column, sort_rows, UnparsedPolicy};
use crate::error::{PipelineResult, ProfileError};
use crate::export::{write_table, ExportFormat};
use crate::logs::{log_info, log_success, log_warning};
use crate::models::{FlatRecord, WideTable};
use crate::parser::read_flat_records;
use crate::profile::PivotProfile;

/// Counters collected along one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PivotStats {
    /// Long-format rows read.
    pub input_rows: usize,
    /// Wide rows written.
    pub records: usize,
    /// Question columns.
    pub questions: usize,
    pub skipped_without_question: usize,
    pub carried_conflicts: usize,
    /// Timestamps blanked because they could not be reformatted.
    pub blanked_timestamps: usize,
    /// Rows whose sort value was null or unparseable.
    pub unknown_sort_values: usize,
    pub dropped_rows: usize,
}

/// The wide table plus counters.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: WideTable,
    pub stats: PivotStats,
}

/// What a full run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output: PathBuf,
    pub format: ExportFormat,
    pub encoding: String,
    pub delimiter: char,
    pub stats: PivotStats,
}

/// `<input stem>_pivot.xlsx` next to the input.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("survey");
    input.with_file_name(format!("{}_pivot.xlsx", stem))
}

/// Read `input`, pivot it with `profile`, and write the table to `output`.
pub fn run(input: &Path, output: &Path, profile: &PivotProfile) -> PipelineResult<RunSummary> {
    profile.validate()?;

    log_info(format!("📖 Reading {}...", input.display()));
    let parsed = read_flat_records(input, &profile.column_selection(), &profile.read_options())?;
    log_success(format!("Detected encoding: {}", parsed.encoding));
    log_success(format!("Separator: '{}'", format_delimiter(parsed.delimiter)));
    log_success(format!(
        "Read {} rows in {} batch(es)",
        parsed.records.len(),
        parsed.batches
    ));

    let result = pivot_flat_records(&parsed.records, profile)?;

    log_info(format!("💾 Writing {}...", output.display()));
    let format = write_table(&result.table, output)?;
    log_success(format!(
        "Saved {} rows x {} columns to '{}'",
        result.table.rows.len(),
        result.table.columns.len(),
        output.display()
    ));

    Ok(RunSummary {
        output: output.to_path_buf(),
        format,
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        stats: result.stats,
    })
}

/// Pivot already-read records into the ordered wide table.
pub fn pivot_flat_records(
    records: &[FlatRecord],
    profile: &PivotProfile,
) -> PipelineResult<PipelineOutput> {
    if records.is_empty() {
        log_warning("Export has no data rows; writing the header only");
    }
    let mut stats = PivotStats {
        input_rows: records.len(),
        ..PivotStats::default()
    };

    let order = question_order(records);
    log_info(format!("🔄 Pivoting {} rows by {} identity column(s)...", records.len(), profile.identity_columns.len()));
    let pivoted = flat_to_wide(records, &profile.pivot_options());

    stats.skipped_without_question = pivoted.skipped_without_question;
    stats.carried_conflicts = pivoted.carried_conflicts;
    if pivoted.skipped_without_question > 0 {
        log_warning(format!(
            "{} row(s) without a question were skipped",
            pivoted.skipped_without_question
        ));
    }
    if pivoted.carried_conflicts > 0 {
        log_warning(format!(
            "{} row(s) disagree with the first carried values of their visit; first occurrence kept",
            pivoted.carried_conflicts
        ));
    }

    let mut table = layout(&pivoted, &order, &profile.identity_columns, &profile.carry_columns)?;
    stats.questions = order.len();
    log_success(format!(
        "{} visits, {} question columns",
        table.rows.len(),
        order.len()
    ));

    if let Some(ts) = &profile.timestamp {
        let column = table.column_index(&ts.column).ok_or_else(|| ProfileError::Invalid {
            name: profile.name.clone(),
            message: format!("timestamp column '{}' is not in the table", ts.column),
        })?;

        if let Some(output_format) = &ts.output_format {
            stats.blanked_timestamps =
                reformat_column(&mut table, column, &ts.input_formats, output_format);
            if stats.blanked_timestamps > 0 {
                log_warning(format!(
                    "{} '{}' value(s) could not be parsed and were left blank",
                    stats.blanked_timestamps, ts.column
                ));
            }
        }

        let sorted = sort_rows(&mut table, column, ts.sort, &ts.sort_formats(), ts.unparsed);
        stats.unknown_sort_values = sorted.unknown;
        stats.dropped_rows = sorted.dropped;
        match ts.unparsed {
            UnparsedPolicy::Drop if sorted.dropped > 0 => log_warning(format!(
                "Dropped {} row(s) with unknown '{}'",
                sorted.dropped, ts.column
            )),
            UnparsedPolicy::SinkLast if sorted.unknown > 0 => log_warning(format!(
                "{} row(s) with unknown '{}' placed last",
                sorted.unknown, ts.column
            )),
            _ => {}
        }
    }

    stats.records = table.rows.len();
    Ok(PipelineOutput { table, stats })
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        other => other.to_string(),
    }
}
