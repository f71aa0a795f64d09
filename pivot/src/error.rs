//! Error types for the survey pivot pipeline.
//!
//! - [`CsvError`] - reading the long-format export
//! - [`ProfileError`] - resolving and validating pivot profiles
//! - [`PivotError`] - structural faults while laying out the wide table
//! - [`ExportError`] - writing the spreadsheet
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Conversion into [`PipelineError`] is automatic via `From`, so `?` works
//! across module boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// CSV Reading Errors
// =============================================================================

/// Errors while reading the input export.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input has no header row.
    #[error("CSV file is empty")]
    EmptyFile,

    /// Required columns are absent from the header.
    #[error("Missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A row could not be parsed.
    #[error("Line {line}: {message}")]
    Malformed { line: u64, message: String },

    /// Delimiter is not a single-byte character.
    #[error("Invalid delimiter {0:?}: must be an ASCII character")]
    InvalidDelimiter(char),
}

impl CsvError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CsvError::Io {
            path: path.into(),
            source,
        }
    }
}

// =============================================================================
// Profile Errors
// =============================================================================

/// Errors while resolving or validating a pivot profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No built-in or stored profile with this name.
    #[error("Profile not found: {0}")]
    NotFound(String),

    /// Profile is internally inconsistent.
    #[error("Invalid profile '{name}': {message}")]
    Invalid { name: String, message: String },

    /// IO error.
    #[error("Profile IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("Profile JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Pivot Errors
// =============================================================================

/// Structural faults: the question order and the pivoted table disagree.
///
/// Any of these aborts the run before the writer is invoked.
#[derive(Debug, Error)]
pub enum PivotError {
    /// A question from the question order has no column in the pivot.
    #[error("Question '{0}' is ordered but missing from the pivoted table")]
    MissingFromTable(String),

    /// A pivoted column has no rank in the question order.
    #[error("Question '{0}' is in the pivoted table but has no question id")]
    MissingFromOrder(String),

    /// The same question text is ranked under several ids.
    #[error("Question '{question}' maps to several question ids: {}", .ids.join(", "))]
    DuplicateQuestion { question: String, ids: Vec<String> },

    /// A column name is used twice in the header.
    #[error("Column '{0}' appears more than once in the header")]
    ColumnClash(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing the wide table.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Workbook could not be built or saved.
    #[error("Failed to write workbook '{path}': {source}")]
    Xlsx {
        path: PathBuf,
        #[source]
        source: rust_xlsxwriter::XlsxError,
    },

    /// CSV output failed.
    #[error("Failed to write CSV '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A cell holds more text than a worksheet cell accepts.
    #[error("Cell in column '{column}', sheet row {row} has {length} characters (limit {limit})")]
    CellTooLong {
        column: String,
        row: usize,
        length: usize,
        limit: usize,
    },

    /// Table exceeds the sheet limits.
    #[error("Table too large for one sheet: {rows} rows x {columns} columns")]
    TooLarge { rows: usize, columns: usize },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Profile error.
    #[error("Profile error: {0}")]
    Profile(#[from] ProfileError),

    /// Structural error.
    #[error("Pivot error: {0}")]
    Pivot(#[from] PivotError),

    /// Writing error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for reading.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;

/// Result type for pivot layout.
pub type PivotResult<T> = Result<T, PivotError>;

/// Result type for export.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::EmptyFile;
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("empty"));

        let pivot_err = PivotError::MissingFromTable("Q7".into());
        let pipeline_err: PipelineError = pivot_err.into();
        assert!(pipeline_err.to_string().contains("Q7"));
    }

    #[test]
    fn test_missing_columns_format() {
        let err = CsvError::MissingColumns(vec!["question".into(), "response".into()]);
        assert_eq!(
            err.to_string(),
            "Missing required column(s): question, response"
        );
    }

    #[test]
    fn test_duplicate_question_format() {
        let err = PivotError::DuplicateQuestion {
            question: "Shop open?".into(),
            ids: vec!["3".into(), "9".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Shop open?"));
        assert!(msg.contains("3, 9"));
    }
}
