//! # Survey Pivot - long-format survey exports to wide spreadsheets
//!
//! Survey platforms export one row per (visit, question) pair. Survey pivot
//! folds those rows into one row per visit with one column per question,
//! normalizing list-valued answers on the way, and writes the result as a
//! spreadsheet.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV export │────▶│   Parser    │────▶│  Transform  │────▶│ XLSX / CSV  │
//! │   (long)    │     │  (auto-enc) │     │  (pivot)    │     │   (wide)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                   ▲
//!                            └──── Profile ──────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use survey_pivot::{builtin, default_output_path, run};
//! use std::path::Path;
//!
//! let input = Path::new("retailer_survey_oct.csv");
//! let profile = builtin("retailer-survey").unwrap();
//! let summary = run(input, &default_output_path(input), &profile)?;
//! println!("Wrote {} visits", summary.stats.records);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Flat and wide records, question order, wide table
//! - [`parser`] - CSV reading with encoding and delimiter detection
//! - [`profile`] - Export layouts and the profile registry
//! - [`transform`] - Normalization, pivot, ordering, and pipeline
//! - [`export`] - XLSX and CSV writers
//! - [`logs`] - Progress logging

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Reading
pub mod parser;

// Configuration
pub mod profile;

// Transformation
pub mod transform;

// Writing
pub mod export;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, CsvResult, ExportError, ExportResult, PipelineError, PipelineResult, PivotError,
    PivotResult, ProfileError, ProfileResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, FlatRecord, QuestionId, QuestionOrder, RankedQuestion, WideRecord, WideTable};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, read_flat_records, read_headers,
    ColumnSelection, ParseResult, ReadOptions,
};

// =============================================================================
// Re-exports - Profiles
// =============================================================================

pub use profile::{builtin, builtins, PivotProfile, ProfileRegistry, ProfileSource, DEFAULT_PROFILE};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    flat_to_wide, join_tokens, layout, normalize_cell, parse_response, question_order,
    sort_rows, GroupOrder, JoinStyle, NormalizeMode, ParsedResponse, SortMode, TimestampSpec,
    UnparsedPolicy,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    default_output_path, pivot_flat_records, run, PipelineOutput, PivotStats, RunSummary,
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{write_table, ExportFormat};
