//! Transformation module.
//!
//! This module reshapes long-format survey rows into the wide table:
//! - Literal: Python-style literal parsing of response cells
//! - Normalize: response cells to tokens
//! - Grouper: flat rows to one wide record per visit
//! - Columns: question order and column layout
//! - Rows: timestamp reformatting and row sort
//! - Pipeline: read, pivot, order, write

pub mod columns;
pub mod grouper;
pub mod literal;
pub mod normalize;
pub mod pipeline;
pub mod rows;

pub use columns::{check_order, layout, question_order};
pub use grouper::{flat_to_wide, GroupOrder, PivotOptions, Pivoted};
pub use literal::{parse_literal, Literal, LiteralError};
pub use normalize::{join_tokens, normalize_cell, parse_response, JoinStyle, NormalizeMode, ParsedResponse};
pub use pipeline::*;
pub use rows::{parse_timestamp, reformat_column, sort_rows, SortMode, SortStats, TimestampSpec, UnparsedPolicy};
