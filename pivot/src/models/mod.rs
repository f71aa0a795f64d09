//! Domain models for the survey pivot.
//!
//! - [`FlatRecord`] - one long-format row (one question/answer of one visit)
//! - [`WideRecord`] - one visit with every answer folded in
//! - [`QuestionId`] - orderable question rank
//! - [`QuestionOrder`] - question columns in rank order
//! - [`WideTable`] - the laid-out table handed to the writer

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// A nullable cell. `None` is a missing value in the export.
pub type Cell = Option<String>;

// =============================================================================
// Question Id
// =============================================================================

/// Rank of a question column.
///
/// Numeric ids compare numerically; anything that is not a number compares
/// as text and sorts after every number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionId {
    Number(f64),
    Text(String),
}

impl QuestionId {
    /// Parse a raw id cell. Blank cells have no id.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Some(QuestionId::Number(n)),
            _ => Some(QuestionId::Text(trimmed.to_string())),
        }
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuestionId::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                write!(f, "{}", *n as i64)
            }
            QuestionId::Number(n) => write!(f, "{}", n),
            QuestionId::Text(s) => f.write_str(s),
        }
    }
}

impl PartialEq for QuestionId {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QuestionId {}

impl PartialOrd for QuestionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QuestionId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (QuestionId::Number(a), QuestionId::Number(b)) => a.total_cmp(b),
            (QuestionId::Number(_), QuestionId::Text(_)) => Ordering::Less,
            (QuestionId::Text(_), QuestionId::Number(_)) => Ordering::Greater,
            (QuestionId::Text(a), QuestionId::Text(b)) => a.cmp(b),
        }
    }
}

// =============================================================================
// Flat Record
// =============================================================================

/// One row of the long-format export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlatRecord {
    /// 1-based line of the row in the source file (header is line 1).
    pub line: u64,
    /// Identity column values, in profile order.
    pub identity: Vec<Cell>,
    /// Carried (non-key) descriptive values, in profile order.
    pub carried: Vec<Cell>,
    pub question_id: Option<QuestionId>,
    pub question: Cell,
    pub response: Cell,
}

// =============================================================================
// Wide Record
// =============================================================================

/// One visit after the pivot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideRecord {
    pub identity: Vec<Cell>,
    pub carried: Vec<Cell>,
    /// Joined answer per question. A question the visit never saw is absent.
    pub answers: HashMap<String, String>,
}

impl WideRecord {
    /// Answer for a question, `None` when the visit had no record for it.
    pub fn answer(&self, question: &str) -> Option<&str> {
        self.answers.get(question).map(String::as_str)
    }
}

// =============================================================================
// Question Order
// =============================================================================

/// One ranked question column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedQuestion {
    /// `None` sorts after every id.
    pub id: Option<QuestionId>,
    pub question: String,
}

impl PartialOrd for RankedQuestion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RankedQuestion {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_id = match (&self.id, &other.id) {
            (Some(a), Some(b)) => a.cmp(b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_id.then_with(|| self.question.cmp(&other.question))
    }
}

/// Question columns in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuestionOrder {
    pub entries: Vec<RankedQuestion>,
}

impl QuestionOrder {
    pub fn questions(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.question.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Wide Table
// =============================================================================

/// Header plus rows, ready for sorting and export.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    pub columns: Vec<String>,
    /// Number of leading identity and carried columns.
    pub descriptive: usize,
    pub rows: Vec<Vec<Cell>>,
}

impl WideTable {
    /// Index of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell at `row`, `column`, treating a missing value as `None`.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row)?.get(idx)?.as_deref()
    }
}

// =============================================================================
// Tests
// =============================================================================
