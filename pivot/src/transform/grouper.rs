//! Fold flat question/answer rows into one wide record per visit.
//!
//! ```text
//! Flat rows (long)                    →  Wide records
//! ┌──────────────────────────────┐       ┌──────────────────────────────┐
//! │ visit A │ Q1 │ "x"           │       │ visit A │ Q1: x  │ Q2: y, z  │
//! │ visit A │ Q2 │ "['y', 'z']"  │  →    ├──────────────────────────────┤
//! │ visit B │ Q1 │ (null)        │       │ visit B │ Q1: "" │ Q2: -     │
//! └──────────────────────────────┘       └──────────────────────────────┘
//! ```
//!
//! The grouping key is the full identity tuple; nulls are equal to nulls.
//! Carried columns are not part of the key and keep the value of the first
//! row seen for the visit. Later rows that disagree are only counted.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::normalize::{join_tokens, normalize_cell, JoinStyle, NormalizeMode};
use crate::models::{Cell, FlatRecord, WideRecord};

/// Order of wide records coming out of the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Order in which each visit first appears in the input.
    FirstSeen,
    /// Ascending identity tuple, nulls after values.
    #[default]
    Key,
}

/// Settings for one pivot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PivotOptions {
    pub normalization: NormalizeMode,
    pub join: JoinStyle,
    pub group_order: GroupOrder,
}

/// Wide records plus what the pivot had to skip or ignore.
#[derive(Debug, Clone, Default)]
pub struct Pivoted {
    pub records: Vec<WideRecord>,
    /// Every question that received a column.
    pub questions: BTreeSet<String>,
    /// Rows without a question label.
    pub skipped_without_question: usize,
    /// Rows whose carried values differ from the first row of their visit.
    pub carried_conflicts: usize,
}

/// Pivot flat rows into one wide record per distinct identity tuple.
pub fn flat_to_wide(records: &[FlatRecord], options: &PivotOptions) -> Pivoted {
    let mut index: HashMap<&[Cell], usize> = HashMap::new();
    let mut visits: Vec<VisitBuilder> = Vec::new();
    let mut questions = BTreeSet::new();
    let mut skipped_without_question = 0;
    let mut carried_conflicts = 0;

    for record in records {
        let slot = *index.entry(record.identity.as_slice()).or_insert_with(|| {
            visits.push(VisitBuilder::new(record));
            visits.len() - 1
        });
        let visit = &mut visits[slot];

        if visit.carried != record.carried {
            carried_conflicts += 1;
        }

        let Some(question) = record.question.as_deref() else {
            skipped_without_question += 1;
            continue;
        };
        if !questions.contains(question) {
            questions.insert(question.to_string());
        }

        let tokens = normalize_cell(record.response.as_deref(), options.normalization);
        visit.add_answer(question, tokens);
    }

    if options.group_order == GroupOrder::Key {
        let numeric = numeric_key_columns(&visits);
        visits.sort_by(|a, b| compare_keys(&a.identity, &b.identity, &numeric));
    }

    Pivoted {
        records: visits.into_iter().map(|v| v.build(options.join)).collect(),
        questions,
        skipped_without_question,
        carried_conflicts,
    }
}

/// Identity columns whose non-null values all read as finite numbers.
/// Those sort by value (`9.5` before `23.1`), the rest by text.
fn numeric_key_columns(visits: &[VisitBuilder]) -> Vec<bool> {
    let width = visits.first().map_or(0, |v| v.identity.len());
    (0..width)
        .map(|col| {
            let mut values = visits
                .iter()
                .filter_map(|v| v.identity.get(col).and_then(Cell::as_deref))
                .peekable();
            values.peek().is_some() && values.all(|text| key_number(text).is_some())
        })
        .collect()
}

fn key_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Compare identity tuples field by field, nulls last.
fn compare_keys(a: &[Cell], b: &[Cell], numeric: &[bool]) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    for (col, (x, y)) in a.iter().zip(b).enumerate() {
        let ord = match (x, y) {
            (Some(x), Some(y)) if numeric.get(col).copied().unwrap_or(false) => {
                match (key_number(x), key_number(y)) {
                    (Some(m), Some(n)) => m.total_cmp(&n),
                    _ => x.cmp(y),
                }
            }
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.len().cmp(&b.len())
}

/// Accumulates the answers of one visit.
struct VisitBuilder {
    identity: Vec<Cell>,
    carried: Vec<Cell>,
    tokens: HashMap<String, Vec<String>>,
}

impl VisitBuilder {
    fn new(record: &FlatRecord) -> Self {
        Self {
            identity: record.identity.clone(),
            carried: record.carried.clone(),
            tokens: HashMap::new(),
        }
    }

    fn add_answer(&mut self, question: &str, tokens: Vec<String>) {
        match self.tokens.get_mut(question) {
            Some(existing) => existing.extend(tokens),
            None => {
                self.tokens.insert(question.to_string(), tokens);
            }
        }
    }

    fn build(self, join: JoinStyle) -> WideRecord {
        let answers = self
            .tokens
            .into_iter()
            .map(|(question, tokens)| {
                let joined = join_tokens(&tokens, join);
                (question, joined)
            })
            .collect();

        WideRecord {
            identity: self.identity,
            carried: self.carried,
            answers,
        }
    }
}
