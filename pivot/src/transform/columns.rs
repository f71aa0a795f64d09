//! Column layout of the wide table.
//!
//! Descriptive columns come first in profile order, followed by one column
//! per question in ascending question id. The question order and the
//! pivoted questions must agree exactly; any drift is a structural error
//! rather than a shifted spreadsheet.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::grouper::Pivoted;
use crate::error::{PivotError, PivotResult};
use crate::models::{Cell, FlatRecord, QuestionOrder, RankedQuestion, WideTable};

/// Distinct (question id, question) pairs in ascending id order.
///
/// Rows without a question label are ignored, as they are by the pivot.
pub fn question_order(records: &[FlatRecord]) -> QuestionOrder {
    let mut seen: BTreeSet<RankedQuestion> = BTreeSet::new();
    for record in records {
        if let Some(question) = &record.question {
            seen.insert(RankedQuestion {
                id: record.question_id.clone(),
                question: question.clone(),
            });
        }
    }
    QuestionOrder {
        entries: seen.into_iter().collect(),
    }
}

/// Check that every question is ranked exactly once and that the ranking
/// and the pivot describe the same set of questions.
pub fn check_order(order: &QuestionOrder, pivoted: &BTreeSet<String>) -> PivotResult<()> {
    let mut ids_by_question: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for entry in &order.entries {
        let id = entry
            .id
            .as_ref()
            .map(|id| id.to_string())
            .unwrap_or_else(|| "(none)".to_string());
        ids_by_question.entry(entry.question.as_str()).or_default().push(id);
    }
    if let Some((question, ids)) = ids_by_question.iter().find(|(_, ids)| ids.len() > 1) {
        return Err(PivotError::DuplicateQuestion {
            question: question.to_string(),
            ids: ids.clone(),
        });
    }

    if let Some(missing) = order.questions().find(|q| !pivoted.contains(*q)) {
        return Err(PivotError::MissingFromTable(missing.to_string()));
    }
    if let Some(unranked) = pivoted.iter().find(|q| !ids_by_question.contains_key(q.as_str())) {
        return Err(PivotError::MissingFromOrder(unranked.clone()));
    }
    Ok(())
}

/// Lay the pivoted records out as a table.
///
/// `identity_columns` and `carry_columns` name the leading descriptive
/// columns and must match the width of the records' identity and carried
/// values.
pub fn layout(
    pivoted: &Pivoted,
    order: &QuestionOrder,
    identity_columns: &[String],
    carry_columns: &[String],
) -> PivotResult<WideTable> {
    check_order(order, &pivoted.questions)?;

    let descriptive: Vec<&String> = identity_columns.iter().chain(carry_columns).collect();
    let mut names: HashSet<&str> = HashSet::new();
    for name in descriptive.iter().map(|s| s.as_str()).chain(order.questions()) {
        if !names.insert(name) {
            return Err(PivotError::ColumnClash(name.to_string()));
        }
    }

    let mut columns: Vec<String> = descriptive.iter().map(|s| s.to_string()).collect();
    columns.extend(order.questions().map(String::from));

    let rows = pivoted
        .records
        .iter()
        .map(|record| {
            let mut row: Vec<Cell> = Vec::with_capacity(columns.len());
            row.extend(record.identity.iter().cloned());
            row.extend(record.carried.iter().cloned());
            row.extend(
                order
                    .questions()
                    .map(|q| record.answer(q).filter(|a| !a.is_empty()).map(String::from)),
            );
            row
        })
        .collect();

    Ok(WideTable {
        columns,
        descriptive: descriptive.len(),
        rows,
    })
}
