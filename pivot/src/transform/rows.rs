//! Timestamp handling and row ordering of the wide table.
//!
//! Rows are sorted ascending on one designated column with a stable sort.
//! Values that cannot be placed (null, or unparseable in `parsed` mode) are
//! unknown and either sink below every known value or are dropped.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::models::{Cell, WideTable};

/// How the designated column is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Parse into a timestamp and compare chronologically.
    #[default]
    Parsed,
    /// Compare the cell text as-is.
    Lexicographic,
    /// Keep the pivot order.
    None,
}

/// What happens to rows whose sort value is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnparsedPolicy {
    #[default]
    SinkLast,
    Drop,
}

/// Timestamp column of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampSpec {
    /// Descriptive column holding the timestamp.
    pub column: String,
    /// Formats tried in order when parsing. RFC 3339 is always accepted.
    #[serde(default = "default_input_formats")]
    pub input_formats: Vec<String>,
    /// When set, the column is rewritten in this format before sorting.
    /// Unparseable values become blank.
    #[serde(default)]
    pub output_format: Option<String>,
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub unparsed: UnparsedPolicy,
}

/// 12-hour clock with seconds and AM/PM marker.
pub const DISPLAY_FORMAT: &str = "%Y-%m-%d %I:%M:%S %p";

pub fn default_input_formats() -> Vec<String> {
    [
        "%Y-%m-%d %H:%M:%S%.f%#z",
        "%Y-%m-%dT%H:%M:%S%.f%#z",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %I:%M:%S %p",
        "%Y-%m-%d %I:%M %p",
        "%Y/%m/%d %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M",
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%m/%d/%Y",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl TimestampSpec {
    /// Formats used to read the column when sorting: the output format if
    /// the column was rewritten, the input formats otherwise.
    pub fn sort_formats(&self) -> Vec<String> {
        match &self.output_format {
            Some(format) => vec![format.clone()],
            None => self.input_formats.clone(),
        }
    }
}

/// Parse a timestamp with the first matching format.
///
/// Date-only formats yield midnight. A UTC offset (`+06`, `+0600`,
/// `+06:00`) is read but dropped: the wall-clock time is kept as written.
pub fn parse_timestamp(text: &str, formats: &[String]) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    for format in formats {
        if let Ok(dt) = DateTime::parse_from_str(text, format) {
            return Some(dt.naive_local());
        }
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt);
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            if let Some(dt) = date.and_hms_opt(0, 0, 0) {
                return Some(dt);
            }
        }
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.naive_local())
}

/// Rewrite one column in `output_format`. Returns how many non-null values
/// could not be parsed and were blanked.
pub fn reformat_column(
    table: &mut WideTable,
    column: usize,
    input_formats: &[String],
    output_format: &str,
) -> usize {
    let mut blanked = 0;
    for row in &mut table.rows {
        let Some(cell) = row.get_mut(column) else { continue };
        let Some(text) = cell.as_deref() else { continue };
        match parse_timestamp(text, input_formats) {
            Some(dt) => *cell = Some(dt.format(output_format).to_string()),
            None => {
                blanked += 1;
                *cell = None;
            }
        }
    }
    blanked
}

/// Outcome of a row sort.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Rows with an unknown sort value.
    pub unknown: usize,
    /// Rows removed under [`UnparsedPolicy::Drop`].
    pub dropped: usize,
}

/// Sort rows ascending on `column`.
pub fn sort_rows(
    table: &mut WideTable,
    column: usize,
    mode: SortMode,
    formats: &[String],
    policy: UnparsedPolicy,
) -> SortStats {
    match mode {
        SortMode::None => SortStats::default(),
        SortMode::Parsed => sort_by_key(table, policy, |cell| {
            cell.get(column)
                .and_then(|c| c.as_deref())
                .and_then(|text| parse_timestamp(text, formats))
        }),
        SortMode::Lexicographic => sort_by_key(table, policy, |cell| {
            cell.get(column).and_then(|c| c.clone())
        }),
    }
}

fn sort_by_key<K, F>(table: &mut WideTable, policy: UnparsedPolicy, key: F) -> SortStats
where
    K: Ord,
    F: Fn(&[Cell]) -> Option<K>,
{
    let rows = std::mem::take(&mut table.rows);
    let mut keyed: Vec<(Option<K>, Vec<Cell>)> =
        rows.into_iter().map(|row| (key(row.as_slice()), row)).collect();

    let unknown = keyed.iter().filter(|(k, _)| k.is_none()).count();
    let mut dropped = 0;
    if policy == UnparsedPolicy::Drop {
        keyed.retain(|(k, _)| k.is_some());
        dropped = unknown;
    }

    // Stable: equal keys keep their relative order, unknown keys go last.
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    table.rows = keyed.into_iter().map(|(_, row)| row).collect();
    SortStats { unknown, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(values: &[Option<&str>]) -> WideTable {
        WideTable {
            columns: vec!["when".into(), "seq".into()],
            descriptive: 2,
            rows: values
                .iter()
                .enumerate()
                .map(|(i, v)| vec![v.map(String::from), Some(i.to_string())])
                .collect(),
        }
    }

    fn column(table: &WideTable, idx: usize) -> Vec<Option<&str>> {
        table.rows.iter().map(|r| r[idx].as_deref()).collect()
    }

    #[test]
    fn test_parsed_sort_sinks_unparseable() {
        let mut t = table(&[Some("2024-01-02"), Some("2024-01-01"), Some("soon")]);
        let stats = sort_rows(&mut t, 0, SortMode::Parsed, &default_input_formats(), UnparsedPolicy::SinkLast);

        assert_eq!(
            column(&t, 0),
            vec![Some("2024-01-01"), Some("2024-01-02"), Some("soon")]
        );
        assert_eq!(stats, SortStats { unknown: 1, dropped: 0 });
    }

    #[test]
    fn test_sort_is_stable_on_ties() {
        let mut t = table(&[
            Some("2024-03-01 10:00:00"),
            Some("2024-02-01 10:00:00"),
            Some("2024-03-01 10:00:00"),
            None,
            Some("bad"),
        ]);
        sort_rows(&mut t, 0, SortMode::Parsed, &default_input_formats(), UnparsedPolicy::SinkLast);
        assert_eq!(
            column(&t, 1),
            vec![Some("1"), Some("0"), Some("2"), Some("3"), Some("4")]
        );
    }

    #[test]
    fn test_drop_policy() {
        let mut t = table(&[Some("bad"), Some("2024-01-01"), None]);
        let stats = sort_rows(&mut t, 0, SortMode::Parsed, &default_input_formats(), UnparsedPolicy::Drop);
        assert_eq!(column(&t, 0), vec![Some("2024-01-01")]);
        assert_eq!(stats, SortStats { unknown: 2, dropped: 2 });
    }

    #[test]
    fn test_lexicographic_sort() {
        let mut t = table(&[Some("b"), None, Some("a"), Some("B")]);
        sort_rows(&mut t, 0, SortMode::Lexicographic, &[], UnparsedPolicy::SinkLast);
        assert_eq!(column(&t, 0), vec![Some("B"), Some("a"), Some("b"), None]);
    }

    #[test]
    fn test_twelve_hour_round_trip() {
        let formats = vec![DISPLAY_FORMAT.to_string()];
        let dt = parse_timestamp("2024-10-15 02:30:00 PM", &formats).unwrap();
        assert_eq!(dt.format("%H:%M").to_string(), "14:30");
        assert_eq!(dt.format(DISPLAY_FORMAT).to_string(), "2024-10-15 02:30:00 PM");
    }

    #[test]
    fn test_parse_variants() {
        let formats = default_input_formats();
        assert!(parse_timestamp("2024-10-15 14:30:00", &formats).is_some());
        assert!(parse_timestamp("2024-10-15T14:30:00.250", &formats).is_some());
        assert!(parse_timestamp("2024-10-15T14:30:00+06:00", &formats).is_some());
        assert!(parse_timestamp("10/15/2024 14:30", &formats).is_some());

        let wall_clock = NaiveDate::from_ymd_opt(2024, 10, 15)
            .and_then(|d| d.and_hms_opt(14, 30, 0))
            .unwrap();
        for text in [
            "2024-10-15 14:30:00+06",
            "2024-10-15 14:30:00+0600",
            "2024-10-15 14:30:00+06:00",
            "2024-10-15T14:30:00-05",
        ] {
            assert_eq!(parse_timestamp(text, &formats), Some(wall_clock), "{}", text);
        }
        let fractional = parse_timestamp("2024-10-15 14:30:00.123456+06", &formats).unwrap();
        assert_eq!(fractional.format("%H:%M:%S%.6f").to_string(), "14:30:00.123456");

        assert!(parse_timestamp("", &formats).is_none());
        assert!(parse_timestamp("yesterday", &formats).is_none());
    }

    #[test]
    fn test_reformat_column() {
        let mut t = table(&[Some("2024-10-15 14:30:00"), Some("garbage"), None]);
        let blanked = reformat_column(&mut t, 0, &default_input_formats(), DISPLAY_FORMAT);

        assert_eq!(blanked, 1);
        assert_eq!(
            column(&t, 0),
            vec![Some("2024-10-15 02:30:00 PM"), None, None]
        );
    }

    #[test]
    fn test_reformat_keeps_offset_timestamps() {
        let mut t = table(&[Some("2024-10-15 14:30:00.5+06"), Some("2024-10-14 09:05:00+0600")]);
        let blanked = reformat_column(&mut t, 0, &default_input_formats(), DISPLAY_FORMAT);

        assert_eq!(blanked, 0);
        assert_eq!(
            column(&t, 0),
            vec![Some("2024-10-15 02:30:00 PM"), Some("2024-10-14 09:05:00 AM")]
        );
    }

    #[test]
    fn test_sort_formats_follow_output_format() {
        let spec = TimestampSpec {
            column: "submit_time".into(),
            input_formats: default_input_formats(),
            output_format: Some(DISPLAY_FORMAT.into()),
            sort: SortMode::Parsed,
            unparsed: UnparsedPolicy::SinkLast,
        };
        assert_eq!(spec.sort_formats(), vec![DISPLAY_FORMAT.to_string()]);
    }
}
