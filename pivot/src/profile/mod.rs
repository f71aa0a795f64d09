//! Pivot profiles: one JSON document per export layout.
//!
//! A profile names the identity and carried columns, the long-format
//! question/response columns, and the knobs of every pipeline stage
//! (normalization, join, group order, timestamp handling, reader settings).
//!
//! Three built-in profiles reproduce the legacy report layouts:
//!
//! | name              | normalization    | join  | timestamp                          |
//! |-------------------|------------------|-------|------------------------------------|
//! | `retailer-survey` | literal list     | `, `  | `submit_time` reformatted, parsed  |
//! | `market-visit`    | strip brackets   | `,`   | `call_start_time` parsed, rendered |
//! | `sr-survey`       | literal list     | `, `  | `created_at` lexicographic         |

pub mod registry;

pub use registry::{ProfileRegistry, ProfileSource};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{ProfileError, ProfileResult};
use crate::parser::{default_na_values, ColumnSelection, ReadOptions, DEFAULT_BATCH_SIZE};
use crate::transform::grouper::{GroupOrder, PivotOptions};
use crate::transform::normalize::{JoinStyle, NormalizeMode};
use crate::transform::rows::{default_input_formats, SortMode, TimestampSpec, UnparsedPolicy, DISPLAY_FORMAT};

/// Profile used when none is given on the command line.
pub const DEFAULT_PROFILE: &str = "retailer-survey";

/// Description of one export layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Key columns, in output order.
    pub identity_columns: Vec<String>,
    /// Non-key descriptive columns, first occurrence per visit wins.
    #[serde(default)]
    pub carry_columns: Vec<String>,
    #[serde(default = "default_question_id_column")]
    pub question_id_column: String,
    #[serde(default = "default_question_column")]
    pub question_column: String,
    #[serde(default = "default_response_column")]
    pub response_column: String,
    #[serde(default)]
    pub normalization: NormalizeMode,
    #[serde(default)]
    pub join: JoinStyle,
    #[serde(default)]
    pub group_order: GroupOrder,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<TimestampSpec>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// `None` detects the delimiter from the header line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(default = "default_na_values")]
    pub na_values: Vec<String>,
}

fn default_question_id_column() -> String {
    "question_id".to_string()
}

fn default_question_column() -> String {
    "question".to_string()
}

fn default_response_column() -> String {
    "response".to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl PivotProfile {
    /// Profile with defaults for everything but the name and key columns.
    pub fn new(name: impl Into<String>, identity_columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            identity_columns: identity_columns.iter().map(|c| c.to_string()).collect(),
            carry_columns: Vec::new(),
            question_id_column: default_question_id_column(),
            question_column: default_question_column(),
            response_column: default_response_column(),
            normalization: NormalizeMode::default(),
            join: JoinStyle::default(),
            group_order: GroupOrder::default(),
            timestamp: None,
            batch_size: DEFAULT_BATCH_SIZE,
            delimiter: None,
            na_values: default_na_values(),
        }
    }

    pub fn from_json(json: &str) -> ProfileResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> ProfileResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every column the reader has to find in the input header.
    pub fn required_columns(&self) -> Vec<&str> {
        self.identity_columns
            .iter()
            .chain(&self.carry_columns)
            .map(String::as_str)
            .chain([
                self.question_id_column.as_str(),
                self.question_column.as_str(),
                self.response_column.as_str(),
            ])
            .collect()
    }

    pub fn column_selection(&self) -> ColumnSelection {
        ColumnSelection {
            identity: self.identity_columns.clone(),
            carried: self.carry_columns.clone(),
            question_id: self.question_id_column.clone(),
            question: self.question_column.clone(),
            response: self.response_column.clone(),
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            delimiter: self.delimiter,
            batch_size: self.batch_size,
            na_values: self.na_values.clone(),
        }
    }

    pub fn pivot_options(&self) -> PivotOptions {
        PivotOptions {
            normalization: self.normalization,
            join: self.join,
            group_order: self.group_order,
        }
    }

    /// Check the profile for internal consistency.
    pub fn validate(&self) -> ProfileResult<()> {
        let invalid = |message: String| ProfileError::Invalid {
            name: self.name.clone(),
            message,
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name must not be empty".into()));
        }
        if self.identity_columns.is_empty() {
            return Err(invalid("identity_columns must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for column in self.required_columns() {
            if column.trim().is_empty() {
                return Err(invalid("column names must not be empty".into()));
            }
            if !seen.insert(column) {
                return Err(invalid(format!("column '{}' is listed more than once", column)));
            }
        }

        if self.batch_size == 0 {
            return Err(invalid("batch_size must be greater than 0".into()));
        }
        if let Some(delimiter) = self.delimiter {
            if !delimiter.is_ascii() {
                return Err(invalid(format!("delimiter {:?} is not an ASCII character", delimiter)));
            }
        }
        if let Some(ts) = &self.timestamp {
            let descriptive = self
                .identity_columns
                .iter()
                .chain(&self.carry_columns)
                .any(|c| *c == ts.column);
            if !descriptive {
                return Err(invalid(format!(
                    "timestamp column '{}' must be an identity or carried column",
                    ts.column
                )));
            }
            if ts.sort == SortMode::Parsed && ts.sort_formats().is_empty() {
                return Err(invalid("timestamp input_formats must not be empty".into()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Built-in Profiles
// =============================================================================

/// The built-in profiles, in display order.
pub fn builtins() -> Vec<PivotProfile> {
    vec![retailer_survey(), market_visit(), sr_survey()]
}

/// Built-in profile by name.
pub fn builtin(name: &str) -> Option<PivotProfile> {
    builtins().into_iter().find(|p| p.name == name)
}

fn retailer_survey() -> PivotProfile {
    let mut profile = PivotProfile::new(
        "retailer-survey",
        &[
            "retailer_code",
            "partner_code",
            "retailer_name",
            "channel",
            "sub_channel",
            "territory",
            "route",
            "section",
            "retailer_status",
            "latitude",
            "longitude",
            "submit_time",
            "tsa_name",
            "tsa_code",
        ],
    );
    profile.description =
        "Retailer questionnaire: list answers joined with ', ', sorted by submit time".into();
    profile.timestamp = Some(TimestampSpec {
        column: "submit_time".into(),
        input_formats: default_input_formats(),
        output_format: Some(DISPLAY_FORMAT.into()),
        sort: SortMode::Parsed,
        unparsed: UnparsedPolicy::SinkLast,
    });
    profile
}

fn market_visit() -> PivotProfile {
    const CALL_TIME_FORMAT: &str = "%Y-%m-%d %I:%M %p";

    let mut profile = PivotProfile::new(
        "market-visit",
        &[
            "tsa_call_uid",
            "retailer_code",
            "retailer_name",
            "channel",
            "sub_channel",
            "territory",
            "route",
            "section",
            "call_type",
            "call_start_time",
            "call_end_time",
            "retailer_status",
            "geo_verified",
            "internet_connection_validity",
            "geo_verified_image_url",
            "within_meters",
            "latitude",
            "longitude",
            "call_date",
            "tsa_name",
            "tsa_code",
        ],
    );
    profile.description =
        "Market visit calls: bracket-stripped answers joined with ',', sorted by call start".into();
    profile.normalization = NormalizeMode::StripBrackets;
    profile.join = JoinStyle::Comma;
    profile.timestamp = Some(TimestampSpec {
        column: "call_start_time".into(),
        input_formats: vec![CALL_TIME_FORMAT.into()],
        output_format: Some(CALL_TIME_FORMAT.into()),
        sort: SortMode::Parsed,
        unparsed: UnparsedPolicy::SinkLast,
    });
    profile
}

fn sr_survey() -> PivotProfile {
    let mut profile = PivotProfile::new(
        "sr-survey",
        &[
            "region_name",
            "areas_name",
            "dh_name",
            "tr_name",
            "point_name",
            "routes",
            "sections",
            "retailer_code",
            "latitude",
            "longitude",
            "created_at",
        ],
    );
    profile.description = "SR survey: list answers joined with ', ', sorted by created_at text".into();
    profile.timestamp = Some(TimestampSpec {
        column: "created_at".into(),
        input_formats: default_input_formats(),
        output_format: None,
        sort: SortMode::Lexicographic,
        unparsed: UnparsedPolicy::SinkLast,
    });
    profile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_valid() {
        let profiles = builtins();
        assert_eq!(profiles.len(), 3);
        for profile in &profiles {
            profile.validate().unwrap();
        }
        assert!(builtin(DEFAULT_PROFILE).is_some());
        assert!(builtin("nope").is_none());
    }

    #[test]
    fn test_market_visit_settings() {
        let profile = builtin("market-visit").unwrap();
        assert_eq!(profile.normalization, NormalizeMode::StripBrackets);
        assert_eq!(profile.join, JoinStyle::Comma);
        assert_eq!(profile.identity_columns[0], "tsa_call_uid");
    }

    #[test]
    fn test_minimal_json_gets_defaults() {
        let profile = PivotProfile::from_json(r#"{"name": "mini", "identity_columns": ["uid"]}"#)
            .unwrap();
        assert_eq!(profile.question_column, "question");
        assert_eq!(profile.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(profile.group_order, GroupOrder::Key);
        assert!(profile.na_values.iter().any(|v| v == "NaN"));
        assert_eq!(profile.required_columns(), vec!["uid", "question_id", "question", "response"]);
        profile.validate().unwrap();
    }

    #[test]
    fn test_json_options() {
        let json = r#"{
            "name": "custom",
            "identity_columns": ["uid", "when"],
            "carry_columns": ["region"],
            "normalization": "strip_brackets",
            "join": "comma",
            "group_order": "first_seen",
            "delimiter": ";",
            "timestamp": {"column": "when", "sort": "lexicographic", "unparsed": "drop"}
        }"#;
        let profile = PivotProfile::from_json(json).unwrap();
        assert_eq!(profile.pivot_options().group_order, GroupOrder::FirstSeen);
        assert_eq!(profile.read_options().delimiter, Some(';'));
        let ts = profile.timestamp.as_ref().unwrap();
        assert_eq!(ts.sort, SortMode::Lexicographic);
        assert_eq!(ts.unparsed, UnparsedPolicy::Drop);
        assert!(!ts.input_formats.is_empty());
        profile.validate().unwrap();
    }

    #[test]
    fn test_json_round_trip() {
        let profile = builtin("sr-survey").unwrap();
        let back = PivotProfile::from_json(&profile.to_json().unwrap()).unwrap();
        assert_eq!(back, profile);
    }

    #[test]
    fn test_validation_failures() {
        let mut profile = PivotProfile::new("p", &[]);
        assert!(profile.validate().is_err());

        profile.identity_columns = vec!["uid".into()];
        profile.carry_columns = vec!["uid".into()];
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("'uid' is listed more than once"));

        profile.carry_columns.clear();
        profile.batch_size = 0;
        assert!(profile.validate().is_err());

        profile.batch_size = 10;
        profile.timestamp = Some(TimestampSpec {
            column: "response".into(),
            input_formats: default_input_formats(),
            output_format: None,
            sort: SortMode::Parsed,
            unparsed: UnparsedPolicy::SinkLast,
        });
        let err = profile.validate().unwrap_err();
        assert!(err.to_string().contains("identity or carried"));
    }

    #[test]
    fn test_question_column_clash_rejected() {
        let mut profile = PivotProfile::new("p", &["question"]);
        assert!(profile.validate().is_err());
        profile.identity_columns = vec!["uid".into()];
        profile.validate().unwrap();
    }
}
