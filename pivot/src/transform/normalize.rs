//! Response normalization: one raw cell in, plain-text tokens out.
//!
//! Normalization never fails. A cell that looks like a list but does not
//! parse is kept as trimmed text.

use serde::{Deserialize, Serialize};

use super::literal::{parse_literal, Literal};

/// How a response cell is turned into tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizeMode {
    /// Parse literal lists into one token per element.
    #[default]
    LiteralList,
    /// Keep the cell whole, trimming bracket, quote and space characters
    /// from both ends.
    StripBrackets,
}

/// Separator placed between tokens of one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStyle {
    /// `", "`
    #[default]
    CommaSpace,
    /// `","`
    Comma,
}

impl JoinStyle {
    pub fn separator(self) -> &'static str {
        match self {
            JoinStyle::CommaSpace => ", ",
            JoinStyle::Comma => ",",
        }
    }
}

/// Outcome of reading one cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedResponse {
    /// The cell held a list literal; one entry per non-null element.
    List(Vec<String>),
    /// Anything else, already trimmed.
    Scalar(String),
}

impl ParsedResponse {
    pub fn into_tokens(self) -> Vec<String> {
        match self {
            ParsedResponse::List(items) => items,
            ParsedResponse::Scalar(text) => vec![text],
        }
    }
}

/// Read a non-null cell as a literal, falling back to plain text.
pub fn parse_response(raw: &str) -> ParsedResponse {
    match parse_literal(raw) {
        Ok(Literal::List(items)) => ParsedResponse::List(
            items
                .iter()
                .filter(|item| **item != Literal::None)
                .map(|item| item.to_text().trim().to_string())
                .collect(),
        ),
        Ok(value) => ParsedResponse::Scalar(value.to_text().trim().to_string()),
        Err(_) => ParsedResponse::Scalar(raw.trim().to_string()),
    }
}

/// Trim `[`, `]`, `'`, `"` and spaces from both ends.
pub fn strip_brackets(raw: &str) -> &str {
    raw.trim_matches(|c| matches!(c, '[' | ']' | '\'' | '"' | ' '))
}

/// Tokens contributed by one cell. Null and blank cells contribute none.
pub fn normalize_cell(cell: Option<&str>, mode: NormalizeMode) -> Vec<String> {
    let raw = match cell {
        Some(raw) if !raw.trim().is_empty() => raw,
        _ => return Vec::new(),
    };
    match mode {
        NormalizeMode::LiteralList => parse_response(raw).into_tokens(),
        NormalizeMode::StripBrackets => vec![strip_brackets(raw).to_string()],
    }
}

/// Join tokens into one answer.
pub fn join_tokens(tokens: &[String], style: JoinStyle) -> String {
    tokens.join(style.separator())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_cell() {
        let tokens = normalize_cell(Some("['a', 'b']"), NormalizeMode::LiteralList);
        assert_eq!(tokens, vec!["a", "b"]);
        assert_eq!(join_tokens(&tokens, JoinStyle::CommaSpace), "a, b");
        assert_eq!(join_tokens(&tokens, JoinStyle::Comma), "a,b");
    }

    #[test]
    fn test_scalar_cell() {
        assert_eq!(normalize_cell(Some("yes"), NormalizeMode::LiteralList), vec!["yes"]);
        assert_eq!(normalize_cell(Some("  yes \n"), NormalizeMode::LiteralList), vec!["yes"]);
    }

    #[test]
    fn test_malformed_list_falls_back() {
        assert_eq!(parse_response("[oops"), ParsedResponse::Scalar("[oops".into()));
        assert_eq!(parse_response(" 1, 500 "), ParsedResponse::Scalar("1, 500".into()));
        assert_eq!(
            normalize_cell(Some("[oops"), NormalizeMode::StripBrackets),
            vec!["oops"]
        );
    }

    #[test]
    fn test_deeply_nested_cell_falls_back() {
        let cell = "[".repeat(100_000);
        let tokens = normalize_cell(Some(&cell), NormalizeMode::LiteralList);
        assert_eq!(tokens, vec![cell]);

        let balanced = format!("{}'a'{}", "[".repeat(5_000), "]".repeat(5_000));
        assert_eq!(
            parse_response(&balanced),
            ParsedResponse::Scalar(balanced)
        );
    }

    #[test]
    fn test_list_elements_trimmed_and_nulls_dropped() {
        assert_eq!(
            parse_response("[' Tea ', None, 3, 2.0, '']"),
            ParsedResponse::List(vec!["Tea".into(), "3".into(), "2.0".into(), "".into()])
        );
    }

    #[test]
    fn test_non_list_literal_stringified() {
        assert_eq!(parse_response("'quoted'"), ParsedResponse::Scalar("quoted".into()));
        assert_eq!(parse_response("None"), ParsedResponse::Scalar("None".into()));
        assert_eq!(parse_response("(1, 'a')"), ParsedResponse::Scalar("(1, 'a')".into()));
    }

    #[test]
    fn test_empty_list_contributes_nothing() {
        assert!(normalize_cell(Some("[]"), NormalizeMode::LiteralList).is_empty());
    }

    #[test]
    fn test_strip_brackets_keeps_inner_quotes() {
        assert_eq!(
            normalize_cell(Some("['a', 'b']"), NormalizeMode::StripBrackets),
            vec!["a', 'b"]
        );
        assert_eq!(normalize_cell(Some("[]"), NormalizeMode::StripBrackets), vec![""]);
    }

    #[test]
    fn test_null_and_blank() {
        assert!(normalize_cell(None, NormalizeMode::LiteralList).is_empty());
        assert!(normalize_cell(Some("   "), NormalizeMode::StripBrackets).is_empty());
    }
}
