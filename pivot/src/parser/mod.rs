//! Tabular reader for long-format survey exports.
//!
//! Decodes the file (encoding auto-detected), picks the delimiter, checks that
//! every column the profile needs is present, and turns each data row into a
//! [`FlatRecord`]. Rows are consumed in batches; batches only drive progress
//! logging and their concatenation is the file order.

use std::collections::HashSet;
use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::logs::log_info_indent;
use crate::models::{Cell, FlatRecord, QuestionId};

/// Rows per progress batch unless the profile says otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Tokens read as missing values by default, the common dataframe NA set.
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND",
    "1.#QNAN", "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn default_na_values() -> Vec<String> {
    DEFAULT_NA_VALUES.iter().map(|s| s.to_string()).collect()
}

/// Columns to pull out of each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSelection {
    pub identity: Vec<String>,
    pub carried: Vec<String>,
    pub question_id: String,
    pub question: String,
    pub response: String,
}

impl ColumnSelection {
    /// Every column the reader needs, in selection order.
    pub fn required(&self) -> Vec<&str> {
        self.identity
            .iter()
            .chain(&self.carried)
            .map(String::as_str)
            .chain([
                self.question_id.as_str(),
                self.question.as_str(),
                self.response.as_str(),
            ])
            .collect()
    }
}

/// Reader settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// `None` detects the delimiter from the header line.
    pub delimiter: Option<char>,
    pub batch_size: usize,
    pub na_values: Vec<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            batch_size: DEFAULT_BATCH_SIZE,
            na_values: default_na_values(),
        }
    }
}

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Data rows in file order
    pub records: Vec<FlatRecord>,
    /// Detected encoding
    pub encoding: String,
    /// Detected or configured delimiter
    pub delimiter: char,
    /// Column headers, trimmed
    pub headers: Vec<String>,
    /// Number of batches read
    pub batches: usize,
}

// =============================================================================
// Encoding & Delimiter Detection
// =============================================================================

/// Detect the encoding of raw bytes. Valid UTF-8 wins; otherwise chardet
/// decides.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes with the given encoding and drop a leading byte-order mark.
///
/// Unknown encodings and invalid sequences decode lossily.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        // WHATWG maps latin-1 labels onto windows-1252, a superset.
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when the line holds none of the candidates.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

// =============================================================================
// Reading
// =============================================================================

/// Read a long-format export from disk.
pub fn read_flat_records(
    path: &Path,
    columns: &ColumnSelection,
    options: &ReadOptions,
) -> CsvResult<ParseResult> {
    let bytes = std::fs::read(path).map_err(|e| CsvError::io(path, e))?;
    parse_bytes(&bytes, columns, options)
}

/// Parse raw bytes with encoding detection.
pub fn parse_bytes(
    bytes: &[u8],
    columns: &ColumnSelection,
    options: &ReadOptions,
) -> CsvResult<ParseResult> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_str(&content, encoding, columns, options)
}

/// Parse decoded text.
pub fn parse_str(
    content: &str,
    encoding: String,
    columns: &ColumnSelection,
    options: &ReadOptions,
) -> CsvResult<ParseResult> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let delimiter = options.delimiter.unwrap_or_else(|| detect_delimiter(content));
    let mut reader = csv_reader(content, delimiter)?;

    let headers = read_header_record(&mut reader)?;
    let layout = ColumnLayout::resolve(&headers, columns)?;
    let na_values: HashSet<&str> = options.na_values.iter().map(String::as_str).collect();
    let batch_size = options.batch_size.max(1);

    let mut records = Vec::new();
    let mut batches = 0;
    let mut in_batch = 0;

    for result in reader.records() {
        let row = result.map_err(malformed)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        if row.len() > headers.len() {
            return Err(CsvError::Malformed {
                line,
                message: format!("expected {} fields, saw {}", headers.len(), row.len()),
            });
        }

        let cell = |idx: usize| to_cell(row.get(idx), &na_values);
        records.push(FlatRecord {
            line,
            identity: layout.identity.iter().map(|&i| cell(i)).collect(),
            carried: layout.carried.iter().map(|&i| cell(i)).collect(),
            question_id: cell(layout.question_id).and_then(|raw| QuestionId::parse(&raw)),
            question: cell(layout.question),
            response: cell(layout.response),
        });

        in_batch += 1;
        if in_batch == batch_size {
            batches += 1;
            log_info_indent(format!("Loaded chunk with {} rows", in_batch), 1);
            in_batch = 0;
        }
    }
    if in_batch > 0 {
        batches += 1;
        log_info_indent(format!("Loaded chunk with {} rows", in_batch), 1);
    }

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
        headers,
        batches,
    })
}

/// Read only the header line of a file.
///
/// Returns the trimmed headers and the delimiter that was used.
pub fn read_headers(path: &Path, delimiter: Option<char>) -> CsvResult<(Vec<String>, char)> {
    let bytes = std::fs::read(path).map_err(|e| CsvError::io(path, e))?;
    let content = decode_content(&bytes, &detect_encoding(&bytes));
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));
    let mut reader = csv_reader(&content, delimiter)?;
    Ok((read_header_record(&mut reader)?, delimiter))
}

fn csv_reader(content: &str, delimiter: char) -> CsvResult<csv::Reader<&[u8]>> {
    if !delimiter.is_ascii() {
        return Err(CsvError::InvalidDelimiter(delimiter));
    }
    Ok(csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes()))
}

fn read_header_record(reader: &mut csv::Reader<&[u8]>) -> CsvResult<Vec<String>> {
    let headers: Vec<String> = reader
        .headers()
        .map_err(malformed)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(String::is_empty) {
        return Err(CsvError::EmptyFile);
    }
    Ok(headers)
}

fn malformed(err: csv::Error) -> CsvError {
    let line = err.position().map(|p| p.line()).unwrap_or(0);
    CsvError::Malformed {
        line,
        message: err.to_string(),
    }
}

/// Missing fields (short rows) and NA tokens are null.
fn to_cell(raw: Option<&str>, na_values: &HashSet<&str>) -> Cell {
    match raw {
        Some(raw) if !raw.is_empty() && !na_values.contains(raw) => Some(raw.to_string()),
        _ => None,
    }
}

/// Header positions of the selected columns.
struct ColumnLayout {
    identity: Vec<usize>,
    carried: Vec<usize>,
    question_id: usize,
    question: usize,
    response: usize,
}

impl ColumnLayout {
    fn resolve(headers: &[String], columns: &ColumnSelection) -> CsvResult<Self> {
        let mut missing: Vec<String> = Vec::new();
        for name in columns.required() {
            if !headers.iter().any(|h| h == name) && !missing.iter().any(|m| m == name) {
                missing.push(name.to_string());
            }
        }
        if !missing.is_empty() {
            return Err(CsvError::MissingColumns(missing));
        }

        // Presence was checked above.
        let position = |name: &str| headers.iter().position(|h| h == name).unwrap_or(0);
        Ok(Self {
            identity: columns.identity.iter().map(|c| position(c)).collect(),
            carried: columns.carried.iter().map(|c| position(c)).collect(),
            question_id: position(&columns.question_id),
            question: position(&columns.question),
            response: position(&columns.response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn selection() -> ColumnSelection {
        ColumnSelection {
            identity: vec!["uid".into()],
            carried: vec!["region".into()],
            question_id: "question_id".into(),
            question: "question".into(),
            response: "response".into(),
        }
    }

    fn parse(content: &str) -> CsvResult<ParseResult> {
        parse_str(content, "utf-8".into(), &selection(), &ReadOptions::default())
    }

    #[test]
    fn test_reads_selected_columns() {
        let csv = "uid,region,extra,question_id,question,response\n\
                   A,North,x,1,Q1,\"['y', 'z']\"\n\
                   B,,x,2,Q2,yes\n";
        let result = parse(csv).unwrap();

        assert_eq!(result.delimiter, ',');
        assert_eq!(result.records.len(), 2);
        let a = &result.records[0];
        assert_eq!(a.line, 2);
        assert_eq!(a.identity, vec![Some("A".to_string())]);
        assert_eq!(a.carried, vec![Some("North".to_string())]);
        assert_eq!(a.question_id, QuestionId::parse("1"));
        assert_eq!(a.response.as_deref(), Some("['y', 'z']"));
        assert_eq!(result.records[1].carried, vec![None]);
    }

    #[test]
    fn test_missing_columns_named() {
        let err = parse("uid,question\nA,Q1\n").unwrap_err();
        match err {
            CsvError::MissingColumns(cols) => {
                assert_eq!(cols, vec!["region", "question_id", "response"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_na_tokens_become_null() {
        let csv = "uid,region,question_id,question,response\n\
                   A,NA,1,Q1,None\n\
                   A,n/a,2,Q2,NULL\n\
                   A,  ,3,Q3,nothing\n";
        let result = parse(csv).unwrap();
        assert_eq!(result.records[0].carried, vec![None]);
        assert_eq!(result.records[0].response, None);
        assert_eq!(result.records[1].response, None);
        assert_eq!(result.records[2].carried, vec![Some("  ".to_string())]);
    }

    #[test]
    fn test_short_rows_filled_with_null() {
        let result = parse("uid,region,question_id,question,response\nA,North,1,Q1\n").unwrap();
        assert_eq!(result.records[0].response, None);
    }

    #[test]
    fn test_long_row_is_malformed() {
        let err = parse("uid,region,question_id,question,response\nA,N,1,Q1,x\nB,N,1,Q1,x,extra\n")
            .unwrap_err();
        assert!(matches!(err, CsvError::Malformed { line: 3, .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse(""), Err(CsvError::EmptyFile)));
        assert!(matches!(parse("  \n"), Err(CsvError::EmptyFile)));
    }

    #[test]
    fn test_header_only_yields_no_records() {
        let result = parse("uid,region,question_id,question,response\n").unwrap();
        assert!(result.records.is_empty());
        assert_eq!(result.batches, 0);
    }

    #[test]
    fn test_batches_preserve_order() {
        let mut csv = String::from("uid,region,question_id,question,response\n");
        for i in 0..5 {
            csv.push_str(&format!("V{i},R,1,Q1,{i}\n"));
        }
        let options = ReadOptions {
            batch_size: 2,
            ..ReadOptions::default()
        };
        let result = parse_str(&csv, "utf-8".into(), &selection(), &options).unwrap();

        assert_eq!(result.batches, 3);
        let responses: Vec<_> = result
            .records
            .iter()
            .map(|r| r.response.clone().unwrap())
            .collect();
        assert_eq!(responses, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_headers_trimmed_and_bom_stripped() {
        let bytes = "\u{feff} uid ;region;question_id;question;response\nA;N;1;Q1;x\n".as_bytes();
        let result = parse_bytes(bytes, &selection(), &ReadOptions::default()).unwrap();
        assert_eq!(result.delimiter, ';');
        assert_eq!(result.headers[0], "uid");
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_invalid_delimiter() {
        let options = ReadOptions {
            delimiter: Some('§'),
            ..ReadOptions::default()
        };
        let err = parse_str("a\n", "utf-8".into(), &selection(), &options).unwrap_err();
        assert!(matches!(err, CsvError::InvalidDelimiter('§')));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        assert_eq!(decode_content(bytes, "iso-8859-1"), "Société");
    }

    #[test]
    fn test_read_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "uid,region,question_id,question,response").unwrap();
        writeln!(file, "A,North,1,Q1,x").unwrap();

        let result = read_flat_records(file.path(), &selection(), &ReadOptions::default()).unwrap();
        assert_eq!(result.records.len(), 1);
        assert_eq!(result.encoding, "utf-8");

        let (headers, delimiter) = read_headers(file.path(), None).unwrap();
        assert_eq!(headers.len(), 5);
        assert_eq!(delimiter, ',');
    }

    #[test]
    fn test_missing_file() {
        let err = read_flat_records(
            Path::new("/nonexistent/export.csv"),
            &selection(),
            &ReadOptions::default(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("/nonexistent/export.csv"));
    }
}
