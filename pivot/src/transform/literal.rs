//! Parser for literal-encoded response cells.
//!
//! Survey exports store multi-select answers as a stringified list, e.g.
//! `['Tea', 'Biscuits']`. This module understands the literal subset those
//! exports use: quoted strings (with escapes and adjacent concatenation),
//! integers, floats, `True`/`False`/`None`, lists, tuples, sets and dicts,
//! a unary sign on numbers, and parenthesised expressions.
//!
//! Anything else (names, calls, operators, bytes, f-strings, complex
//! numbers, a bare top-level tuple like `1, 500`, or containers nested deeper
//! than [`MAX_NESTING`]) is rejected with a [`LiteralError`]; callers fall
//! back to treating the cell as plain text.
//!
//! Values are stringified the way the exporting system prints them:
//! [`Literal::to_text`] mirrors `str()` and [`Literal::repr`] mirrors
//! `repr()`, so a nested list renders as `['a', 'b']` and a float as `1.0`.

use thiserror::Error;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    None,
    Bool(bool),
    /// Decimal digits with an optional leading `-`.
    Int(String),
    Float(f64),
    Str(String),
    List(Vec<Literal>),
    Tuple(Vec<Literal>),
    Set(Vec<Literal>),
    Dict(Vec<(Literal, Literal)>),
}

/// Why a cell is not a literal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at offset {offset}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

type LitResult<T> = Result<T, LiteralError>;

/// Deepest container nesting accepted. Deeper cells are rejected rather
/// than recursing without bound.
pub const MAX_NESTING: usize = 100;

/// Parse a whole cell as one literal. Surrounding whitespace is ignored.
pub fn parse_literal(text: &str) -> LitResult<Literal> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
        depth: 0,
    };
    parser.skip_ws();
    let value = parser.expr()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.chars.get(self.pos + ahead).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, want: char) -> LitResult<()> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", want, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", want))),
        }
    }

    fn expr(&mut self) -> LitResult<Literal> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let value = self.atom();
        self.depth -= 1;
        value
    }

    fn atom(&mut self) -> LitResult<Literal> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("empty expression")),
            Some('-') | Some('+') => self.signed_number(),
            Some('[') => {
                self.pos += 1;
                let (items, _) = self.sequence(']')?;
                Ok(Literal::List(items))
            }
            Some('(') => self.paren(),
            Some('{') => self.brace(),
            Some('\'') | Some('"') => self.strings(),
            Some(c) if c.is_ascii_digit() => self.number(),
            Some('.') if matches!(self.peek_at(1), Some(d) if d.is_ascii_digit()) => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.word(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
        }
    }

    /// Comma-separated items up to `close`, trailing comma allowed. Returns
    /// the items and whether any comma was seen.
    fn sequence(&mut self, close: char) -> LitResult<(Vec<Literal>, bool)> {
        let mut items = Vec::new();
        let mut saw_comma = false;
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok((items, saw_comma));
            }
            items.push(self.expr()?);
            self.skip_ws();
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    saw_comma = true;
                }
                Some(c) if c == close => {}
                Some(c) => return Err(self.error(format!("unexpected '{}' in sequence", c))),
                None => return Err(self.error(format!("unclosed sequence, expected '{}'", close))),
            }
        }
    }

    fn paren(&mut self) -> LitResult<Literal> {
        self.pos += 1;
        let (mut items, saw_comma) = self.sequence(')')?;
        if items.len() == 1 && !saw_comma {
            Ok(items.remove(0))
        } else {
            Ok(Literal::Tuple(items))
        }
    }

    fn brace(&mut self) -> LitResult<Literal> {
        self.pos += 1;
        self.skip_ws();
        if self.peek() == Some('}') {
            self.pos += 1;
            return Ok(Literal::Dict(Vec::new()));
        }

        let first = self.expr()?;
        self.skip_ws();
        if self.peek() != Some(':') {
            let mut items = vec![first];
            match self.peek() {
                Some(',') => {
                    self.pos += 1;
                    let (rest, _) = self.sequence('}')?;
                    items.extend(rest);
                }
                Some('}') => self.pos += 1,
                _ => return Err(self.error("malformed set")),
            }
            let mut unique: Vec<Literal> = Vec::with_capacity(items.len());
            for item in items {
                if !unique.contains(&item) {
                    unique.push(item);
                }
            }
            return Ok(Literal::Set(unique));
        }

        let mut entries: Vec<(Literal, Literal)> = Vec::new();
        let mut key = first;
        loop {
            self.expect(':')?;
            let value = self.expr()?;
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(slot) => slot.1 = value,
                None => entries.push((key, value)),
            }
            self.skip_ws();
            match self.bump() {
                Some('}') => return Ok(Literal::Dict(entries)),
                Some(',') => {
                    self.skip_ws();
                    if self.peek() == Some('}') {
                        self.pos += 1;
                        return Ok(Literal::Dict(entries));
                    }
                    key = self.expr()?;
                }
                _ => return Err(self.error("malformed dict")),
            }
        }
    }

    fn word(&mut self) -> LitResult<Literal> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();

        if matches!(self.peek(), Some('\'') | Some('"')) {
            return match word.to_ascii_lowercase().as_str() {
                "u" => self.strings(),
                "r" => self.strings_with(true),
                _ => {
                    self.pos = start;
                    Err(self.error(format!("unsupported string prefix '{}'", word)))
                }
            };
        }

        match word.as_str() {
            "None" => Ok(Literal::None),
            "True" => Ok(Literal::Bool(true)),
            "False" => Ok(Literal::Bool(false)),
            _ => {
                self.pos = start;
                Err(self.error(format!("name '{}' is not a literal", word)))
            }
        }
    }

    fn strings(&mut self) -> LitResult<Literal> {
        self.strings_with(false)
    }

    /// One or more adjacent string literals, concatenated.
    fn strings_with(&mut self, raw: bool) -> LitResult<Literal> {
        let mut out = self.string_body(raw)?;
        loop {
            let save = self.pos;
            self.skip_ws();
            match self.peek() {
                Some('\'') | Some('"') => out.push_str(&self.string_body(false)?),
                Some('r') | Some('R') | Some('u') | Some('U')
                    if matches!(self.peek_at(1), Some('\'') | Some('"')) =>
                {
                    let is_raw = matches!(self.bump(), Some('r') | Some('R'));
                    out.push_str(&self.string_body(is_raw)?);
                }
                _ => {
                    self.pos = save;
                    return Ok(Literal::Str(out));
                }
            }
        }
    }

    fn string_body(&mut self, raw: bool) -> LitResult<String> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected string")),
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.pos += 2;
        }

        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.pos += 2;
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error("newline in single-quoted string"));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let esc = self
                .bump()
                .ok_or_else(|| self.error("unterminated escape"))?;
            if raw {
                out.push('\\');
                out.push(esc);
                continue;
            }
            match esc {
                '\n' => {}
                '\\' => out.push('\\'),
                '\'' => out.push('\''),
                '"' => out.push('"'),
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'a' => out.push('\u{07}'),
                'b' => out.push('\u{08}'),
                'f' => out.push('\u{0C}'),
                'v' => out.push('\u{0B}'),
                '0'..='7' => {
                    let mut value = esc.to_digit(8).unwrap_or(0);
                    for _ in 0..2 {
                        match self.peek().and_then(|d| d.to_digit(8)) {
                            Some(d) => {
                                value = value * 8 + d;
                                self.pos += 1;
                            }
                            None => break,
                        }
                    }
                    out.push(self.code_point(value)?);
                }
                'x' => out.push(self.hex_escape(2)?),
                'u' => out.push(self.hex_escape(4)?),
                'U' => out.push(self.hex_escape(8)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_escape(&mut self, digits: usize) -> LitResult<char> {
        let mut value = 0u32;
        for _ in 0..digits {
            let d = self
                .bump()
                .and_then(|c| c.to_digit(16))
                .ok_or_else(|| self.error("truncated hex escape"))?;
            value = value * 16 + d;
        }
        self.code_point(value)
    }

    fn code_point(&self, value: u32) -> LitResult<char> {
        char::from_u32(value).ok_or_else(|| self.error("invalid code point"))
    }

    fn signed_number(&mut self) -> LitResult<Literal> {
        let negative = self.bump() == Some('-');
        self.skip_ws();
        match self.peek() {
            Some(c) if c.is_ascii_digit() || c == '.' => {}
            _ => return Err(self.error("sign must be followed by a number")),
        }
        match self.number()? {
            Literal::Int(digits) if negative && digits != "0" => Ok(Literal::Int(format!("-{}", digits))),
            Literal::Float(f) if negative => Ok(Literal::Float(-f)),
            other => Ok(other),
        }
    }

    fn number(&mut self) -> LitResult<Literal> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            let after_exponent = matches!(c, '+' | '-')
                && self.pos > start
                && matches!(self.chars[self.pos - 1], 'e' | 'E')
                && !self.token_is_radix(start);
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || after_exponent {
                self.pos += 1;
            } else {
                break;
            }
        }
        let token: String = self.chars[start..self.pos].iter().collect();
        let lower = token.to_ascii_lowercase();
        let bad = || LiteralError {
            offset: start,
            message: format!("invalid number '{}'", token),
        };

        if lower.ends_with('j') {
            return Err(LiteralError {
                offset: start,
                message: "complex numbers are not supported".into(),
            });
        }
        if lower.contains("__") || lower.ends_with('_') {
            return Err(bad());
        }
        let cleaned = lower.replace('_', "");

        for (prefix, radix) in [("0x", 16), ("0o", 8), ("0b", 2)] {
            if let Some(body) = cleaned.strip_prefix(prefix) {
                return u128::from_str_radix(body, radix)
                    .map(|v| Literal::Int(v.to_string()))
                    .map_err(|_| bad());
            }
        }

        if cleaned.contains('.') || cleaned.contains('e') {
            if !cleaned
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | '+' | '-'))
            {
                return Err(bad());
            }
            return cleaned
                .parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| bad());
        }

        if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
            return Err(bad());
        }
        let digits = cleaned.trim_start_matches('0');
        if digits.is_empty() {
            return Ok(Literal::Int("0".into()));
        }
        if digits.len() != cleaned.len() {
            // Leading zeros are only legal on zero itself.
            return Err(bad());
        }
        Ok(Literal::Int(digits.to_string()))
    }

    fn token_is_radix(&self, start: usize) -> bool {
        self.chars.get(start) == Some(&'0')
            && matches!(self.chars.get(start + 1), Some('x' | 'X' | 'o' | 'O' | 'b' | 'B'))
    }
}

// =============================================================================
// Stringification
// =============================================================================

impl Literal {
    /// Plain text form: strings are returned as-is, everything else as its
    /// repr.
    pub fn to_text(&self) -> String {
        match self {
            Literal::Str(s) => s.clone(),
            other => other.repr(),
        }
    }

    /// Source-like representation.
    pub fn repr(&self) -> String {
        match self {
            Literal::None => "None".into(),
            Literal::Bool(true) => "True".into(),
            Literal::Bool(false) => "False".into(),
            Literal::Int(digits) => digits.clone(),
            Literal::Float(f) => float_repr(*f),
            Literal::Str(s) => str_repr(s),
            Literal::List(items) => format!("[{}]", join_reprs(items)),
            Literal::Tuple(items) if items.len() == 1 => format!("({},)", items[0].repr()),
            Literal::Tuple(items) => format!("({})", join_reprs(items)),
            Literal::Set(items) => format!("{{{}}}", join_reprs(items)),
            Literal::Dict(entries) => {
                let body: Vec<String> = entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k.repr(), v.repr()))
                    .collect();
                format!("{{{}}}", body.join(", "))
            }
        }
    }
}

fn join_reprs(items: &[Literal]) -> String {
    items.iter().map(Literal::repr).collect::<Vec<_>>().join(", ")
}

/// Shortest round-trip float text: fixed notation for decimal exponents in
/// `-4..16`, scientific with a signed two-digit exponent otherwise.
pub fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".into();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf".into() } else { "-inf".into() };
    }

    let sci = format!("{:e}", f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };
    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();

    let body = if (-4..16).contains(&exp) {
        if exp >= 0 {
            let int_len = exp as usize + 1;
            if digits.len() <= int_len {
                format!("{}{}.0", digits, "0".repeat(int_len - digits.len()))
            } else {
                format!("{}.{}", &digits[..int_len], &digits[int_len..])
            }
        } else {
            format!("0.{}{}", "0".repeat((-exp - 1) as usize), digits)
        }
    } else {
        let lead = &digits[..1];
        let rest = &digits[1..];
        let mantissa = if rest.is_empty() {
            lead.to_string()
        } else {
            format!("{}.{}", lead, rest)
        };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, exp_sign, exp.abs())
    };
    format!("{}{}", sign, body)
}

/// Quoted string form, preferring single quotes.
pub fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if is_printable(c) => out.push(c),
            c => {
                let code = c as u32;
                if code < 0x100 {
                    out.push_str(&format!("\\x{:02x}", code));
                } else if code < 0x10000 {
                    out.push_str(&format!("\\u{:04x}", code));
                } else {
                    out.push_str(&format!("\\U{:08x}", code));
                }
            }
        }
    }
    out.push(quote);
    out
}

/// Code points shown as-is inside a quoted string. Controls, format
/// characters, line and paragraph separators, spaces other than U+0020 and
/// private-use characters are escaped.
fn is_printable(c: char) -> bool {
    const HIDDEN: &[(u32, u32)] = &[
        (0x00A0, 0x00A0),
        (0x00AD, 0x00AD),
        (0x0600, 0x0605),
        (0x061C, 0x061C),
        (0x06DD, 0x06DD),
        (0x070F, 0x070F),
        (0x0890, 0x0891),
        (0x08E2, 0x08E2),
        (0x1680, 0x1680),
        (0x180E, 0x180E),
        (0x2000, 0x200F),
        (0x2028, 0x202F),
        (0x205F, 0x2064),
        (0x2066, 0x206F),
        (0x3000, 0x3000),
        (0xE000, 0xF8FF),
        (0xFEFF, 0xFEFF),
        (0xFFF9, 0xFFFB),
        (0x110BD, 0x110BD),
        (0x110CD, 0x110CD),
        (0x13430, 0x1343F),
        (0x1BCA0, 0x1BCA3),
        (0x1D173, 0x1D17A),
        (0xE0001, 0xE0001),
        (0xE0020, 0xE007F),
        (0xF0000, 0x10FFFF),
    ];
    if c.is_control() {
        return false;
    }
    let code = c as u32;
    !HIDDEN.iter().any(|&(lo, hi)| (lo..=hi).contains(&code))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(items: &[&str]) -> Literal {
        Literal::List(items.iter().map(|s| Literal::Str(s.to_string())).collect())
    }

    #[test]
    fn test_string_list() {
        assert_eq!(parse_literal("['a', 'b']").unwrap(), strs(&["a", "b"]));
        assert_eq!(parse_literal(r#"["x","y",]"#).unwrap(), strs(&["x", "y"]));
        assert_eq!(parse_literal("  []  ").unwrap(), Literal::List(vec![]));
    }

    #[test]
    fn test_mixed_list() {
        let value = parse_literal("[1, -2.5, None, True, 'ok']").unwrap();
        assert_eq!(
            value,
            Literal::List(vec![
                Literal::Int("1".into()),
                Literal::Float(-2.5),
                Literal::None,
                Literal::Bool(true),
                Literal::Str("ok".into()),
            ])
        );
    }

    #[test]
    fn test_nested_list_repr() {
        let value = parse_literal("[['a', \"b'c\"], (1,), {'k': 2}]").unwrap();
        let Literal::List(items) = value else { panic!("not a list") };
        assert_eq!(items[0].to_text(), r#"['a', "b'c"]"#);
        assert_eq!(items[1].to_text(), "(1,)");
        assert_eq!(items[2].to_text(), "{'k': 2}");
    }

    #[test]
    fn test_scalars() {
        assert_eq!(parse_literal("'abc'").unwrap(), Literal::Str("abc".into()));
        assert_eq!(parse_literal("42").unwrap().to_text(), "42");
        assert_eq!(parse_literal("1_000").unwrap().to_text(), "1000");
        assert_eq!(parse_literal("0x1F").unwrap().to_text(), "31");
        assert_eq!(parse_literal("5.0").unwrap().to_text(), "5.0");
        assert_eq!(parse_literal("(7)").unwrap().to_text(), "7");
        assert_eq!(parse_literal("None").unwrap().to_text(), "None");
    }

    #[test]
    fn test_escapes_and_concatenation() {
        assert_eq!(
            parse_literal(r"'tab\there' 'x'").unwrap(),
            Literal::Str("tab\there".to_string() + "x")
        );
        assert_eq!(parse_literal(r"'\x41é'").unwrap(), Literal::Str("Aé".into()));
        assert_eq!(parse_literal(r"r'\d+'").unwrap(), Literal::Str(r"\d+".into()));
        assert_eq!(parse_literal("'''it's'''").unwrap(), Literal::Str("it's".into()));
    }

    #[test]
    fn test_rejections() {
        for text in [
            "yes",
            "[oops",
            "['a' 'b'",
            "007",
            "1+2j",
            "-'a'",
            "b'raw'",
            "f'{x}'",
            "[1, 2] extra",
            "",
            "{1: }",
            "1, 500",
            "'a', 'b'",
        ] {
            assert!(parse_literal(text).is_err(), "{} should be rejected", text);
        }
    }

    #[test]
    fn test_float_repr() {
        assert_eq!(float_repr(1.0), "1.0");
        assert_eq!(float_repr(0.1), "0.1");
        assert_eq!(float_repr(-0.0), "-0.0");
        assert_eq!(float_repr(1234.5), "1234.5");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(1.5e300), "1.5e+300");
        assert_eq!(float_repr(123456789012345.0), "123456789012345.0");
    }

    #[test]
    fn test_str_repr_quotes() {
        assert_eq!(str_repr("plain"), "'plain'");
        assert_eq!(str_repr("it's"), "\"it's\"");
        assert_eq!(str_repr("both ' \""), "'both \\' \"'");
        assert_eq!(str_repr("a\nb"), "'a\\nb'");
    }

    #[test]
    fn test_str_repr_escapes_hidden_characters() {
        assert_eq!(str_repr("a\u{7f}b"), "'a\\x7fb'");
        assert_eq!(str_repr("\u{85}"), "'\\x85'");
        assert_eq!(str_repr("\u{a0}"), "'\\xa0'");
        assert_eq!(str_repr("zero\u{200b}width"), "'zero\\u200bwidth'");
        assert_eq!(str_repr("\u{feff}"), "'\\ufeff'");
        assert_eq!(str_repr("\u{e0001}"), "'\\U000e0001'");
        assert_eq!(str_repr("café 日本 ✓"), "'café 日本 ✓'");

        let value = parse_literal("[['x\\u200b']]").unwrap();
        let Literal::List(items) = value else { panic!("not a list") };
        assert_eq!(items[0].to_text(), "['x\\u200b']");
    }

    #[test]
    fn test_nesting_limit() {
        let deep = |n: usize| format!("{}{}", "[".repeat(n), "]".repeat(n));
        assert!(parse_literal(&deep(MAX_NESTING)).is_ok());

        let err = parse_literal(&deep(MAX_NESTING + 1)).unwrap_err();
        assert_eq!(err.message, "nesting too deep");
        assert!(parse_literal(&"(".repeat(50_000)).is_err());
        assert!(parse_literal(&"{".repeat(50_000)).is_err());
    }

    #[test]
    fn test_set_and_dict() {
        assert_eq!(parse_literal("{1, 1, 2}").unwrap().repr(), "{1, 2}");
        assert_eq!(parse_literal("{'a': 1, 'a': 2}").unwrap().repr(), "{'a': 2}");
        assert_eq!(parse_literal("{}").unwrap().repr(), "{}");
    }
}
