//! MySQL INSERT statement parser and serializer.
//!
//! Parses `INSERT INTO t [(cols)] VALUES (...)[, (...)]` into value tuples
//! that can be mutated in place, then re-serializes the statement with
//! mysqldump-compatible escaping. Everything outside the tuples (modifiers,
//! column list, `ON DUPLICATE KEY` tails) is carried through as raw bytes.

use super::{is_whitespace, starts_with_keyword};
use crate::error::ParseError;
use std::borrow::Cow;
use std::fmt::Write as _;

/// A single value inside a row tuple
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    BigInteger(i128),
    /// Non-integer numeric literal, kept as written
    Number(String),
    /// Unescaped contents of a quoted string
    String(Vec<u8>),
    /// Decoded bytes of a `0x...` / `X'...'` literal
    Hex(Vec<u8>),
    /// `b'0101'` / `0b0101` bit literal, kept as written
    Bits(String),
    /// Anything else (function calls, charset introducers), kept as written
    Other(String),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Text form of the value, for text-oriented rules.
    ///
    /// `None` for NULL and for raw expressions that have no text form.
    pub fn text(&self) -> Option<Cow<'_, [u8]>> {
        match self {
            SqlValue::Integer(n) => Some(Cow::Owned(n.to_string().into_bytes())),
            SqlValue::BigInteger(n) => Some(Cow::Owned(n.to_string().into_bytes())),
            SqlValue::Number(n) => Some(Cow::Borrowed(n.as_bytes())),
            SqlValue::String(b) | SqlValue::Hex(b) => Some(Cow::Borrowed(b)),
            SqlValue::Null | SqlValue::Bits(_) | SqlValue::Other(_) => None,
        }
    }

    /// Build a value of the same datum type from new text.
    ///
    /// Numbers that no longer parse as numbers become strings.
    pub fn with_text(&self, text: Vec<u8>) -> SqlValue {
        match self {
            SqlValue::Hex(_) => SqlValue::Hex(text),
            SqlValue::Integer(_) | SqlValue::BigInteger(_) | SqlValue::Number(_) => {
                match String::from_utf8(text) {
                    Ok(s) => parse_number(&s).unwrap_or(SqlValue::String(s.into_bytes())),
                    Err(e) => SqlValue::String(e.into_bytes()),
                }
            }
            _ => SqlValue::String(text),
        }
    }

    /// Append the SQL form of the value
    pub fn write_sql(&self, out: &mut Vec<u8>) {
        match self {
            SqlValue::Null => out.extend_from_slice(b"NULL"),
            SqlValue::Integer(n) => out.extend_from_slice(n.to_string().as_bytes()),
            SqlValue::BigInteger(n) => out.extend_from_slice(n.to_string().as_bytes()),
            SqlValue::Number(raw) | SqlValue::Bits(raw) | SqlValue::Other(raw) => {
                out.extend_from_slice(raw.as_bytes())
            }
            SqlValue::String(bytes) => escape_string(bytes, out),
            SqlValue::Hex(bytes) if bytes.is_empty() => out.extend_from_slice(b"''"),
            SqlValue::Hex(bytes) => {
                out.extend_from_slice(b"0x");
                out.extend_from_slice(hex::encode_upper(bytes).as_bytes());
            }
        }
    }
}

/// Write a quoted string the way mysqldump does
fn escape_string(bytes: &[u8], out: &mut Vec<u8>) {
    out.reserve(bytes.len() + 2);
    out.push(b'\'');
    for &b in bytes {
        match b {
            0 => out.extend_from_slice(b"\\0"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'"' => out.extend_from_slice(b"\\\""),
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            0x1a => out.extend_from_slice(b"\\Z"),
            _ => out.push(b),
        }
    }
    out.push(b'\'');
}

fn parse_number(raw: &str) -> Option<SqlValue> {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.as_bytes()[0].is_ascii_digit() {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(SqlValue::Integer(n));
    }
    if let Ok(n) = raw.parse::<i128>() {
        return Some(SqlValue::BigInteger(n));
    }
    raw.parse::<f64>().ok().map(|_| SqlValue::Number(raw.to_string()))
}

/// A parsed INSERT statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement {
    /// `INSERT [modifiers] INTO ` up to the table identifier
    prefix: Vec<u8>,
    /// Unquoted table name
    table: String,
    /// Everything between the table identifier and the first tuple
    middle: Vec<u8>,
    /// Explicit column list, when present
    columns: Option<Vec<String>>,
    /// Row tuples
    pub rows: Vec<Vec<SqlValue>>,
    /// Anything after the last tuple, without the terminating `;`
    trailer: Vec<u8>,
}

impl InsertStatement {
    /// Parse one INSERT statement (trailing `;` and whitespace optional)
    pub fn parse(stmt: &[u8]) -> Result<Self, ParseError> {
        InsertParser::new(stmt).parse()
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Point the statement at a different table
    pub fn set_table(&mut self, name: impl Into<String>) {
        self.table = name.into();
    }

    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Split borrow of the column list and the tuples
    pub fn parts_mut(&mut self) -> (Option<&[String]>, &mut [Vec<SqlValue>]) {
        (self.columns.as_deref(), &mut self.rows)
    }

    /// Serialize back to SQL, without the terminator
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.prefix.len() + self.table.len() + self.middle.len() + self.rows.len() * 32,
        );
        out.extend_from_slice(&self.prefix);
        let mut table = String::with_capacity(self.table.len() + 2);
        let _ = write!(table, "`{}`", self.table.replace('`', "``"));
        out.extend_from_slice(table.as_bytes());
        out.extend_from_slice(&self.middle);

        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                out.push(b',');
            }
            out.push(b'(');
            for (j, value) in row.iter().enumerate() {
                if j > 0 {
                    out.push(b',');
                }
                value.write_sql(&mut out);
            }
            out.push(b')');
        }

        out.extend_from_slice(&self.trailer);
        out
    }
}

const MODIFIERS: &[&[u8]] = &[b"LOW_PRIORITY", b"DELAYED", b"HIGH_PRIORITY", b"IGNORE"];

/// Parser for MySQL INSERT statements
struct InsertParser<'a> {
    stmt: &'a [u8],
    pos: usize,
}

impl<'a> InsertParser<'a> {
    fn new(stmt: &'a [u8]) -> Self {
        Self { stmt, pos: 0 }
    }

    fn parse(mut self) -> Result<InsertStatement, ParseError> {
        self.skip_whitespace();
        let start = self.pos;

        if !starts_with_keyword(self.rest(), b"INSERT") {
            return Err(ParseError::NotInsert);
        }
        self.pos += b"INSERT".len();

        // Modifiers, then INTO
        loop {
            self.skip_whitespace();
            if let Some(m) = MODIFIERS
                .iter()
                .find(|m| starts_with_keyword(self.rest(), m))
            {
                self.pos += m.len();
            } else if starts_with_keyword(self.rest(), b"INTO") {
                self.pos += b"INTO".len();
                break;
            } else {
                return Err(self.unexpected("INTO"));
            }
        }

        self.skip_whitespace();
        let prefix = self.stmt[start..self.pos].to_vec();
        let table = self.parse_identifier()?;
        let middle_start = self.pos;

        self.skip_whitespace();
        let columns = if self.peek() == Some(b'(') {
            Some(self.parse_column_list()?)
        } else {
            None
        };

        self.skip_whitespace();
        if starts_with_keyword(self.rest(), b"VALUES") {
            self.pos += b"VALUES".len();
        } else if starts_with_keyword(self.rest(), b"VALUE") {
            self.pos += b"VALUE".len();
        } else {
            return Err(ParseError::MissingValues);
        }
        self.skip_whitespace();
        let middle = self.stmt[middle_start..self.pos].to_vec();

        let mut rows = Vec::new();
        loop {
            self.skip_whitespace();
            rows.push(self.parse_row()?);
            self.skip_whitespace();
            if self.peek() == Some(b',') {
                self.pos += 1;
            } else {
                break;
            }
        }

        let mut end = self.stmt.len();
        while end > self.pos && is_whitespace(self.stmt[end - 1]) {
            end -= 1;
        }
        if end > self.pos && self.stmt[end - 1] == b';' {
            end -= 1;
        }
        let trailer = self.stmt[self.pos..end].to_vec();

        Ok(InsertStatement {
            prefix,
            table,
            middle,
            columns,
            rows,
            trailer,
        })
    }

    /// Parse a single row "(val1, val2, ...)"
    fn parse_row(&mut self) -> Result<Vec<SqlValue>, ParseError> {
        self.expect(b'(', "'('")?;
        let mut values = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(values);
        }

        loop {
            self.skip_whitespace();
            values.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(values);
                }
                Some(_) => return Err(self.unexpected("',' or ')'")),
                None => return Err(ParseError::UnexpectedEnd { expected: "')'" }),
            }
        }
    }

    /// Parse a single value (string, number, NULL, etc.)
    fn parse_value(&mut self) -> Result<SqlValue, ParseError> {
        let Some(b) = self.peek() else {
            return Err(ParseError::UnexpectedEnd { expected: "value" });
        };

        if b == b'\'' || b == b'"' {
            return Ok(SqlValue::String(self.parse_quoted()?));
        }

        let rest = self.rest();
        if starts_with_keyword(rest, b"NULL") {
            self.pos += 4;
            return Ok(SqlValue::Null);
        }

        // Hex literal 0x... or X'...'
        if rest.len() > 2 && rest[0] == b'0' && (rest[1] == b'x' || rest[1] == b'X') {
            let start = self.pos;
            self.pos += 2;
            let digits = self.take_while(|c| c.is_ascii_hexdigit());
            if self.at_delimiter() {
                return self.decode_hex(digits, start);
            }
            self.pos = start;
        }
        if rest.len() > 1 && (rest[0] == b'x' || rest[0] == b'X') && rest[1] == b'\'' {
            let start = self.pos;
            self.pos += 1;
            let digits = self.parse_quoted()?;
            return self.decode_hex(&digits, start);
        }

        // Bit literal b'...' or 0b...
        if (rest.len() > 1 && (rest[0] == b'b' || rest[0] == b'B') && rest[1] == b'\'')
            || (rest.len() > 2 && rest[0] == b'0' && rest[1] == b'b')
        {
            let raw = self.scan_raw()?;
            return Ok(SqlValue::Bits(raw));
        }

        if b == b'-' || b == b'+' || b == b'.' || b.is_ascii_digit() {
            let raw = self.scan_raw()?;
            return Ok(parse_number(&raw).unwrap_or(SqlValue::Other(raw)));
        }

        Ok(SqlValue::Other(self.scan_raw()?))
    }

    fn decode_hex(&self, digits: &[u8], offset: usize) -> Result<SqlValue, ParseError> {
        let mut text = String::with_capacity(digits.len() + 1);
        if digits.len() % 2 == 1 {
            text.push('0');
        }
        text.push_str(&String::from_utf8_lossy(digits));
        hex::decode(&text)
            .map(SqlValue::Hex)
            .map_err(|_| ParseError::Unexpected {
                found: char::from(self.stmt[offset]),
                offset,
                expected: "hex digits",
            })
    }

    /// Parse a quoted string, returning its unescaped contents
    fn parse_quoted(&mut self) -> Result<Vec<u8>, ParseError> {
        let start = self.pos;
        let quote = self.stmt[self.pos];
        self.pos += 1;

        let mut value = Vec::new();
        while self.pos < self.stmt.len() {
            let b = self.stmt[self.pos];
            if b == b'\\' {
                let Some(&next) = self.stmt.get(self.pos + 1) else {
                    break;
                };
                // Handle MySQL escape sequences
                match next {
                    b'0' => value.push(0),
                    b'b' => value.push(0x08),
                    b'n' => value.push(b'\n'),
                    b'r' => value.push(b'\r'),
                    b't' => value.push(b'\t'),
                    b'Z' => value.push(0x1a),
                    b'%' | b'_' => {
                        value.push(b'\\');
                        value.push(next);
                    }
                    _ => value.push(next),
                }
                self.pos += 2;
            } else if b == quote {
                if self.stmt.get(self.pos + 1) == Some(&quote) {
                    value.push(quote);
                    self.pos += 2;
                } else {
                    self.pos += 1;
                    return Ok(value);
                }
            } else {
                value.push(b);
                self.pos += 1;
            }
        }

        Err(ParseError::Unterminated {
            what: "string literal",
            offset: start,
        })
    }

    /// Raw expression text up to the next top-level ',' or ')'
    fn scan_raw(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let mut depth = 0usize;

        while let Some(b) = self.peek() {
            match b {
                b'\'' | b'"' => {
                    self.parse_quoted()?;
                    continue;
                }
                b'(' => depth += 1,
                b')' if depth == 0 => break,
                b')' => depth -= 1,
                b',' if depth == 0 => break,
                _ => {}
            }
            self.pos += 1;
        }

        if depth > 0 {
            return Err(ParseError::Unterminated {
                what: "expression",
                offset: start,
            });
        }

        let raw = String::from_utf8_lossy(&self.stmt[start..self.pos]);
        Ok(raw.trim_end().to_string())
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, ParseError> {
        self.expect(b'(', "'('")?;
        let mut columns = Vec::new();
        loop {
            self.skip_whitespace();
            columns.push(self.parse_identifier()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(columns);
                }
                Some(_) => return Err(self.unexpected("',' or ')'")),
                None => return Err(ParseError::UnexpectedEnd { expected: "')'" }),
            }
        }
    }

    /// Backtick-quoted or bare identifier
    fn parse_identifier(&mut self) -> Result<String, ParseError> {
        match self.peek() {
            Some(b'`') => {
                let start = self.pos;
                self.pos += 1;
                let mut name = Vec::new();
                while let Some(b) = self.peek() {
                    self.pos += 1;
                    if b == b'`' {
                        if self.peek() == Some(b'`') {
                            name.push(b'`');
                            self.pos += 1;
                        } else {
                            return Ok(String::from_utf8_lossy(&name).into_owned());
                        }
                    } else {
                        name.push(b);
                    }
                }
                Err(ParseError::Unterminated {
                    what: "identifier",
                    offset: start,
                })
            }
            Some(_) => {
                let name = self.take_while(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80);
                if name.is_empty() {
                    return Err(self.unexpected("identifier"));
                }
                Ok(String::from_utf8_lossy(name).into_owned())
            }
            None => Err(ParseError::UnexpectedEnd {
                expected: "identifier",
            }),
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        let stmt = self.stmt;
        &stmt[start..self.pos]
    }

    fn at_delimiter(&self) -> bool {
        let mut i = self.pos;
        while i < self.stmt.len() && is_whitespace(self.stmt[i]) {
            i += 1;
        }
        matches!(self.stmt.get(i), None | Some(b',') | Some(b')'))
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), ParseError> {
        match self.peek() {
            Some(b) if b == byte => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(self.unexpected(expected)),
            None => Err(ParseError::UnexpectedEnd { expected }),
        }
    }

    fn unexpected(&self, expected: &'static str) -> ParseError {
        match self.peek() {
            Some(b) => ParseError::Unexpected {
                found: char::from(b),
                offset: self.pos,
                expected,
            },
            None => ParseError::UnexpectedEnd { expected },
        }
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.stmt.get(self.pos).copied()
    }

    #[inline]
    fn rest(&self) -> &'a [u8] {
        let stmt = self.stmt;
        &stmt[self.pos.min(stmt.len())..]
    }

    /// Skip whitespace and newlines
    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(is_whitespace) {
            self.pos += 1;
        }
    }
}
