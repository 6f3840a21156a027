//! Line classification for extraction output.
//!
//! The extractor emits one statement per line. INSERT lines are handed to
//! [`mysql_insert::InsertStatement`] for rewriting; every other line is passed
//! through verbatim.

pub mod mysql_insert;

pub use mysql_insert::{InsertStatement, SqlValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementType {
    Insert,
    /// `USE <db>;`
    Use,
    /// `--` or `/* ... */` comment lines
    Comment,
    Blank,
    Other,
}

/// Classify one line of extraction output by its leading keyword
pub fn classify(line: &[u8]) -> StatementType {
    let line = trim_ascii_start(line);

    if line.is_empty() {
        return StatementType::Blank;
    }
    if line.starts_with(b"--") || line.starts_with(b"/*") || line.starts_with(b"#") {
        return StatementType::Comment;
    }
    if starts_with_keyword(line, b"INSERT") {
        return StatementType::Insert;
    }
    if starts_with_keyword(line, b"USE") {
        return StatementType::Use;
    }
    StatementType::Other
}

/// Whether the line is an INSERT statement
#[inline]
pub fn is_insert(line: &[u8]) -> bool {
    classify(line) == StatementType::Insert
}

/// Case-insensitive keyword match at the start of `data`, followed by a
/// word boundary
pub(crate) fn starts_with_keyword(data: &[u8], keyword: &[u8]) -> bool {
    data.len() >= keyword.len()
        && data[..keyword.len()].eq_ignore_ascii_case(keyword)
        && data
            .get(keyword.len())
            .map_or(true, |&b| !(b.is_ascii_alphanumeric() || b == b'_'))
}

#[inline]
pub(crate) fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !is_whitespace(b))
        .unwrap_or(data.len());
    &data[start..]
}

#[inline]
pub(crate) fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_insert() {
        assert_eq!(classify(b"INSERT INTO `t` VALUES (1);"), StatementType::Insert);
        assert_eq!(classify(b"  insert into t values (1);"), StatementType::Insert);
        assert!(is_insert(b"INSERT IGNORE INTO t VALUES (1);"));
    }

    #[test]
    fn test_classify_other_lines() {
        assert_eq!(classify(b"USE `shop`;"), StatementType::Use);
        assert_eq!(classify(b"-- `users`"), StatementType::Comment);
        assert_eq!(classify(b"/*!40101 SET NAMES utf8 */;"), StatementType::Comment);
        assert_eq!(classify(b""), StatementType::Blank);
        assert_eq!(classify(b"INSERTED_ROWS = 1"), StatementType::Other);
        assert_eq!(classify(b"USERS"), StatementType::Other);
    }
}
