//! Mask rule - regex replacement over the value text.

use super::{Row, Rule};
use crate::error::RuleError;
use once_cell::sync::Lazy;
use regex::bytes::Regex;

/// Matches every non-whitespace character, or a single byte that is not
/// part of valid UTF-8 (binary data, latin1 text)
pub const DEFAULT_PATTERN: &str = r"[^\s]|(?-u:[\x80-\xFF])";
pub const DEFAULT_SURROGATE: &str = "*";

static DEFAULT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_PATTERN).unwrap());

/// Rule that replaces each match of `pattern` with `surrogate`.
///
/// The value keeps its datum type: a hex literal stays a hex literal, a
/// string stays a string. NULL and raw expressions are left alone.
#[derive(Debug, Clone)]
pub struct MaskRule {
    columns: Vec<String>,
    pattern: Regex,
    surrogate: Vec<u8>,
}

impl MaskRule {
    pub fn new(
        columns: Vec<String>,
        pattern: Option<&str>,
        surrogate: Option<&str>,
    ) -> Result<Self, regex::Error> {
        let pattern = match pattern {
            Some(p) => Regex::new(p)?,
            None => DEFAULT_REGEX.clone(),
        };
        Ok(Self {
            columns,
            pattern,
            surrogate: surrogate.unwrap_or(DEFAULT_SURROGATE).as_bytes().to_vec(),
        })
    }
}

impl Rule for MaskRule {
    fn name(&self) -> &'static str {
        "mask"
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn apply(&self, row: &mut Row<'_>) -> Result<usize, RuleError> {
        let mut changed = 0;
        for name in &self.columns {
            let Some((_, value)) = row.value_mut(name) else {
                continue;
            };
            let Some(text) = value.text() else {
                continue;
            };
            // NoExpand: the surrogate is literal text, not a `$1` template
            let masked = self
                .pattern
                .replace_all(&text, regex::bytes::NoExpand(&self.surrogate));
            if masked.as_ref() != text.as_ref() {
                let masked = masked.into_owned();
                *value = value.with_text(masked);
                changed += 1;
            }
        }
        Ok(changed)
    }
}
