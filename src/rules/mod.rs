//! Per-column value rules applied to every extracted row.
//!
//! Each rule type implements [`Rule`]. Rules are built once per table from
//! their declarations by [`configure`], which is the only place that knows
//! the set of rule types; the dump pipeline only ever sees `dyn Rule`.
//!
//! - `mask`: replace every regex match in the value text with a surrogate
//! - `redact`: replace the value with the zero value of its column kind

mod mask;
mod redact;

pub use mask::MaskRule;
pub use redact::RedactRule;

use crate::config::RuleDecl;
use crate::error::{ConfigError, RuleError};
use crate::parser::SqlValue;
use crate::schema::{Column, Table};
use std::fmt;

/// A configured value transform
pub trait Rule: Send + Sync + fmt::Debug {
    /// Rule type name, as used in configuration
    fn name(&self) -> &'static str;

    /// Columns this rule applies to
    fn columns(&self) -> &[String];

    /// Apply the rule to one row in place, returning the number of values changed
    fn apply(&self, row: &mut Row<'_>) -> Result<usize, RuleError>;
}

/// One value tuple of an INSERT statement, paired with its table
pub struct Row<'a> {
    table: &'a Table,
    /// Explicit column list of the statement, if any
    columns: Option<&'a [String]>,
    values: &'a mut [SqlValue],
}

impl<'a> Row<'a> {
    pub fn new(table: &'a Table, values: &'a mut [SqlValue]) -> Self {
        Self {
            table,
            columns: None,
            values,
        }
    }

    /// Locate values by name in an explicit column list instead of by position
    pub fn with_columns(mut self, columns: Option<&'a [String]>) -> Self {
        self.columns = columns;
        self
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve a column by name and return it with its value.
    ///
    /// `None` when the table has no such column or the tuple has no value
    /// for it.
    pub fn value_mut(&mut self, name: &str) -> Option<(&'a Column, &mut SqlValue)> {
        let table = self.table;
        let column = table.get_column(name)?;
        let index = match self.columns {
            Some(list) => list
                .iter()
                .position(|c| c.eq_ignore_ascii_case(&column.name))?,
            None => column.value_index(),
        };
        self.values.get_mut(index).map(|value| (column, value))
    }
}

/// Build a rule from its declaration
pub fn configure(table: &str, decl: &RuleDecl) -> Result<Box<dyn Rule>, ConfigError> {
    let invalid = |message: String| ConfigError::InvalidRule {
        table: table.to_string(),
        rule_type: decl.rule_type.clone(),
        message,
    };

    if decl.columns.is_empty() {
        return Err(invalid("no columns given".to_string()));
    }

    match decl.rule_type.to_ascii_lowercase().as_str() {
        "mask" => {
            let rule = MaskRule::new(
                decl.columns.clone(),
                decl.pattern.as_deref(),
                decl.surrogate.as_deref(),
            )
            .map_err(|e| invalid(format!("invalid pattern: {}", e)))?;
            Ok(Box::new(rule))
        }
        "redact" => Ok(Box::new(RedactRule::new(decl.columns.clone()))),
        _ => Err(ConfigError::UnrecognizedRuleType {
            table: table.to_string(),
            rule_type: decl.rule_type.clone(),
        }),
    }
}

/// Apply every rule in order; the first failure aborts the row
pub fn apply_all(rules: &[Box<dyn Rule>], row: &mut Row<'_>) -> Result<usize, RuleError> {
    let mut changed = 0;
    for rule in rules {
        changed += rule.apply(row)?;
    }
    Ok(changed)
}
