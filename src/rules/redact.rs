//! Redact rule - replace values with the zero value of their column kind.

use super::{Row, Rule};
use crate::error::RuleError;
use crate::parser::SqlValue;
use crate::schema::ColumnKind;

#[derive(Debug, Clone)]
pub struct RedactRule {
    columns: Vec<String>,
}

impl RedactRule {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }
}

impl Rule for RedactRule {
    fn name(&self) -> &'static str {
        "redact"
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn apply(&self, row: &mut Row<'_>) -> Result<usize, RuleError> {
        let mut changed = 0;
        for name in &self.columns {
            let Some((column, value)) = row.value_mut(name) else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            let redacted = match column.kind {
                ColumnKind::Integer | ColumnKind::Float => SqlValue::Integer(0),
                ColumnKind::String | ColumnKind::Binary | ColumnKind::Temporal => {
                    SqlValue::String(Vec::new())
                }
                ColumnKind::Decimal
                | ColumnKind::Enum
                | ColumnKind::Set
                | ColumnKind::Bit
                | ColumnKind::Duration
                | ColumnKind::Json => {
                    return Err(RuleError::NotImplemented {
                        column: column.name.clone(),
                        kind: column.kind,
                    })
                }
                ColumnKind::Other => {
                    return Err(RuleError::UnsupportedType {
                        column: column.name.clone(),
                        data_type: column.data_type.clone(),
                    })
                }
            };

            *value = redacted;
            changed += 1;
        }
        Ok(changed)
    }
}
