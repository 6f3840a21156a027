//! Correlated query compilation.
//!
//! Turns a table's filter state into SQL text. References into other tables
//! become `IN (SELECT ...)` subqueries compiled from the referenced table's
//! own filter, recursively. Output is a pure function of the database state,
//! so compiling twice yields identical text.

use super::{Constraint, Literal, WhereGroup};
use crate::error::ConfigError;
use crate::schema::{Database, Table, TableId};

/// Compiles table filters of one database into SQL
pub struct QueryBuilder<'a> {
    db: &'a Database,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Full `SELECT <column> FROM <table> [WHERE ...] [ORDER BY ...] [LIMIT n]`
    pub fn select(&self, id: TableId, column: &str) -> Result<String, ConfigError> {
        let table = self.db.table(id);
        let mut sql = format!(
            "SELECT {} FROM {}",
            quote_identifier(column),
            quote_identifier(&table.name)
        );
        if let Some(predicate) = self.where_clause(id)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate);
        }
        if let Some(order) = table.order.as_deref() {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(limit) = table.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        Ok(sql)
    }

    /// The predicate alone, without the `WHERE` keyword, ORDER BY or LIMIT.
    ///
    /// `None` when the table is unfiltered.
    pub fn where_clause(&self, id: TableId) -> Result<Option<String>, ConfigError> {
        let table = self.db.table(id);
        let mut parts = Vec::new();

        if let Some(filter) = table.filter.as_deref() {
            parts.push(format!("({})", filter));
        }

        if let Some(sample) = sample_predicate(table) {
            parts.push(sample);
        }

        let groups = table
            .where_groups
            .iter()
            .map(|group| self.group(table, group))
            .collect::<Result<Vec<_>, _>>()?;
        match groups.len() {
            0 => {}
            1 => parts.push(format!("({})", groups[0])),
            _ => parts.push(format!(
                "({})",
                groups
                    .iter()
                    .map(|g| format!("({})", g))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            )),
        }

        if parts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(parts.join(" AND ")))
        }
    }

    fn group(&self, table: &Table, group: &WhereGroup) -> Result<String, ConfigError> {
        if group.constraints.is_empty() {
            return Ok("1 = 1".to_string());
        }

        let terms = group
            .constraints
            .iter()
            .map(|c| self.constraint(table, c))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(terms.join(" AND "))
    }

    fn constraint(&self, table: &Table, constraint: &Constraint) -> Result<String, ConfigError> {
        let column = table
            .get_column(constraint.column())
            .ok_or_else(|| ConfigError::UnknownColumn {
                table: table.name.clone(),
                owner: table.name.clone(),
                column: constraint.column().to_string(),
            })?;
        let column = quote_identifier(&column.name);

        match constraint {
            Constraint::Literal { value, .. } => Ok(match value {
                Literal::Null => format!("{} IS NULL", column),
                Literal::String(s) => format!("{} = {}", column, quote_string(s)),
                Literal::Number(n) => format!("{} = {}", column, n),
                Literal::Bool(true) => format!("{} = TRUE", column),
                Literal::Bool(false) => format!("{} = FALSE", column),
            }),
            Constraint::Reference {
                table: parent,
                referenced_column,
                ..
            } => {
                let parent_table = self.db.table(*parent);
                let subquery = self.select(*parent, referenced_column)?;
                // MySQL rejects LIMIT directly inside IN (...)
                if parent_table.limit.is_some() {
                    Ok(format!(
                        "{} IN (SELECT {} FROM ({}) AS {})",
                        column,
                        quote_identifier(referenced_column),
                        subquery,
                        quote_identifier(&format!("{}_ref", parent_table.name))
                    ))
                } else {
                    Ok(format!("{} IN ({})", column, subquery))
                }
            }
        }
    }
}

/// Deterministic sampling predicate, `None` when every row is kept
fn sample_predicate(table: &Table) -> Option<String> {
    let rate = table.sample?;
    let modulus = (1.0 / rate).round() as u64;
    if modulus <= 1 {
        return None;
    }

    let mut identity: Vec<String> = table
        .primary_key()
        .map(|c| quote_identifier(&c.name))
        .collect();
    if identity.is_empty() {
        identity = table
            .columns()
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect();
    }

    Some(format!(
        "(CRC32(CONCAT_WS('|', {})) % {} = 0)",
        identity.join(", "),
        modulus
    ))
}

/// Quote an identifier with backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal with MySQL escaping
pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}
