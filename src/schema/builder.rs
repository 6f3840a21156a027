//! Configuration-phase resolution of a database declaration.
//!
//! Builds the table arena, fetches column metadata, configures rules and
//! resolves filter groups into constraints and graph edges. Every problem is
//! collected; the caller gets either a complete [`Database`] or all of the
//! errors at once.

use super::source::SchemaSource;
use super::{Column, Database, TableId};
use crate::config::{DatabaseDecl, TableDecl};
use crate::error::{ConfigError, ConfigErrors, SchemaError};
use crate::filter;
use crate::rules;
use tracing::{debug, warn};

/// Builder for a [`Database`] from its declaration
pub struct DatabaseBuilder<'a> {
    decl: &'a DatabaseDecl,
}

impl<'a> DatabaseBuilder<'a> {
    pub fn new(decl: &'a DatabaseDecl) -> Self {
        Self { decl }
    }

    /// Resolve the declaration against live column metadata
    pub async fn build(self, source: &dyn SchemaSource) -> Result<Database, ConfigErrors> {
        let decl = self.decl;
        let mut db = Database::new(&decl.name, decl.destination.clone());
        let mut errors = ConfigErrors::new();

        // Pass 1: table arena
        let mut declared: Vec<(TableId, &TableDecl)> = Vec::with_capacity(decl.tables.len());
        for table in &decl.tables {
            match db.add_table(&table.name) {
                Ok(id) => declared.push((id, table)),
                Err(e) => errors.push(e),
            }
        }

        // Pass 2: columns
        let mut resolvable = Vec::with_capacity(declared.len());
        for &(id, table) in &declared {
            match source.fetch_columns(&decl.name, &table.name).await {
                Ok(columns) if columns.is_empty() => errors.push(SchemaError::Unavailable {
                    database: decl.name.clone(),
                    table: table.name.clone(),
                }),
                Ok(columns) => {
                    debug!("Table '{}' has {} columns", table.name, columns.len());
                    let columns = columns
                        .into_iter()
                        .map(|info| Column::from_info(info, id))
                        .collect();
                    db.table_mut(id).set_columns(columns);
                    resolvable.push((id, table));
                }
                Err(e) => errors.push(e),
            }
        }

        // Pass 3: static settings and rules
        for &(id, table) in &declared {
            configure_table(&mut db, id, table, &mut errors);
        }

        // Pass 4: filters. Tables without columns are skipped, their
        // schema error is already recorded.
        for &(id, table) in &resolvable {
            filter::resolve_filters(&mut db, id, &table.filter, &mut errors);
        }

        errors.into_result()?;
        Ok(db)
    }
}

fn configure_table(db: &mut Database, id: TableId, decl: &TableDecl, errors: &mut ConfigErrors) {
    let table = db.table_mut(id);

    table.destination = decl.destination.clone().filter(|d| !d.is_empty());
    table.filter = decl
        .filter_text
        .as_deref()
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string);
    table.limit = decl.limit;
    table.order = decl
        .order
        .as_deref()
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string);

    if let Some(rate) = decl.sample {
        if rate.is_nan() || rate <= 0.0 || rate > 1.0 {
            errors.push(ConfigError::InvalidSampleRate {
                table: decl.name.clone(),
                rate,
            });
        } else {
            table.sample = Some(rate);
        }
    }

    for rule_decl in &decl.rules {
        match rules::configure(&decl.name, rule_decl) {
            Ok(rule) => {
                if !table.columns().is_empty() {
                    for column in rule.columns() {
                        if table.get_column(column).is_none() {
                            warn!(
                                "Table '{}': {} rule names unknown column '{}', it will be skipped",
                                decl.name,
                                rule.name(),
                                column
                            );
                        }
                    }
                }
                table.rules.push(rule);
            }
            Err(e) => errors.push(e),
        }
    }
}
