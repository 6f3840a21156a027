//! Table filters: constraint model and cross-table reference resolution.
//!
//! A table's filter is a list of groups combined with OR; the constraints of
//! one group are combined with AND. A constraint either compares a column
//! against a literal or restricts it to the values of a column in another
//! table. The latter adds a dependency edge `other → this` to the database
//! graph.

pub mod expr;
pub mod query;

pub use query::QueryBuilder;

use crate::error::{ConfigError, ConfigErrors};
use crate::schema::{Database, EdgeOutcome, TableId};
use expr::{ExprError, Expression};
use tracing::debug;

/// A literal filter value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    /// Numeric text, emitted as written
    Number(String),
    Bool(bool),
    Null,
}

/// A single AND-term of a filter group
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// `column = value` (or `column IS NULL`)
    Literal { column: String, value: Literal },
    /// `column IN (SELECT referenced_column FROM table ...)`
    Reference {
        column: String,
        table: TableId,
        referenced_column: String,
    },
}

impl Constraint {
    pub fn column(&self) -> &str {
        match self {
            Constraint::Literal { column, .. } | Constraint::Reference { column, .. } => column,
        }
    }
}

/// One OR-branch of a table filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereGroup {
    pub constraints: Vec<Constraint>,
}

impl WhereGroup {
    /// The table this group depends on, if any
    pub fn reference(&self) -> Option<TableId> {
        self.constraints.iter().find_map(|c| match c {
            Constraint::Reference { table, .. } => Some(*table),
            Constraint::Literal { .. } => None,
        })
    }
}

/// A declared filter group: column name → expression text, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGroupDecl(pub Vec<(String, String)>);

impl FilterGroupDecl {
    pub fn new<K: Into<String>, V: Into<String>>(attributes: impl IntoIterator<Item = (K, V)>) -> Self {
        Self(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn describe(&self) -> String {
        self.0
            .iter()
            .map(|(column, text)| format!("{}: {}", column, text))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Resolve the declared filter groups of one table.
///
/// Every problem found is pushed to `errors`; groups that resolve cleanly are
/// appended to the table's `where_groups` and their reference (if any) is
/// registered as a graph edge.
pub fn resolve_filters(
    db: &mut Database,
    id: TableId,
    groups: &[FilterGroupDecl],
    errors: &mut ConfigErrors,
) {
    for group in groups {
        if let Some(resolved) = resolve_group(db, id, group, errors) {
            db.table_mut(id).where_groups.push(resolved);
        }
    }
}

fn resolve_group(
    db: &mut Database,
    id: TableId,
    group: &FilterGroupDecl,
    errors: &mut ConfigErrors,
) -> Option<WhereGroup> {
    let table_name = db.table(id).name.clone();
    let error_count = errors.len();
    let mut constraints = Vec::with_capacity(group.0.len());

    for (column, text) in &group.0 {
        let column = {
            let table = db.table(id);
            match table.get_column(column) {
                Some(c) => c.name.clone(),
                // Schema fetch failed; already reported
                None if table.columns().is_empty() => column.clone(),
                None => {
                    errors.push(ConfigError::UnknownColumn {
                        table: table_name.clone(),
                        owner: table_name.clone(),
                        column: column.clone(),
                    });
                    continue;
                }
            }
        };

        let parsed = match expr::parse(text) {
            Ok(parsed) => parsed,
            Err(e) => {
                errors.push(expression_error(&table_name, &column, text, e));
                continue;
            }
        };

        match parsed {
            Expression::Literal(value) => constraints.push(Constraint::Literal { column, value }),
            Expression::Reference {
                table: referenced,
                column: referenced_column,
            } => {
                let Some(parent) = db.get_table(&referenced) else {
                    errors.push(ConfigError::UnknownTable {
                        table: table_name.clone(),
                        column,
                        referenced,
                    });
                    continue;
                };
                let referenced_column = match parent.get_column(&referenced_column) {
                    Some(c) => c.name.clone(),
                    None if parent.columns().is_empty() => referenced_column,
                    None => {
                        errors.push(ConfigError::UnknownColumn {
                            table: table_name.clone(),
                            owner: referenced,
                            column: referenced_column,
                        });
                        continue;
                    }
                };
                constraints.push(Constraint::Reference {
                    column,
                    table: parent.id,
                    referenced_column,
                });
            }
        }
    }

    if errors.len() > error_count {
        return None;
    }

    let references: Vec<TableId> = constraints
        .iter()
        .filter_map(|c| match c {
            Constraint::Reference { table, .. } => Some(*table),
            Constraint::Literal { .. } => None,
        })
        .collect();

    match references.as_slice() {
        [] => {}
        [parent] => {
            let parent = *parent;
            match db.graph.add_edge(parent, id) {
                Ok(EdgeOutcome::Added) => {
                    debug!(
                        "Added dependency {} -> {}",
                        db.table(parent).name,
                        table_name
                    );
                }
                Ok(EdgeOutcome::Duplicate) => {}
                Err(_) => {
                    errors.push(ConfigError::CircularDependency {
                        from: db.table(parent).name.clone(),
                        to: table_name,
                    });
                    return None;
                }
            }
        }
        _ => {
            errors.push(ConfigError::MultipleReferences {
                table: table_name,
                column: constraints
                    .iter()
                    .filter(|c| matches!(c, Constraint::Reference { .. }))
                    .map(Constraint::column)
                    .collect::<Vec<_>>()
                    .join(", "),
                expression: group.describe(),
            });
            return None;
        }
    }

    Some(WhereGroup { constraints })
}

fn expression_error(table: &str, column: &str, text: &str, error: ExprError) -> ConfigError {
    match error {
        ExprError::MultipleReferences => ConfigError::MultipleReferences {
            table: table.to_string(),
            column: column.to_string(),
            expression: text.to_string(),
        },
        ExprError::Unsupported => ConfigError::UnsupportedValue {
            table: table.to_string(),
            column: column.to_string(),
            expression: text.to_string(),
        },
        ExprError::Invalid(reason) => ConfigError::InvalidExpression {
            table: table.to_string(),
            column: column.to_string(),
            expression: text.to_string(),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Column, ColumnInfo};

    fn database() -> Database {
        let mut db = Database::new("shop", None);
        for (name, columns) in [
            ("customers", vec!["id", "status"]),
            ("orders", vec!["id", "customer_id"]),
        ] {
            let id = db.add_table(name).unwrap();
            let columns = columns
                .iter()
                .enumerate()
                .map(|(i, c)| Column::from_info(ColumnInfo::new(*c, "int", i as u32 + 1), id))
                .collect();
            db.table_mut(id).set_columns(columns);
        }
        db
    }

    #[test]
    fn test_reference_adds_edge() {
        let mut db = database();
        let orders = db.get_table_id("orders").unwrap();
        let customers = db.get_table_id("customers").unwrap();
        let mut errors = ConfigErrors::new();

        let decl = FilterGroupDecl::new([("customer_id", "customers.id")]);
        resolve_filters(&mut db, orders, &[decl.clone(), decl], &mut errors);

        assert!(errors.is_empty(), "{}", errors);
        assert!(db.graph.has_edge(customers, orders));
        assert_eq!(db.table(orders).where_groups.len(), 2);
        assert_eq!(db.table(orders).where_groups[0].reference(), Some(customers));
    }

    #[test]
    fn test_group_with_two_references() {
        let mut db = database();
        let orders = db.get_table_id("orders").unwrap();
        let mut errors = ConfigErrors::new();

        let decl = FilterGroupDecl::new([("customer_id", "customers.id"), ("id", "customers.status")]);
        resolve_filters(&mut db, orders, &[decl], &mut errors);

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.0[0], ConfigError::MultipleReferences { .. }));
        assert!(db.table(orders).where_groups.is_empty());
    }

    #[test]
    fn test_unknown_references_reported() {
        let mut db = database();
        let orders = db.get_table_id("orders").unwrap();
        let mut errors = ConfigErrors::new();

        resolve_filters(
            &mut db,
            orders,
            &[
                FilterGroupDecl::new([("customer_id", "clients.id")]),
                FilterGroupDecl::new([("customer_id", "customers.uuid")]),
                FilterGroupDecl::new([("nope", "1")]),
            ],
            &mut errors,
        );

        assert_eq!(errors.len(), 3);
        assert!(matches!(errors.0[0], ConfigError::UnknownTable { .. }));
        assert!(matches!(errors.0[1], ConfigError::UnknownColumn { ref owner, .. } if owner == "customers"));
        assert!(matches!(errors.0[2], ConfigError::UnknownColumn { ref owner, .. } if owner == "orders"));
    }

    #[test]
    fn test_cycle_reported() {
        let mut db = database();
        let orders = db.get_table_id("orders").unwrap();
        let customers = db.get_table_id("customers").unwrap();
        let mut errors = ConfigErrors::new();

        resolve_filters(&mut db, orders, &[FilterGroupDecl::new([("customer_id", "customers.id")])], &mut errors);
        resolve_filters(&mut db, customers, &[FilterGroupDecl::new([("id", "orders.customer_id")])], &mut errors);

        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors.0[0],
            ConfigError::CircularDependency { ref from, ref to } if from == "orders" && to == "customers"
        ));
    }
}
