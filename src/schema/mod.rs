//! Database, table and column model.
//!
//! This module provides:
//! - Tables stored in an arena indexed by [`TableId`]
//! - Column metadata with a value kind derived from the declared SQL type
//! - The dependency graph between tables (by id, never by reference)
//! - The configuration-phase builder that resolves declarations into a [`Database`]

mod builder;
mod graph;
pub mod source;

pub use builder::DatabaseBuilder;
pub use graph::*;
pub use source::{ColumnInfo, MemorySchemaSource, SchemaSource};

use crate::error::ConfigError;
use crate::filter::WhereGroup;
use crate::rules::Rule;
use ahash::AHashMap;
use std::fmt;

/// Unique identifier for a table within a database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl TableId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TableId({})", self.0)
    }
}

/// Value kind of a column, derived from its declared MySQL data type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// TINYINT .. BIGINT, YEAR, BOOL
    Integer,
    /// FLOAT, DOUBLE, REAL
    Float,
    /// CHAR, VARCHAR, TEXT family
    String,
    /// BINARY, VARBINARY, BLOB family
    Binary,
    /// DATE, DATETIME, TIMESTAMP
    Temporal,
    Decimal,
    Enum,
    Set,
    Bit,
    /// TIME (MySQL durations)
    Duration,
    Json,
    /// Anything else (spatial types, vendor extensions)
    Other,
}

impl ColumnKind {
    /// Classify a MySQL `DATA_TYPE` / `COLUMN_TYPE` string
    pub fn from_sql_type(data_type: &str) -> Self {
        let type_lower = data_type.to_lowercase();
        let base_type = type_lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        match base_type {
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "year"
            | "bool" | "boolean" | "serial" => ColumnKind::Integer,
            "float" | "double" | "real" => ColumnKind::Float,
            "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "nchar"
            | "nvarchar" => ColumnKind::String,
            "binary" | "varbinary" | "tinyblob" | "blob" | "mediumblob" | "longblob" => {
                ColumnKind::Binary
            }
            "date" | "datetime" | "timestamp" => ColumnKind::Temporal,
            "decimal" | "numeric" | "dec" | "fixed" => ColumnKind::Decimal,
            "enum" => ColumnKind::Enum,
            "set" => ColumnKind::Set,
            "bit" => ColumnKind::Bit,
            "time" => ColumnKind::Duration,
            "json" => ColumnKind::Json,
            _ => ColumnKind::Other,
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::String => "string",
            ColumnKind::Binary => "binary",
            ColumnKind::Temporal => "temporal",
            ColumnKind::Decimal => "decimal",
            ColumnKind::Enum => "enum",
            ColumnKind::Set => "set",
            ColumnKind::Bit => "bit",
            ColumnKind::Duration => "duration",
            ColumnKind::Json => "json",
            ColumnKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Column definition within a table
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Declared SQL type as reported by the server
    pub data_type: String,
    /// Kind derived from `data_type`
    pub kind: ColumnKind,
    /// Position in table (1-indexed, as in information_schema)
    pub position: u32,
    /// Whether this column is part of the primary key
    pub is_primary_key: bool,
    /// Owning table
    pub table: TableId,
}

impl Column {
    pub fn from_info(info: ColumnInfo, table: TableId) -> Self {
        Self {
            kind: ColumnKind::from_sql_type(&info.data_type),
            name: info.name,
            data_type: info.data_type,
            position: info.position,
            is_primary_key: info.is_primary_key,
            table,
        }
    }

    /// Index of this column's value inside a row tuple
    pub fn value_index(&self) -> usize {
        self.position.saturating_sub(1) as usize
    }
}

/// A table configured for extraction
#[derive(Debug)]
pub struct Table {
    /// Table name (unique within its database)
    pub name: String,
    /// Table ID within the database
    pub id: TableId,
    /// Name to write INSERTs against, when remapped
    pub destination: Option<String>,
    /// Columns ordered by position
    columns: Vec<Column>,
    /// Map from column name to index in `columns`
    column_index: AHashMap<String, usize>,
    /// Rules applied to every extracted row, in declaration order
    pub rules: Vec<Box<dyn Rule>>,
    /// OR-combined constraint groups
    pub where_groups: Vec<WhereGroup>,
    /// Literal filter text, used verbatim
    pub filter: Option<String>,
    /// Sample rate in (0, 1]
    pub sample: Option<f64>,
    /// Row limit
    pub limit: Option<u64>,
    /// ORDER BY clause body
    pub order: Option<String>,
}

impl Table {
    /// Create a new table with no columns
    pub fn new(name: impl Into<String>, id: TableId) -> Self {
        Self {
            name: name.into(),
            id,
            destination: None,
            columns: Vec::new(),
            column_index: AHashMap::new(),
            rules: Vec::new(),
            where_groups: Vec::new(),
            filter: None,
            sample: None,
            limit: None,
            order: None,
        }
    }

    /// Replace the column set, ordering it by position
    pub fn set_columns(&mut self, mut columns: Vec<Column>) {
        columns.sort_by_key(|c| c.position);
        self.column_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        self.columns = columns;
    }

    /// Get a column by name (exact match first, then case-insensitive)
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        if let Some(&idx) = self.column_index.get(name) {
            return self.columns.get(idx);
        }
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Columns in position order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Primary key columns in position order
    pub fn primary_key(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }
}

/// A configured database: its tables and their dependency graph
#[derive(Debug)]
pub struct Database {
    /// Source database name
    pub name: String,
    /// Database the emitted `USE` statement targets
    pub destination: String,
    /// Table arena indexed by TableId
    tables: Vec<Table>,
    /// Map from table name to table ID
    index: AHashMap<String, TableId>,
    /// Dependency edges between tables
    pub graph: DependencyGraph,
}

impl Database {
    /// Create an empty database; `destination` defaults to `name`
    pub fn new(name: impl Into<String>, destination: Option<String>) -> Self {
        let name = name.into();
        Self {
            destination: destination
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| name.clone()),
            name,
            tables: Vec::new(),
            index: AHashMap::new(),
            graph: DependencyGraph::new(),
        }
    }

    /// Add a table, returning its ID. Names must be unique.
    pub fn add_table(&mut self, name: &str) -> Result<TableId, ConfigError> {
        if self.index.contains_key(name) {
            return Err(ConfigError::DuplicateTable {
                database: self.name.clone(),
                table: name.to_string(),
            });
        }
        let id = self.graph.add_vertex();
        debug_assert_eq!(id.index(), self.tables.len());
        self.index.insert(name.to_string(), id);
        self.tables.push(Table::new(name, id));
        Ok(id)
    }

    /// Get table ID by name
    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        self.index.get(name).copied()
    }

    /// Get table by name
    pub fn get_table(&self, name: &str) -> Option<&Table> {
        self.get_table_id(name).map(|id| self.table(id))
    }

    /// Get a table by ID.
    ///
    /// Panics if the ID was not issued by this database.
    pub fn table(&self, id: TableId) -> &Table {
        &self.tables[id.index()]
    }

    /// Get a mutable table by ID.
    ///
    /// Panics if the ID was not issued by this database.
    pub fn table_mut(&mut self, id: TableId) -> &mut Table {
        &mut self.tables[id.index()]
    }

    /// Iterate over all tables in declaration order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.iter()
    }

    /// Get the number of tables
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if the database has no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Tables in dependency order (ancestors before dependents)
    pub fn dump_order(&self) -> Vec<TableId> {
        self.graph.topo_sort()
    }
}
