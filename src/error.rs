//! Error taxonomy for configuration, extraction and rewriting.
//!
//! Configuration-phase problems are collected into [`ConfigErrors`] so that a
//! single run reports every problem at once. Run-phase problems are attributed
//! to the table whose task produced them.

use crate::schema::ColumnKind;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// A semantic problem found while resolving the declared configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Two tables with the same name inside one database block
    #[error("cannot add duplicate table '{table}' to database '{database}'")]
    DuplicateTable { database: String, table: String },

    /// A filter expression (or filter group) references more than one column
    #[error("table '{table}': filter on '{column}' references more than one table column: {expression}")]
    MultipleReferences {
        table: String,
        column: String,
        expression: String,
    },

    /// A filter references a table that is not configured in the database
    #[error("table '{table}': filter on '{column}' references unknown table '{referenced}'")]
    UnknownTable {
        table: String,
        column: String,
        referenced: String,
    },

    /// A column name that does not exist on the table it was looked up on
    #[error("table '{table}': unknown column '{owner}.{column}'")]
    UnknownColumn {
        table: String,
        owner: String,
        column: String,
    },

    /// Adding the dependency edge would close a cycle
    #[error("circular dependency between tables '{from}' and '{to}'")]
    CircularDependency { from: String, to: String },

    /// A rule block names a rule type the factory does not know
    #[error("table '{table}': '{rule_type}' is not a recognized rule type")]
    UnrecognizedRuleType { table: String, rule_type: String },

    /// A known rule type with an invalid configuration
    #[error("table '{table}': error while configuring {rule_type} rule: {message}")]
    InvalidRule {
        table: String,
        rule_type: String,
        message: String,
    },

    /// Filter expression text that is neither a literal nor a single reference
    #[error("table '{table}': invalid filter expression for '{column}' ({expression}): {reason}")]
    InvalidExpression {
        table: String,
        column: String,
        expression: String,
        reason: String,
    },

    /// A filter value of a kind that cannot be compiled to SQL (tuples, objects)
    #[error("table '{table}': unsupported filter value for '{column}': {expression}")]
    UnsupportedValue {
        table: String,
        column: String,
        expression: String,
    },

    /// Sample rate outside (0, 1]
    #[error("table '{table}': sample rate must be in (0, 1], got {rate}")]
    InvalidSampleRate { table: String, rate: f64 },

    /// Column metadata could not be fetched
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// All configuration problems found in one pass.
#[derive(Debug, Default)]
pub struct ConfigErrors(pub Vec<ConfigError>);

impl ConfigErrors {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, error: impl Into<ConfigError>) {
        self.0.push(error.into());
    }

    pub fn extend(&mut self, other: ConfigErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigError> {
        self.0.iter()
    }

    /// Ok if nothing was collected, otherwise the collected errors
    pub fn into_result(self) -> Result<(), ConfigErrors> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "could not read config: {} error(s)", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ConfigErrors {}

impl From<ConfigError> for ConfigErrors {
    fn from(error: ConfigError) -> Self {
        Self(vec![error])
    }
}

/// Column metadata retrieval failures.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Zero columns came back, most likely a misspelled table name
    #[error("no columns found for table '{database}.{table}' (is the table name spelled correctly?)")]
    Unavailable { database: String, table: String },

    /// The metadata query itself failed
    #[error("failed to read columns for table '{database}.{table}'")]
    Query {
        database: String,
        table: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Row extraction failures.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The dump binary is not on PATH
    #[error("dump binary '{program}' not found")]
    BinaryNotFound { program: String },

    /// The dump process could not be started
    #[error("failed to start '{program}'")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The dump process exited unsuccessfully
    #[error("extraction of '{table}' failed ({status}): {stderr}")]
    Failed {
        table: String,
        status: String,
        stderr: String,
    },

    /// The consumer side of the line stream went away
    #[error("line stream closed before extraction of '{table}' finished")]
    Closed { table: String },

    #[error("I/O error while reading extraction output")]
    Io(#[from] std::io::Error),
}

/// Failures while applying a rule to one row.
#[derive(Debug, Error)]
pub enum RuleError {
    /// Column kinds the redact rule deliberately does not handle
    #[error("redacting column '{column}' of kind {kind} is not implemented")]
    NotImplemented { column: String, kind: ColumnKind },

    /// Column types the rule cannot interpret at all
    #[error("don't know how to redact column '{column}' with type '{data_type}'")]
    UnsupportedType { column: String, data_type: String },
}

/// INSERT statement parse failures.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not an INSERT statement")]
    NotInsert,

    #[error("INSERT statement missing VALUES keyword")]
    MissingValues,

    #[error("unterminated {what} starting at byte {offset}")]
    Unterminated { what: &'static str, offset: usize },

    #[error("unexpected {found:?} at byte {offset}, expected {expected}")]
    Unexpected {
        found: char,
        offset: usize,
        expected: &'static str,
    },

    #[error("unexpected end of statement, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
}

/// Everything that can fail one table's dump task.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("filter compilation failed")]
    Query(#[source] ConfigError),

    #[error("extraction failed")]
    Extraction(#[from] ExtractError),

    #[error("rule application failed")]
    Rule(#[from] RuleError),

    #[error("could not parse statement")]
    Parse(#[from] ParseError),

    #[error("I/O error on table output")]
    Io(#[from] std::io::Error),

    /// Not attempted because a table it depends on failed
    #[error("skipped because ancestor table '{ancestor}' failed")]
    AncestorFailed { ancestor: String },

    #[error("dump task panicked: {0}")]
    Panicked(String),
}

/// A failed table together with its error.
#[derive(Debug)]
pub struct TableFailure {
    pub table: String,
    pub error: TableError,
}

/// Top-level result of a dump run.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Configuration(#[from] ConfigErrors),

    /// First failure in fail-fast mode
    #[error("table '{table}' failed")]
    Table {
        table: String,
        #[source]
        source: TableError,
    },

    /// Every failure collected in continue mode
    #[error("{}", format_failures(.0))]
    Tables(Vec<TableFailure>),

    /// The run-wide deadline elapsed
    #[error("dump timed out after {timeout:?}; unfinished tables: {}", .unfinished.join(", "))]
    Timeout {
        timeout: Duration,
        unfinished: Vec<String>,
    },

    #[error("failed to write dump output")]
    Io(#[from] std::io::Error),
}

fn format_failures(failures: &[TableFailure]) -> String {
    let mut message = format!("{} table(s) failed", failures.len());
    for failure in failures {
        message.push_str(&format!("\n  - {}: {}", failure.table, failure.error));
        let mut source = std::error::Error::source(&failure.error);
        while let Some(cause) = source {
            message.push_str(&format!(": {}", cause));
            source = cause.source();
        }
    }
    message
}
