//! Row extraction.
//!
//! An [`Extractor`] turns a table name plus compiled filter into a stream of
//! SQL statement lines, sent one line at a time over a bounded channel. The
//! first line is the `USE` directive for the destination database.

mod mysqldump;

pub use mysqldump::MysqlDumpExtractor;

use crate::error::ExtractError;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Sending half of a table's line stream (lines carry no trailing newline)
pub type LineSender = mpsc::Sender<Vec<u8>>;

/// Everything an extractor needs to know about one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractRequest {
    pub database: String,
    /// Target of the leading `USE` line
    pub destination_database: String,
    pub table: String,
    /// Set when INSERTs are re-targeted at another table name
    pub destination_table: Option<String>,
    /// Predicate without the `WHERE` keyword
    pub where_clause: Option<String>,
    pub order: Option<String>,
    pub limit: Option<u64>,
    /// Passed through to the underlying mechanism untouched
    pub extra_options: Vec<String>,
}

impl ExtractRequest {
    /// The `USE` directive that opens the stream
    pub fn use_statement(&self) -> Vec<u8> {
        format!("USE `{}`;", self.destination_database.replace('`', "``")).into_bytes()
    }
}

/// Produces the SQL lines of one table
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Stream the table's statements into `lines`.
    ///
    /// Returning (successfully or not) closes the stream.
    async fn extract(&self, request: ExtractRequest, lines: LineSender) -> Result<(), ExtractError>;
}

/// Send one line, mapping a dropped receiver to [`ExtractError::Closed`]
pub async fn send_line(lines: &LineSender, table: &str, line: Vec<u8>) -> Result<(), ExtractError> {
    lines.send(line).await.map_err(|_| ExtractError::Closed {
        table: table.to_string(),
    })
}
