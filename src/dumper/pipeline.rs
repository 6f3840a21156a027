//! Per-table extract → rewrite pipeline.
//!
//! The extractor runs as its own task and feeds lines through a bounded
//! channel; this side classifies each line, applies the table's rules to
//! INSERT tuples and writes the result to a temporary file owned by the
//! table. Dropping the pipeline future aborts the extractor task.

use super::TableDumpStats;
use crate::error::TableError;
use crate::extract::{ExtractRequest, Extractor};
use crate::filter::QueryBuilder;
use crate::parser::{self, InsertStatement};
use crate::rules::{self, Row};
use crate::schema::{Database, Table, TableId};
use std::io::SeekFrom;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A finished table: its rewritten statements, ready to be copied out
#[derive(Debug)]
pub struct TableOutput {
    pub id: TableId,
    /// Rewound temporary file
    pub file: File,
    pub stats: TableDumpStats,
}

/// Inputs of one table's pipeline
pub struct PipelineContext {
    pub db: Arc<Database>,
    pub extractor: Arc<dyn Extractor>,
    pub extra_options: Vec<String>,
    pub channel_capacity: usize,
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Extract, rewrite and buffer one table
pub async fn dump_table(ctx: PipelineContext, id: TableId) -> Result<TableOutput, TableError> {
    let db = ctx.db;
    let table = db.table(id);

    let where_clause = QueryBuilder::new(&db)
        .where_clause(id)
        .map_err(TableError::Query)?;
    if let Some(clause) = &where_clause {
        debug!("Table '{}' WHERE {}", table.name, clause);
    }

    let request = ExtractRequest {
        database: db.name.clone(),
        destination_database: db.destination.clone(),
        table: table.name.clone(),
        destination_table: table.destination.clone(),
        where_clause,
        order: table.order.clone(),
        limit: table.limit,
        extra_options: ctx.extra_options,
    };

    info!("Dumping table '{}.{}'", db.name, table.name);

    let (tx, mut rx) = mpsc::channel::<Vec<u8>>(ctx.channel_capacity.max(1));
    let extractor = ctx.extractor;
    let mut producer = AbortOnDrop(tokio::spawn(async move {
        extractor.extract(request, tx).await
    }));

    let mut writer = BufWriter::new(File::from_std(tempfile::tempfile()?));
    writer
        .write_all(format!("-- `{}`\n", table.name.replace('`', "``")).as_bytes())
        .await?;

    let mut stats = TableDumpStats {
        database: db.name.clone(),
        name: table.name.clone(),
        ..Default::default()
    };

    while let Some(line) = rx.recv().await {
        let rewritten = rewrite_line(table, &line, &mut stats)?;
        writer.write_all(&rewritten).await?;
    }

    // Channel closed: the extractor finished one way or another
    (&mut producer.0)
        .await
        .map_err(|e| TableError::Panicked(e.to_string()))??;

    writer.flush().await?;
    let mut file = writer.into_inner();
    file.seek(SeekFrom::Start(0)).await?;

    info!(
        "Dumped table '{}.{}': {} statements, {} rows rewritten",
        db.name, table.name, stats.statements, stats.rows_rewritten
    );

    Ok(TableOutput { id, file, stats })
}

/// Rewrite one line of extraction output, returning it newline-terminated
pub fn rewrite_line(
    table: &Table,
    line: &[u8],
    stats: &mut TableDumpStats,
) -> Result<Vec<u8>, TableError> {
    if !parser::is_insert(line) {
        let mut out = Vec::with_capacity(line.len() + 1);
        out.extend_from_slice(line);
        out.push(b'\n');
        return Ok(out);
    }

    stats.statements += 1;
    if table.rules.is_empty() && table.destination.is_none() {
        let mut out = Vec::with_capacity(line.len() + 1);
        out.extend_from_slice(line);
        out.push(b'\n');
        return Ok(out);
    }

    let mut stmt = InsertStatement::parse(line)?;
    if let Some(destination) = &table.destination {
        stmt.set_table(destination.as_str());
    }

    let mut statement_changed = 0;
    let (columns, tuples) = stmt.parts_mut();
    for values in tuples.iter_mut() {
        let mut row = Row::new(table, values.as_mut_slice()).with_columns(columns);
        let changed = rules::apply_all(&table.rules, &mut row)?;
        if changed > 0 {
            stats.rows_rewritten += 1;
            stats.values_rewritten += changed as u64;
            statement_changed += changed;
        }
    }
    if statement_changed > 0 {
        stats.statements_rewritten += 1;
    }

    let mut out = stmt.to_bytes();
    out.extend_from_slice(b";\n");
    Ok(out)
}
