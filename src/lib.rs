//! Dependency-ordered, anonymizing MySQL table extractor.
//!
//! Configuration is resolved into [`schema::Database`]s (tables, columns,
//! rules, filter constraints and a dependency graph), then dumped table by
//! table in dependency order, with rules applied to every extracted row.

pub mod config;
pub mod dumper;
pub mod error;
pub mod extract;
pub mod filter;
pub mod logging;
pub mod parser;
pub mod rules;
pub mod schema;

use crate::config::DatabaseDecl;
use crate::dumper::{DumpOptions, DumpStats, Dumper};
use crate::error::{ConfigErrors, DumpError};
use crate::extract::Extractor;
use crate::schema::{Database, DatabaseBuilder, SchemaSource};
use std::sync::Arc;
use tokio::io::AsyncWrite;

/// Resolve every database declaration, collecting all configuration errors
pub async fn configure(
    decls: &[DatabaseDecl],
    source: &dyn SchemaSource,
) -> Result<Vec<Database>, ConfigErrors> {
    let mut databases = Vec::with_capacity(decls.len());
    let mut errors = ConfigErrors::new();

    for decl in decls {
        match DatabaseBuilder::new(decl).build(source).await {
            Ok(db) => databases.push(db),
            Err(e) => errors.extend(e),
        }
    }

    errors.into_result()?;
    Ok(databases)
}

/// Configure, then dump every database to `out`
pub async fn run<W: AsyncWrite + Unpin>(
    decls: &[DatabaseDecl],
    source: &dyn SchemaSource,
    extractor: Arc<dyn Extractor>,
    options: DumpOptions,
    out: &mut W,
) -> Result<DumpStats, DumpError> {
    let databases = configure(decls, source).await?;
    Dumper::new(extractor, options).dump(databases, out).await
}
