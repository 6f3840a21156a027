//! Dependency-ordered, concurrent table dumping.
//!
//! Tables are launched as soon as every table they depend on has been
//! dumped (Kahn's algorithm over the dependency graph), each in its own task.
//! Outputs are buffered per table and emitted in topological order once the
//! database is complete. The whole run, collation included, shares a single
//! deadline.

mod pipeline;

pub use pipeline::{dump_table, rewrite_line, PipelineContext, TableOutput};

use crate::error::{DumpError, TableError, TableFailure};
use crate::extract::Extractor;
use crate::schema::{Database, TableId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};

/// What happens when one table fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Abort every in-flight table and report the first failure
    #[default]
    FailFast,
    /// Finish independent tables, skip descendants of failed ones
    Continue,
}

/// Run-wide settings
#[derive(Debug, Clone)]
pub struct DumpOptions {
    pub timeout: Duration,
    /// `None` (or 0) means one task per ready table
    pub max_concurrency: Option<usize>,
    pub failure_mode: FailureMode,
    /// Passed to every extraction
    pub extra_options: Vec<String>,
    /// Lines buffered between extractor and rewriter
    pub channel_capacity: usize,
}

impl Default for DumpOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3600),
            max_concurrency: None,
            failure_mode: FailureMode::FailFast,
            extra_options: Vec::new(),
            channel_capacity: 1024,
        }
    }
}

/// Lifecycle of one table within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableState {
    Pending,
    /// Every ancestor is dumped
    Ready,
    Dumping,
    Dumped,
    Failed,
    /// An ancestor failed
    Skipped,
}

/// Statistics from a dump run
#[derive(Debug, Default, Serialize)]
pub struct DumpStats {
    /// RFC 3339 start time of the run
    pub started_at: String,
    pub tables_dumped: usize,
    pub statements_rewritten: u64,
    pub rows_rewritten: u64,
    pub values_rewritten: u64,
    pub table_stats: Vec<TableDumpStats>,
}

impl DumpStats {
    fn record(&mut self, table: TableDumpStats) {
        self.tables_dumped += 1;
        self.statements_rewritten += table.statements_rewritten;
        self.rows_rewritten += table.rows_rewritten;
        self.values_rewritten += table.values_rewritten;
        self.table_stats.push(table);
    }
}

/// Per-table statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDumpStats {
    pub database: String,
    pub name: String,
    /// INSERT statements seen
    pub statements: u64,
    pub statements_rewritten: u64,
    pub rows_rewritten: u64,
    pub values_rewritten: u64,
}

/// Dumps configured databases through an [`Extractor`]
pub struct Dumper {
    extractor: Arc<dyn Extractor>,
    options: DumpOptions,
}

impl Dumper {
    pub fn new(extractor: Arc<dyn Extractor>, options: DumpOptions) -> Self {
        Self { extractor, options }
    }

    /// Dump every database in order, writing the combined output to `out`
    pub async fn dump<W: AsyncWrite + Unpin>(
        &self,
        databases: Vec<Database>,
        out: &mut W,
    ) -> Result<DumpStats, DumpError> {
        let deadline = Instant::now() + self.options.timeout;
        let mut stats = DumpStats {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..Default::default()
        };
        let mut failures = Vec::new();

        let mut databases = databases.into_iter().map(Arc::new).collect::<VecDeque<_>>();
        while let Some(db) = databases.pop_front() {
            let scheduler = Scheduler::new(Arc::clone(&db), self, deadline);
            let run = match scheduler.run().await {
                Ok(run) => run,
                Err(DumpError::Timeout { timeout, mut unfinished }) => {
                    unfinished.extend(not_started(&databases));
                    return Err(DumpError::Timeout { timeout, unfinished });
                }
                Err(e) => return Err(e),
            };

            let mut outputs = run.outputs.into_iter();
            while let Some(mut output) = outputs.next() {
                match timeout_at(deadline, tokio::io::copy(&mut output.file, out)).await {
                    Ok(copied) => {
                        copied?;
                    }
                    Err(_) => {
                        error!("Timed out writing output of database '{}'", db.name);
                        let unfinished = std::iter::once(output.id)
                            .chain(outputs.map(|o| o.id))
                            .map(|id| format!("{}.{}", db.name, db.table(id).name))
                            .chain(not_started(&databases))
                            .collect();
                        return Err(DumpError::Timeout {
                            timeout: self.options.timeout,
                            unfinished,
                        });
                    }
                }
                stats.record(output.stats);
            }
            failures.extend(run.failures);
        }
        out.flush().await?;

        if failures.is_empty() {
            Ok(stats)
        } else {
            Err(DumpError::Tables(failures))
        }
    }
}

/// Qualified names of every table in databases not yet started
fn not_started(databases: &VecDeque<Arc<Database>>) -> impl Iterator<Item = String> + '_ {
    databases
        .iter()
        .flat_map(|db| db.tables().map(move |t| format!("{}.{}", db.name, t.name)))
}

/// Completed tables in topological order, plus failures (continue mode)
struct DatabaseRun {
    outputs: Vec<TableOutput>,
    failures: Vec<TableFailure>,
}

/// Single coordination point for one database's table states
struct Scheduler<'a> {
    db: Arc<Database>,
    dumper: &'a Dumper,
    deadline: Instant,
    states: Vec<TableState>,
    /// Parents not yet dumped, per table
    waiting_on: Vec<usize>,
    ready: VecDeque<TableId>,
    tasks: JoinSet<Result<TableOutput, TableError>>,
    running: AHashMap<tokio::task::Id, TableId>,
    outputs: Vec<Option<TableOutput>>,
    failures: Vec<TableFailure>,
}

impl<'a> Scheduler<'a> {
    fn new(db: Arc<Database>, dumper: &'a Dumper, deadline: Instant) -> Self {
        let n = db.len();
        let waiting_on = (0..n)
            .map(|i| db.graph.parents(TableId(i as u32)).len())
            .collect();
        Self {
            db,
            dumper,
            deadline,
            states: vec![TableState::Pending; n],
            waiting_on,
            ready: VecDeque::new(),
            tasks: JoinSet::new(),
            running: AHashMap::new(),
            outputs: (0..n).map(|_| None).collect(),
            failures: Vec::new(),
        }
    }

    async fn run(mut self) -> Result<DatabaseRun, DumpError> {
        let order = self.db.dump_order();
        for &id in &order {
            if self.waiting_on[id.index()] == 0 {
                self.mark_ready(id);
            }
        }

        loop {
            self.launch_ready();
            if self.tasks.is_empty() {
                break;
            }

            let joined = match timeout_at(self.deadline, self.tasks.join_next_with_id()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    self.tasks.shutdown().await;
                    return Err(DumpError::Timeout {
                        timeout: self.dumper.options.timeout,
                        unfinished: self.unfinished(),
                    });
                }
            };

            let (task_id, result) = match joined {
                Ok((task_id, result)) => (task_id, result),
                Err(e) => (e.id(), Err(TableError::Panicked(e.to_string()))),
            };
            let Some(id) = self.running.remove(&task_id) else {
                continue;
            };

            match result {
                Ok(output) => self.completed(id, output),
                Err(e) => self.failed(id, e).await?,
            }
        }

        // Every table is accounted for
        debug_assert!(self.states.iter().all(|s| matches!(
            s,
            TableState::Dumped | TableState::Failed | TableState::Skipped
        )));

        let mut outputs = Vec::with_capacity(order.len());
        for id in order {
            if let Some(output) = self.outputs[id.index()].take() {
                outputs.push(output);
            }
        }
        Ok(DatabaseRun {
            outputs,
            failures: self.failures,
        })
    }

    fn launch_ready(&mut self) {
        let limit = match self.dumper.options.max_concurrency {
            Some(0) | None => usize::MAX,
            Some(n) => n,
        };

        while self.tasks.len() < limit {
            let Some(id) = self.ready.pop_front() else {
                break;
            };
            self.transition(id, TableState::Dumping);

            let ctx = PipelineContext {
                db: Arc::clone(&self.db),
                extractor: Arc::clone(&self.dumper.extractor),
                extra_options: self.dumper.options.extra_options.clone(),
                channel_capacity: self.dumper.options.channel_capacity,
            };
            let handle = self.tasks.spawn(dump_table(ctx, id));
            self.running.insert(handle.id(), id);
        }
    }

    fn completed(&mut self, id: TableId, output: TableOutput) {
        self.transition(id, TableState::Dumped);
        self.outputs[id.index()] = Some(output);

        let db = Arc::clone(&self.db);
        for &child in db.graph.children(id) {
            let waiting = &mut self.waiting_on[child.index()];
            *waiting -= 1;
            if *waiting == 0 && self.states[child.index()] == TableState::Pending {
                self.mark_ready(child);
            }
        }
    }

    async fn failed(&mut self, id: TableId, e: TableError) -> Result<(), DumpError> {
        self.transition(id, TableState::Failed);
        let name = self.db.table(id).name.clone();
        error!("Table '{}.{}' failed: {}", self.db.name, name, e);

        match self.dumper.options.failure_mode {
            FailureMode::FailFast => {
                self.tasks.shutdown().await;
                Err(DumpError::Table {
                    table: format!("{}.{}", self.db.name, name),
                    source: e,
                })
            }
            FailureMode::Continue => {
                self.failures.push(TableFailure {
                    table: format!("{}.{}", self.db.name, name),
                    error: e,
                });
                for descendant in self.db.graph.descendants(id) {
                    if self.states[descendant.index()] == TableState::Pending {
                        self.transition(descendant, TableState::Skipped);
                        self.failures.push(TableFailure {
                            table: format!("{}.{}", self.db.name, self.db.table(descendant).name),
                            error: TableError::AncestorFailed {
                                ancestor: name.clone(),
                            },
                        });
                    }
                }
                Ok(())
            }
        }
    }

    fn mark_ready(&mut self, id: TableId) {
        self.transition(id, TableState::Ready);
        self.ready.push_back(id);
    }

    fn transition(&mut self, id: TableId, to: TableState) {
        let from = self.states[id.index()];
        debug_assert!(
            matches!(
                (from, to),
                (TableState::Pending, TableState::Ready)
                    | (TableState::Pending, TableState::Skipped)
                    | (TableState::Ready, TableState::Dumping)
                    | (TableState::Dumping, TableState::Dumped)
                    | (TableState::Dumping, TableState::Failed)
            ),
            "invalid transition {:?} -> {:?}",
            from,
            to
        );
        debug!(
            "Table '{}.{}': {:?} -> {:?}",
            self.db.name,
            self.db.table(id).name,
            from,
            to
        );
        self.states[id.index()] = to;
    }

    fn unfinished(&self) -> Vec<String> {
        self.states
            .iter()
            .enumerate()
            .filter(|(_, state)| !matches!(state, TableState::Dumped))
            .map(|(i, _)| format!("{}.{}", self.db.name, self.db.table(TableId(i as u32)).name))
            .collect()
    }
}
