use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::fs::File;
use tokio::io::BufWriter;
use trimdump::config::DumpConfig;
use trimdump::dumper::{DumpOptions, DumpStats, Dumper};
use trimdump::extract::MysqlDumpExtractor;

pub async fn run(config: DumpConfig, output: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let databases = super::configure(&config).await?;
    let table_count: usize = databases.iter().map(|db| db.len()).sum();

    let extractor = MysqlDumpExtractor::new(&config.binpath, config.connection.clone())?
        .with_character_set(config.default_character_set.clone())
        .with_max_allowed_packet(config.max_allowed_packet);

    let options = DumpOptions {
        timeout: Duration::from_secs(config.timeout_secs),
        max_concurrency: config.max_concurrency,
        failure_mode: config.failure_mode,
        extra_options: config.extra_args.clone(),
        ..Default::default()
    };
    let dumper = Dumper::new(Arc::new(extractor), options);

    if !json {
        eprintln!(
            "Dumping {} table(s) from {} database(s)",
            table_count,
            databases.len()
        );
    }

    let start_time = Instant::now();
    let stats = match &output {
        Some(path) => {
            let mut writer = BufWriter::new(File::create(path).await?);
            dumper.dump(databases, &mut writer).await?
        }
        None => {
            let mut writer = BufWriter::new(tokio::io::stdout());
            dumper.dump(databases, &mut writer).await?
        }
    };
    let elapsed = start_time.elapsed();

    if json {
        let mut stderr = io::stderr();
        serde_json::to_writer_pretty(&mut stderr, &stats)?;
        writeln!(stderr)?;
    } else {
        print_stats(&stats, elapsed, output.as_ref());
    }

    Ok(())
}

fn print_stats(stats: &DumpStats, elapsed: Duration, output: Option<&PathBuf>) {
    eprintln!();
    eprintln!("Dump started {} completed in {:.3?}", stats.started_at, elapsed);
    eprintln!("  Tables dumped:        {}", stats.tables_dumped);
    eprintln!("  Statements rewritten: {}", stats.statements_rewritten);
    eprintln!("  Rows rewritten:       {}", stats.rows_rewritten);
    eprintln!("  Values rewritten:     {}", stats.values_rewritten);
    if let Some(path) = output {
        eprintln!("  Output:               {}", path.display());
    }

    for table in &stats.table_stats {
        eprintln!(
            "    {}.{}: {} statements, {} rows rewritten",
            table.database, table.name, table.statements, table.rows_rewritten
        );
    }
}
