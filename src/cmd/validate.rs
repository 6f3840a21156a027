use trimdump::config::DumpConfig;

pub async fn run(config: DumpConfig) -> anyhow::Result<()> {
    let databases = super::configure(&config).await?;

    for db in &databases {
        let edges: usize = db.tables().map(|t| db.graph.parents(t.id).len()).sum();
        eprintln!(
            "{}: {} table(s), {} dependency edge(s)",
            db.name,
            db.len(),
            edges
        );
    }
    eprintln!("Configuration is valid");

    Ok(())
}
