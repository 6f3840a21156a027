use serde::Serialize;
use trimdump::config::DumpConfig;
use trimdump::filter::QueryBuilder;
use trimdump::schema::Database;

#[derive(Debug, Serialize)]
struct DatabasePlan {
    name: String,
    destination: String,
    tables: Vec<TablePlan>,
}

#[derive(Debug, Serialize)]
struct TablePlan {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    destination: Option<String>,
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    where_clause: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    order: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    limit: Option<u64>,
    rules: Vec<String>,
}

pub async fn run(config: DumpConfig, json: bool) -> anyhow::Result<()> {
    let databases = super::configure(&config).await?;
    let plans = databases
        .iter()
        .map(plan_database)
        .collect::<anyhow::Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plans)?);
        return Ok(());
    }

    for plan in &plans {
        if plan.destination == plan.name {
            println!("Database {}", plan.name);
        } else {
            println!("Database {} -> {}", plan.name, plan.destination);
        }
        for (i, table) in plan.tables.iter().enumerate() {
            print!("  {}. {}", i + 1, table.name);
            if let Some(destination) = &table.destination {
                print!(" -> {}", destination);
            }
            println!();
            if !table.depends_on.is_empty() {
                println!("       after: {}", table.depends_on.join(", "));
            }
            if let Some(clause) = &table.where_clause {
                println!("       where: {}", clause);
            }
            if let Some(order) = &table.order {
                println!("       order: {}", order);
            }
            if let Some(limit) = table.limit {
                println!("       limit: {}", limit);
            }
            if !table.rules.is_empty() {
                println!("       rules: {}", table.rules.join(", "));
            }
        }
    }

    Ok(())
}

fn plan_database(db: &Database) -> anyhow::Result<DatabasePlan> {
    let builder = QueryBuilder::new(db);
    let mut tables = Vec::with_capacity(db.len());

    for id in db.dump_order() {
        let table = db.table(id);
        tables.push(TablePlan {
            name: table.name.clone(),
            destination: table.destination.clone(),
            depends_on: db
                .graph
                .parents(id)
                .iter()
                .map(|&p| db.table(p).name.clone())
                .collect(),
            where_clause: builder.where_clause(id)?,
            order: table.order.clone(),
            limit: table.limit,
            rules: table
                .rules
                .iter()
                .map(|r| format!("{}({})", r.name(), r.columns().join(", ")))
                .collect(),
        });
    }

    Ok(DatabasePlan {
        name: db.name.clone(),
        destination: db.destination.clone(),
        tables,
    })
}
