mod dump;
mod plan;
mod validate;

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use trimdump::config::{ConnectionSettings, DumpConfig};
use trimdump::logging::init_logging;
use trimdump::schema::SchemaSource;

#[derive(Parser)]
#[command(name = "trimdump")]
#[command(author = "Helge Sverre <helge.sverre@gmail.com>")]
#[command(version)]
#[command(about = "Extract a filtered, anonymized, dependency-ordered subset of MySQL tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Connection overrides; each flag wins over the config file
#[derive(Args, Clone, Debug, Default)]
pub struct ConnectionArgs {
    /// Server host
    #[arg(long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// User name
    #[arg(short, long)]
    pub user: Option<String>,

    /// Password
    #[arg(short, long)]
    pub password: Option<String>,

    /// Unix socket (takes precedence over host/port)
    #[arg(short = 'S', long)]
    pub socket: Option<String>,
}

impl ConnectionArgs {
    fn apply(&self, settings: &mut ConnectionSettings) {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(user) = &self.user {
            settings.user = user.clone();
        }
        if self.password.is_some() {
            settings.password = self.password.clone();
        }
        if self.socket.is_some() {
            settings.socket = self.socket.clone();
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Dump the configured tables as anonymized SQL
    Dump {
        /// YAML configuration file
        config: PathBuf,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Output SQL file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// mysqldump binary name or path
        #[arg(long)]
        binpath: Option<String>,

        /// Run-wide timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Maximum number of tables dumped at once
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Keep dumping independent tables after a failure
        #[arg(long)]
        continue_on_error: bool,

        /// Print run statistics as JSON
        #[arg(long)]
        json: bool,

        /// Extra arguments passed to mysqldump (after `--`)
        #[arg(last = true)]
        extra_args: Vec<String>,
    },

    /// Show dump order and compiled filters without extracting anything
    Plan {
        /// YAML configuration file
        config: PathBuf,

        #[command(flatten)]
        connection: ConnectionArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check the configuration against the live schema
    Validate {
        /// YAML configuration file
        config: PathBuf,

        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Dump {
            config,
            connection,
            output,
            binpath,
            timeout,
            max_concurrency,
            continue_on_error,
            json,
            extra_args,
        } => {
            let mut config = load_config(&config, &connection)?;
            if let Some(binpath) = binpath {
                config.binpath = binpath;
            }
            if let Some(timeout) = timeout {
                config.timeout_secs = timeout;
            }
            if max_concurrency.is_some() {
                config.max_concurrency = max_concurrency;
            }
            if continue_on_error {
                config.failure_mode = trimdump::dumper::FailureMode::Continue;
            }
            config.extra_args.extend(extra_args);
            dump::run(config, output, json).await
        }
        Commands::Plan {
            config,
            connection,
            json,
        } => plan::run(load_config(&config, &connection)?, json).await,
        Commands::Validate { config, connection } => {
            validate::run(load_config(&config, &connection)?).await
        }
    }
}

fn load_config(path: &Path, connection: &ConnectionArgs) -> anyhow::Result<DumpConfig> {
    let mut config = DumpConfig::load(path)?;
    connection.apply(&mut config.connection);
    if config.databases.is_empty() {
        anyhow::bail!("no databases configured in {}", path.display());
    }
    Ok(config)
}

#[cfg(feature = "mysql")]
fn schema_source(config: &DumpConfig) -> anyhow::Result<trimdump::schema::source::MySqlSchemaSource> {
    Ok(trimdump::schema::source::MySqlSchemaSource::connect(
        &config.connection,
    ))
}

#[cfg(not(feature = "mysql"))]
fn schema_source(_config: &DumpConfig) -> anyhow::Result<trimdump::schema::MemorySchemaSource> {
    anyhow::bail!("trimdump was built without the 'mysql' feature; schema introspection is unavailable")
}

/// Resolve every database in the config against the live schema
async fn configure(config: &DumpConfig) -> anyhow::Result<Vec<trimdump::schema::Database>> {
    let source = schema_source(config)?;
    let result = trimdump::configure(&config.databases, &source as &dyn SchemaSource).await;
    #[cfg(feature = "mysql")]
    source.close().await;
    Ok(result?)
}
