mod cmd;

use clap::Parser;
use cmd::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cmd::run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
