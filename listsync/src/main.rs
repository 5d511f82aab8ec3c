use anyhow::Result;
use clap::Parser;
use listsync::{commands, init_logging, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_mode)?;

    commands::execute(cli).await
}
