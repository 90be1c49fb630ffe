use clap::Parser;
use tracing::info;
use tracing::Level;
use vidscrape::cli::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // logs go to stderr; stdout carries the JSON
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    info!("Starting vidscrape v{}", env!("CARGO_PKG_VERSION"));

    cli.run().await?;

    Ok(())
}
