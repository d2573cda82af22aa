use anyhow::{Context, Result};
use bitmap_vectorizer::cli::Cli;
use bitmap_vectorizer::Pipeline;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = cli.into_config().context("Invalid arguments")?;
    debug!("Resolved configuration: {:?}", config);

    let summary = Pipeline::new()
        .run(&config)
        .with_context(|| format!("Failed to vectorize {}", config.input.display()))?;

    println!("{}", summary);
    Ok(())
}

/// Logs go to stderr so stdout only carries the summary line
fn init_logging(cli: &Cli) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
