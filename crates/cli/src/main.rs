mod commands;

use anyhow::Result;
use clap::Parser;
use std::fs::{self, OpenOptions};

use scoreboard_core::{
    config::{self, AppConfig},
    ScoreboardDocument,
};
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;

    let path = cli
        .document
        .clone()
        .unwrap_or_else(|| config.document_path.clone());
    let mut document = ScoreboardDocument::open(path)?;

    commands::run(cli.command, &config, &mut document).await?;

    if document.is_dirty() {
        document.save()?;
        info!(
            "saved {} changes to {}",
            document.serial(),
            document.path().display()
        );
    }
    Ok(())
}

fn init_logging() -> Result<()> {
    let log_dir = config::data_dir().join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join("scoreboard.log");

    let env_filter = EnvFilter::from_default_env();

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(move || {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("failed to open log file")
        });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(())
}
