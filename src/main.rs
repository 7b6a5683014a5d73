mod chapters;
mod cli;
mod commands;
mod config;
mod mcp;
mod page_range;
mod pdf;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use config::SplitConfig;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        error!("{err}");
        for cause in err.chain().skip(1) {
            error!("caused by: {cause}");
        }
        std::process::exit(1);
    }
}

/// Logs go to stderr so stdout stays clean for results and the MCP transport.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Mcp => {
            mcp::run_server().await?;
        }
        Commands::Info { path } => {
            commands::info::run(&path)?;
        }
        Commands::Toc { path, json, engine } => {
            let config = SplitConfig::from_args(&engine)?;
            commands::toc::run(&path, &config, json)?;
        }
        Commands::Offset { path, json, engine } => {
            let config = SplitConfig::from_args(&engine)?;
            commands::offset::run(&path, &config, json)?;
        }
        Commands::Split {
            path,
            output_dir,
            anchor,
            last_printed_page,
            no_prompt,
            no_reports,
            engine,
        } => {
            let mut config = SplitConfig::from_args(&engine)?;
            if let Some(dir) = output_dir {
                config.output_dir = dir;
            }
            if anchor.is_some() {
                config.anchor = anchor;
            }
            if last_printed_page.is_some() {
                config.last_printed_page = last_printed_page;
            }
            if no_prompt {
                config.prompt = false;
            }
            if no_reports {
                config.write_reports = false;
            }
            commands::split::run(&path, &config)?;
        }
    }

    Ok(())
}
