use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    docmirror::logging::init().context("init logging")?;

    let cli = docmirror::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        docmirror::cli::Command::Download(args) => {
            docmirror::crawl::run(args).await.context("download")?;
        }
        docmirror::cli::Command::Bulk(args) => {
            docmirror::crawl::run_bulk(args).await.context("bulk")?;
        }
    }

    Ok(())
}
