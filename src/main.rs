// ABOUTME: Entry point for the berth CLI application.
// ABOUTME: Parses arguments, connects to the local runtime once, and runs the demo.

mod cli;

use berth::config::{self, Config};
use berth::demo::{self, Demo};
use berth::error::{Error, Result};
use berth::output::{Output, OutputMode};
use berth::runtime::{RuntimeCli, connect_local};
use berth::types::ImageRef;
use clap::Parser;
use cli::{Cli, Commands};
use std::env;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Init { force } => init(force),
        Commands::Run {
            image,
            tag,
            output,
            config,
        } => run(image, tag, output, config).await,
    };

    if let Err(e) = result {
        // Failed runs were already reported through the output.
        if !matches!(e, Error::RunsFailed(_)) {
            eprintln!("Error: {e}");
        }
        if let Error::Runtime(runtime) = &e
            && let Some(hint) = runtime.hint()
        {
            eprintln!("Hint: {hint}");
        }
        std::process::exit(1);
    }
}

fn init(force: bool) -> Result<()> {
    let cwd = env::current_dir()?;
    let path = config::init_config(&cwd, force)?;
    println!("Created {}", path.display());
    Ok(())
}

async fn run(
    image: Option<ImageRef>,
    tag: Option<ImageRef>,
    mode: OutputMode,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => Config::load(&path)?,
        None => Config::discover(&env::current_dir()?)?,
    };
    if let Some(image) = image {
        config.base_image = image;
    }
    if let Some(tag) = tag {
        config.build_tag = tag;
    }

    let output = Output::new(mode);
    let runtime = connect_local(Some(&config.runtime)).await?;
    output.progress(&format!("Connected to {}", runtime.runtime_type()));

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cleaning up");
            on_interrupt.cancel();
        }
    });

    let reports = Demo::new(&runtime, &config, &output)
        .with_cli(RuntimeCli::for_runtime(runtime.runtime_type()))
        .with_cancellation(cancel.clone())
        .run()
        .await?;

    if cancel.is_cancelled() {
        return Err(Error::Interrupted);
    }

    match demo::verdict(&reports) {
        Ok(()) => {
            output.success(&format!("All {} runs succeeded", reports.len()));
            Ok(())
        }
        Err(e) => {
            output.error(&e.to_string());
            Err(e)
        }
    }
}
