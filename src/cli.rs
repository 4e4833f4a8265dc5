// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use berth::output::OutputMode;
use berth::types::ImageRef;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "berth")]
#[command(about = "Drive Docker or Podman containers through a bounded, self-cleaning lifecycle")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a berth.yml template to the current directory
    Init {
        /// Overwrite an existing berth.yml
        #[arg(short, long)]
        force: bool,
    },

    /// Run the demonstration lifecycle against the local runtime
    Run {
        /// Base image for the echo, worker, and build scenarios
        #[arg(long, value_parser = parse_image)]
        image: Option<ImageRef>,

        /// Tag for the image built by the build scenario
        #[arg(long, value_parser = parse_image)]
        tag: Option<ImageRef>,

        /// Output format: normal, quiet, or json
        #[arg(short, long, default_value = "normal")]
        output: OutputMode,

        /// Config file (defaults to berth.yml in the current directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn parse_image(value: &str) -> Result<ImageRef, String> {
    ImageRef::parse(value).map_err(|e| e.to_string())
}
