use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::config::Settings;
use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod demo;
pub mod fanout;
pub mod inspect;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write the sample object graph to a file.
    Demo(DemoArgs),
    /// Read a sample file back and verify its graph.
    Inspect(InspectArgs),
    /// Write the sample stream to several files through a splitter.
    Fanout(FanoutArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat, settings: &Settings) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format, settings),
        Command::Inspect(args) => inspect::run(args, format, settings),
        Command::Fanout(args) => fanout::run(args, format, settings),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// File to write.
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// File written by `demo` or `fanout`.
    pub input: PathBuf,
}

#[derive(Args, Debug)]
pub struct FanoutArgs {
    /// Destination files.
    #[arg(required = true)]
    pub outputs: Vec<PathBuf>,
    /// Write to every destination concurrently.
    #[arg(long)]
    pub parallel: bool,
    /// Drop a destination after its first failure.
    #[arg(long)]
    pub remove_on_error: bool,
    /// Maximum concurrent writers with --parallel.
    #[arg(long, value_name = "N")]
    pub max_in_flight: Option<usize>,
    /// Bytes per broadcast write.
    #[arg(long, value_name = "BYTES", default_value = "4096")]
    pub chunk_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
