mod cmd;
mod config;
mod exit;
mod logging;
mod output;
mod sample;

use std::path::PathBuf;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "serprims", version, about = "Binary serialization primitives CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    /// JSON settings file (byte order, buffer sizes, fan-out limits).
    #[arg(long, value_name = "FILE", global = true, env = "SERPRIMS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = config::load_settings(cli.config.as_deref())
        .and_then(|settings| cmd::run(cli.command, format, &settings));

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_subcommand() {
        let cli = Cli::try_parse_from(["serprims", "demo", "/tmp/sample.bin"])
            .expect("demo args should parse");
        assert!(matches!(cli.command, Command::Demo(_)));
    }

    #[test]
    fn parses_fanout_flags() {
        let cli = Cli::try_parse_from([
            "serprims",
            "fanout",
            "/tmp/a.bin",
            "/tmp/b.bin",
            "--parallel",
            "--max-in-flight",
            "2",
            "--chunk-size",
            "64",
        ])
        .expect("fanout args should parse");

        let Command::Fanout(args) = cli.command else {
            panic!("expected fanout");
        };
        assert_eq!(args.outputs.len(), 2);
        assert!(args.parallel);
        assert_eq!(args.max_in_flight, Some(2));
        assert_eq!(args.chunk_size, 64);
    }

    #[test]
    fn fanout_requires_a_destination() {
        let err = Cli::try_parse_from(["serprims", "fanout"])
            .expect_err("fanout without outputs should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from([
            "serprims",
            "inspect",
            "/tmp/sample.bin",
            "--config",
            "/tmp/serprims.json",
        ])
        .expect("inspect args should parse");
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/serprims.json")));
        assert!(matches!(cli.command, Command::Inspect(_)));
    }
}
