use std::fs::File;
use std::io::BufReader;

use serde::Serialize;
use serprims_graph::{GraphReader, StreamStats};

use crate::cmd::InspectArgs;
use crate::config::Settings;
use crate::exit::{graph_error, io_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{new_table, print_json, stats_line, stats_table, OutputFormat};
use crate::sample::{self, Check};

#[derive(Serialize)]
struct InspectOutput {
    schema_id: &'static str,
    path: String,
    valid: bool,
    unread_values: bool,
    checks: Vec<Check>,
    stats: StreamStats,
}

pub fn run(args: InspectArgs, format: OutputFormat, settings: &Settings) -> CliResult<i32> {
    let context = format!("read {}", args.input.display());
    let file = File::open(&args.input).map_err(|err| io_error(&context, err))?;
    let mut reader =
        GraphReader::with_config(BufReader::new(file), sample::registry(), settings.graph);

    let checks = sample::read_sample(&mut reader).map_err(|err| graph_error(&context, err))?;
    let unread_values = !reader.is_drained();
    let valid = !unread_values && checks.iter().all(|c| c.passed);

    let out = InspectOutput {
        schema_id: "https://schemas.3leaps.dev/serprims/cli/v1/inspect-result.schema.json",
        path: args.input.display().to_string(),
        valid,
        unread_values,
        checks,
        stats: reader.stats(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["CHECK", "RESULT"]);
            for check in &out.checks {
                let result = if check.passed { "ok" } else { "FAILED" };
                table.add_row(vec![check.name, result]);
            }
            table.add_row(vec!["batch fully read", if unread_values { "FAILED" } else { "ok" }]);
            println!("{table}");
            println!("{}", stats_table(&out.stats));
        }
        OutputFormat::Pretty => {
            let verdict = if valid { "valid" } else { "INVALID" };
            println!("{} {verdict} {}", out.path, stats_line(&out.stats));
        }
    }

    if valid {
        Ok(SUCCESS)
    } else {
        Err(CliError::new(
            DATA_INVALID,
            format!("{}: sample graph did not verify", out.path),
        ))
    }
}
