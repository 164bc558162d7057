use std::fs::File;
use std::path::Path;

use serde::Serialize;
use serprims_graph::{GraphWriter, StreamStats};
use tracing::info;

use crate::cmd::DemoArgs;
use crate::config::Settings;
use crate::exit::{graph_error, io_error, CliResult, SUCCESS};
use crate::output::{print_json, stats_line, stats_table, OutputFormat};
use crate::sample;

#[derive(Serialize)]
struct DemoOutput {
    schema_id: &'static str,
    path: String,
    stats: StreamStats,
}

pub fn run(args: DemoArgs, format: OutputFormat, settings: &Settings) -> CliResult<i32> {
    let stats = write_file(&args.output, settings)?;
    info!(path = %args.output.display(), bytes = stats.bytes, "sample written");

    let out = DemoOutput {
        schema_id: "https://schemas.3leaps.dev/serprims/cli/v1/demo-result.schema.json",
        path: args.output.display().to_string(),
        stats,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => {
            println!("wrote {}", out.path);
            println!("{}", stats_table(&out.stats));
        }
        OutputFormat::Pretty => println!("{} {}", out.path, stats_line(&out.stats)),
    }
    Ok(SUCCESS)
}

fn write_file(path: &Path, settings: &Settings) -> CliResult<StreamStats> {
    let file = File::create(path)
        .map_err(|err| io_error(&format!("create {}", path.display()), err))?;
    let mut writer = GraphWriter::with_config(file, sample::registry(), settings.graph);
    sample::write_sample(&mut writer).map_err(|err| graph_error("write sample", err))?;
    Ok(writer.stats())
}

/// Encode the sample into memory, for commands that need the raw stream.
pub fn encode(settings: &Settings) -> CliResult<(Vec<u8>, StreamStats)> {
    let mut writer = GraphWriter::with_config(Vec::new(), sample::registry(), settings.graph);
    sample::write_sample(&mut writer).map_err(|err| graph_error("write sample", err))?;
    let stats = writer.stats();
    Ok((writer.into_inner(), stats))
}
