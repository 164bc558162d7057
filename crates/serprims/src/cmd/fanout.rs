use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use serde::Serialize;
use serprims_transport::{
    ByteSink, DataOutput, DestinationId, ParallelSplitter, SplitterConfig, StreamSplitter,
    TransportError,
};
use tracing::{info, warn};

use crate::cmd::{demo, FanoutArgs};
use crate::config::Settings;
use crate::exit::{transport_error, CliError, CliResult, SUCCESS, TRANSPORT_ERROR, USAGE};
use crate::output::{new_table, print_json, OutputFormat};

#[derive(Serialize)]
struct DestinationReport {
    path: String,
    ok: bool,
    bytes_written: u64,
    error: Option<String>,
}

#[derive(Serialize)]
struct FanoutOutput {
    schema_id: &'static str,
    mode: &'static str,
    stream_bytes: usize,
    chunks: usize,
    destinations: Vec<DestinationReport>,
}

type FileSink = ByteSink<File>;

pub fn run(args: FanoutArgs, format: OutputFormat, settings: &Settings) -> CliResult<i32> {
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be greater than zero"));
    }

    let mut config: SplitterConfig = settings.splitter;
    if args.remove_on_error {
        config.remove_on_error = true;
    }
    if let Some(max) = args.max_in_flight {
        config.max_in_flight = max;
    }

    let (stream, _) = demo::encode(settings)?;

    let mut reports: Vec<Option<DestinationReport>> = Vec::with_capacity(args.outputs.len());
    let mut opened: Vec<(usize, FileSink)> = Vec::new();
    for (index, path) in args.outputs.iter().enumerate() {
        match File::create(path) {
            Ok(file) => {
                opened.push((index, ByteSink::new(file)));
                reports.push(None);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "destination not opened");
                reports.push(Some(failed_report(path, 0, format!("open: {err}"))));
            }
        }
    }

    let chunks = stream.chunks(args.chunk_size).count();
    let (mode, outcome) = if args.parallel {
        ("parallel", broadcast_parallel(&stream, args.chunk_size, config, opened)?)
    } else {
        ("sequential", broadcast_sequential(&stream, args.chunk_size, config, opened)?)
    };

    for (index, result) in outcome {
        let path = &args.outputs[index];
        reports[index] = Some(match result {
            Ok(bytes) => DestinationReport {
                path: path.display().to_string(),
                ok: true,
                bytes_written: bytes,
                error: None,
            },
            Err((bytes, error)) => failed_report(path, bytes, error),
        });
    }
    let destinations: Vec<DestinationReport> = reports.into_iter().flatten().collect();
    let failed = destinations.iter().filter(|d| !d.ok).count();
    info!(mode, destinations = destinations.len(), failed, "fan-out finished");

    let out = FanoutOutput {
        schema_id: "https://schemas.3leaps.dev/serprims/cli/v1/fanout-result.schema.json",
        mode,
        stream_bytes: stream.len(),
        chunks,
        destinations,
    };
    print_output(&out, format);

    if failed == 0 {
        Ok(SUCCESS)
    } else {
        Err(CliError::new(
            TRANSPORT_ERROR,
            format!("fan-out failed on {failed} of {} destinations", out.destinations.len()),
        ))
    }
}

fn failed_report(path: &Path, bytes: u64, error: String) -> DestinationReport {
    DestinationReport {
        path: path.display().to_string(),
        ok: false,
        bytes_written: bytes,
        error: Some(error),
    }
}

/// Per input index: bytes written, or bytes written plus the first error.
type Outcome = Vec<(usize, Result<u64, (u64, String)>)>;

/// Fold a broadcast error into per-destination first errors. Errors that are
/// not fan-out failures abort the command.
fn record(
    result: serprims_transport::Result<()>,
    errors: &mut BTreeMap<DestinationId, String>,
) -> CliResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(TransportError::FanOut(err)) => {
            for failure in err.into_failures() {
                errors
                    .entry(failure.destination)
                    .or_insert_with(|| failure.error.to_string());
            }
            Ok(())
        }
        Err(err) => Err(transport_error("fan-out", err)),
    }
}

fn settle(
    ids: Vec<(DestinationId, usize)>,
    remaining: Vec<(DestinationId, FileSink)>,
    mut errors: BTreeMap<DestinationId, String>,
) -> Outcome {
    let written: BTreeMap<DestinationId, u64> = remaining
        .into_iter()
        .map(|(id, sink)| (id, sink.bytes_written()))
        .collect();
    ids.into_iter()
        .map(|(id, index)| {
            let bytes = written.get(&id).copied().unwrap_or(0);
            let result = match errors.remove(&id) {
                Some(error) => Err((bytes, error)),
                None if written.contains_key(&id) => Ok(bytes),
                None => Err((bytes, "removed from splitter".to_string())),
            };
            (index, result)
        })
        .collect()
}

fn broadcast_sequential(
    stream: &[u8],
    chunk_size: usize,
    config: SplitterConfig,
    opened: Vec<(usize, FileSink)>,
) -> CliResult<Outcome> {
    let mut splitter = StreamSplitter::with_config(config);
    let ids: Vec<(DestinationId, usize)> = opened
        .into_iter()
        .map(|(index, sink)| (splitter.add(sink), index))
        .collect();

    let mut errors = BTreeMap::new();
    for chunk in stream.chunks(chunk_size) {
        record(splitter.write_bytes(chunk), &mut errors)?;
    }
    record(DataOutput::flush(&mut splitter), &mut errors)?;

    Ok(settle(ids, splitter.into_destinations(), errors))
}

fn broadcast_parallel(
    stream: &[u8],
    chunk_size: usize,
    config: SplitterConfig,
    opened: Vec<(usize, FileSink)>,
) -> CliResult<Outcome> {
    let splitter = ParallelSplitter::with_config(config);
    let ids: Vec<(DestinationId, usize)> = opened
        .into_iter()
        .map(|(index, sink)| (splitter.add(sink), index))
        .collect();

    let mut errors = BTreeMap::new();
    for chunk in stream.chunks(chunk_size) {
        record(splitter.send_bytes(chunk), &mut errors)?;
    }
    record(splitter.flush_all(), &mut errors)?;

    Ok(settle(ids, splitter.into_destinations(), errors))
}

fn print_output(out: &FanoutOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(out),
        OutputFormat::Table => {
            let mut table = new_table(vec!["DESTINATION", "STATUS", "BYTES", "ERROR"]);
            for dest in &out.destinations {
                table.add_row(vec![
                    dest.path.clone(),
                    if dest.ok { "ok" } else { "failed" }.to_string(),
                    dest.bytes_written.to_string(),
                    dest.error.clone().unwrap_or_default(),
                ]);
            }
            println!(
                "{} mode, {} bytes in {} chunks",
                out.mode, out.stream_bytes, out.chunks
            );
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for dest in &out.destinations {
                let status = if dest.ok { "ok" } else { "failed" };
                println!("{} {status} bytes={}", dest.path, dest.bytes_written);
            }
        }
    }
}
