use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serprims_graph::StreamStats;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

/// Counter rows shared by the demo and inspect commands.
pub fn stats_rows(stats: &StreamStats) -> Vec<(&'static str, u64)> {
    vec![
        ("objects", stats.objects),
        ("unshared", stats.unshared),
        ("back references", stats.back_references),
        ("nulls", stats.nulls),
        ("types declared", stats.types_declared),
        ("epoch", stats.epoch),
        ("live handles", stats.live_handles),
        ("batches", stats.batches),
        ("bytes", stats.bytes),
    ]
}

pub fn stats_table(stats: &StreamStats) -> Table {
    let mut table = new_table(vec!["COUNTER", "VALUE"]);
    for (name, value) in stats_rows(stats) {
        table.add_row(vec![name.to_string(), value.to_string()]);
    }
    table
}

pub fn stats_line(stats: &StreamStats) -> String {
    stats_rows(stats)
        .into_iter()
        .map(|(name, value)| format!("{}={value}", name.replace(' ', "_")))
        .collect::<Vec<_>>()
        .join(" ")
}
