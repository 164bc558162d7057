//! Fan-out example: one typed batch stream written to several files at once.
//!
//! Run with:
//!   cargo run --example fanout-files

use std::fs::{self, File};
use std::io::BufReader;

use serprims::batch::{BatchReader, BatchWriter};
use serprims::transport::{ByteSink, ParallelSplitter, SplitterConfig, StreamSplitter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = std::env::temp_dir().join(format!("serprims-fanout-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let paths: Vec<_> = (0..3).map(|i| dir.join(format!("copy-{i}.bin"))).collect();

    // Sequential splitter: the batch writer drives it through io::Write.
    let mut splitter = StreamSplitter::new();
    for path in &paths {
        splitter.add(ByteSink::new(File::create(path)?));
    }
    let mut writer = BatchWriter::new(splitter);
    writer.write_scalar(42i32)?;
    writer.write_scalar(2.5f64)?;
    writer.write_array(&[1u16, 2, 3, 4])?;
    writer.write_utf(Some("fanned out"))?;
    writer.flush()?;
    drop(writer);

    for path in &paths {
        let mut reader = BatchReader::new(BufReader::new(File::open(path)?));
        let answer = reader.read_scalar::<i32>()?;
        let ratio = reader.read_scalar::<f64>()?;
        let mut lanes = [0u16; 4];
        reader.read_array(&mut lanes)?;
        let text = reader.read_utf()?;
        eprintln!(
            "[{}] {answer} {ratio} {lanes:?} {text:?}",
            path.file_name().and_then(|n| n.to_str()).unwrap_or("?")
        );
    }

    // Parallel splitter: raw bytes, bounded to two writers at a time.
    let parallel = ParallelSplitter::with_config(SplitterConfig {
        max_in_flight: 2,
        ..SplitterConfig::default()
    });
    for path in &paths {
        parallel.add(ByteSink::new(File::create(path)?));
    }
    parallel.send_bytes(b"raw payload")?;
    parallel.flush_all()?;
    for (id, sink) in parallel.into_destinations() {
        eprintln!("[parallel] {id}: {} bytes", sink.bytes_written());
    }

    fs::remove_dir_all(&dir)?;
    Ok(())
}
