#![cfg(feature = "cli")]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "serprims-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn serprims(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_serprims"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .args(args)
        .output()
        .expect("serprims should run")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp path should be utf-8")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be one JSON document")
}

#[test]
fn demo_then_inspect_verifies_the_graph() {
    let dir = unique_temp_dir("demo");
    let file = dir.join("sample.bin");

    let demo = serprims(&["demo", path_str(&file)]);
    assert!(demo.status.success(), "demo failed: {demo:?}");
    let written = stdout_json(&demo);
    assert!(written["schema_id"]
        .as_str()
        .is_some_and(|id| id.ends_with("demo-result.schema.json")));
    assert_eq!(written["stats"]["epoch"], 1);
    assert!(written["stats"]["bytes"].as_u64().is_some_and(|b| b > 0));

    let inspect = serprims(&["inspect", path_str(&file)]);
    assert!(inspect.status.success(), "inspect failed: {inspect:?}");
    let read = stdout_json(&inspect);
    assert_eq!(read["valid"], true);
    assert!(read["checks"]
        .as_array()
        .is_some_and(|checks| checks.iter().all(|c| c["passed"] == true)));
    assert_eq!(read["stats"]["epoch"], 1);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn version_prints_package_version() {
    let output = serprims(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));

    let extended = serprims(&["version", "--extended"]);
    assert!(extended.status.success());
    assert!(String::from_utf8_lossy(&extended.stdout).contains("name: serprims"));
}

#[test]
fn fanout_copies_are_each_valid() {
    for parallel in [false, true] {
        let dir = unique_temp_dir(if parallel { "fanout-par" } else { "fanout-seq" });
        let a = dir.join("a.bin");
        let b = dir.join("b.bin");

        let mut args = vec!["fanout", path_str(&a), path_str(&b), "--chunk-size", "100"];
        if parallel {
            args.push("--parallel");
        }
        let output = serprims(&args);
        assert!(output.status.success(), "fanout failed: {output:?}");
        let report = stdout_json(&output);
        let stream_bytes = report["stream_bytes"].as_u64().expect("stream_bytes");
        let destinations = report["destinations"].as_array().expect("destinations");
        assert_eq!(destinations.len(), 2);
        for dest in destinations {
            assert_eq!(dest["ok"], true);
            assert_eq!(dest["bytes_written"].as_u64(), Some(stream_bytes));
        }

        assert_eq!(
            std::fs::read(&a).expect("a readable"),
            std::fs::read(&b).expect("b readable")
        );
        for file in [&a, &b] {
            let inspect = serprims(&["inspect", path_str(file)]);
            assert!(inspect.status.success(), "inspect failed: {inspect:?}");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }
}

#[test]
fn fanout_reports_unopenable_destination() {
    let dir = unique_temp_dir("fanout-missing");
    let good = dir.join("good.bin");
    let bad = dir.join("missing-dir").join("bad.bin");

    let output = serprims(&["fanout", path_str(&good), path_str(&bad)]);
    assert_eq!(output.status.code(), Some(3));
    let report = stdout_json(&output);
    let destinations = report["destinations"].as_array().expect("destinations");
    assert_eq!(destinations[0]["ok"], true);
    assert_eq!(destinations[1]["ok"], false);

    let inspect = serprims(&["inspect", path_str(&good)]);
    assert!(inspect.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn garbage_input_is_data_invalid() {
    let dir = unique_temp_dir("garbage");
    let file = dir.join("garbage.bin");
    std::fs::write(&file, [0xffu8; 64]).expect("write garbage");

    let output = serprims(&["inspect", path_str(&file)]);
    assert_eq!(output.status.code(), Some(60));

    let empty = dir.join("empty.bin");
    std::fs::write(&empty, []).expect("write empty");
    let output = serprims(&["inspect", path_str(&empty)]);
    assert_eq!(output.status.code(), Some(60));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn byte_order_must_match_on_both_ends() {
    let dir = unique_temp_dir("byte-order");
    let config = dir.join("little.json");
    std::fs::write(&config, r#"{"byte_order":"little"}"#).expect("write config");
    let file = dir.join("little.bin");

    let demo = serprims(&["--config", path_str(&config), "demo", path_str(&file)]);
    assert!(demo.status.success(), "demo failed: {demo:?}");

    let inspect = serprims(&["--config", path_str(&config), "inspect", path_str(&file)]);
    assert!(inspect.status.success(), "inspect failed: {inspect:?}");

    let mismatched = serprims(&["inspect", path_str(&file)]);
    assert!(!mismatched.status.success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn invalid_config_exits_78() {
    let dir = unique_temp_dir("bad-config");
    let config = dir.join("bad.json");
    std::fs::write(&config, r#"{"byte_order":"middle"}"#).expect("write config");

    let output = serprims(&["--config", path_str(&config), "version"]);
    assert_eq!(output.status.code(), Some(78));

    let _ = std::fs::remove_dir_all(&dir);
}
