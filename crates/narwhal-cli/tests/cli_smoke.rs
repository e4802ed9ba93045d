use assert_cmd::Command;
use serde_json::Value;
use std::fs;

const RING: &str = r#"{
  "nodes": ["A", "B", "C", "D"],
  "edges": [["A", "B"], ["B", "C"], {"source": "C", "target": "D"}, ["D", "A"]]
}"#;

fn cli() -> Command {
    Command::new(assert_cmd::cargo_bin!("narwhal-cli"))
}

fn chain_json(n: usize) -> String {
    let nodes: Vec<String> = (0..n).map(|i| format!("\"n{i}\"")).collect();
    let edges: Vec<String> = (1..n).map(|i| format!("[\"n{}\", \"n{i}\"]", i - 1)).collect();
    format!(
        "{{\"nodes\": [{}], \"edges\": [{}]}}",
        nodes.join(","),
        edges.join(",")
    )
}

#[test]
fn cli_lays_out_a_graph_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let input = tmp.path().join("ring.json");
    fs::write(&input, RING).expect("write graph");

    let output = cli()
        .args(["layout", "--seed", "3", input.to_string_lossy().as_ref()])
        .output()
        .expect("run narwhal-cli");
    assert!(output.status.success(), "{output:?}");

    let v: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(v["status"], "completed");
    let positions = v["positions"].as_object().expect("positions object");
    assert_eq!(positions.len(), 4);
    for p in positions.values() {
        assert!(p["x"].is_f64() && p["y"].is_f64() && p["z"].is_f64());
    }
    assert!(v["stats"]["levels"].is_array());
    assert!(v["stats"]["elapsedMs"].is_f64());
}

#[test]
fn cli_reads_stdin_and_writes_out_file() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let out = tmp.path().join("layout.json");

    cli()
        .args(["--pretty", "--out", out.to_string_lossy().as_ref(), "-"])
        .write_stdin(RING)
        .assert()
        .success();

    let text = fs::read_to_string(&out).expect("read output");
    assert!(text.contains('\n'));
    let v: Value = serde_json::from_str(&text).expect("json output");
    assert_eq!(v["positions"].as_object().map(|m| m.len()), Some(4));
}

#[test]
fn cli_applies_config_file_and_flag_overrides() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let config = tmp.path().join("params.json");
    fs::write(&config, r#"{"coarseningThreshold": 2, "annealIterations": 10}"#)
        .expect("write config");

    let output = cli()
        .args(["--config", config.to_string_lossy().as_ref(), "--iterations", "20"])
        .write_stdin(RING)
        .output()
        .expect("run narwhal-cli");
    assert!(output.status.success(), "{output:?}");

    let v: Value = serde_json::from_slice(&output.stdout).expect("json output");
    let levels = v["stats"]["levels"].as_array().expect("levels");
    assert_eq!(levels.len(), 2);
    assert_eq!(levels[0]["iterations"], 20);
    assert_eq!(levels[1]["iterations"], 10);
    assert_eq!(v["stats"]["anneal"]["iterations"], 10);
}

#[test]
fn cli_prints_the_coarsening_hierarchy() {
    let output = cli()
        .args(["hierarchy", "--threshold", "2"])
        .write_stdin(RING)
        .output()
        .expect("run narwhal-cli");
    assert!(output.status.success(), "{output:?}");

    let v: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(v["depth"], 1);
    assert_eq!(v["levels"][0]["nodes"], 4);
    assert_eq!(v["levels"][1]["nodes"], 2);
    assert_eq!(v["levels"][1]["edges"], 1);
}

#[test]
fn cli_rejects_unknown_endpoints() {
    cli()
        .write_stdin(r#"{"nodes": ["a"], "edges": [["a", "ghost"]]}"#)
        .assert()
        .code(1);
}

#[test]
fn cli_rejects_unknown_flags() {
    cli().arg("--bogus").assert().code(2);
    cli().args(["--k"]).assert().code(2);
}

#[test]
fn cli_timeout_writes_partial_layout() {
    let output = cli()
        .args(["--timeout-ms", "50", "--iterations", "1000000"])
        .write_stdin(chain_json(300))
        .output()
        .expect("run narwhal-cli");
    assert_eq!(output.status.code(), Some(3), "{output:?}");

    let v: Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(v["status"], "cancelled");
    assert_eq!(v["positions"].as_object().map(|m| m.len()), Some(300));
}
