use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::TempDir;

fn hyperfield(root: &Path, args: &[&str]) -> Output {
    let config_dir = root.join("config");
    let data_dir = root.join("data");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(&data_dir).unwrap();

    Command::new(env!("CARGO_BIN_EXE_hyperfield"))
        .env("HYPERFIELD_CONFIG_DIR", &config_dir)
        .env("HYPERFIELD_DATA_DIR", &data_dir)
        .env_remove("HYPERFIELD_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run hyperfield")
}

fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "hyperfield failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

#[test]
fn fragments_lists_builtins() {
    let root = TempDir::new().unwrap();
    let output = hyperfield(root.path(), &["fragments"]);
    assert!(output.status.success());

    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains("hypercube"));
    assert!(listing.contains("stereographic"));
    assert!(listing.contains("builtin"));
}

#[test]
fn headless_run_applies_command_line_parameters() {
    let root = TempDir::new().unwrap();
    let output = hyperfield(
        root.path(),
        &[
            "--headless",
            "--frames",
            "5",
            "--tier",
            "high",
            "--geometry",
            "duocylinder",
            "--set",
            "gridDensity=4",
            "--dump-state",
        ],
    );
    let report = stdout_json(&output);

    assert_eq!(report["frames"], 5);
    assert_eq!(report["tier"], "high");
    assert_eq!(report["quality"], 1.0);
    assert_eq!(report["state"]["geometry"], "duocylinder");
    assert_eq!(report["state"]["projection"], "perspective");
    assert_eq!(report["state"]["gridDensity"], 4.0);
}

#[test]
fn slow_headless_run_degrades_to_low() {
    let root = TempDir::new().unwrap();
    let output = hyperfield(
        root.path(),
        &[
            "--headless",
            "--fps",
            "10",
            "--frames",
            "120",
            "--tier",
            "ultra",
            "--dump-state",
        ],
    );
    let report = stdout_json(&output);

    assert_eq!(report["tier"], "low");
    assert_eq!(report["quality"], 0.5);
}

#[test]
fn no_adaptive_keeps_the_starting_tier() {
    let root = TempDir::new().unwrap();
    let output = hyperfield(
        root.path(),
        &[
            "--headless",
            "--fps",
            "10",
            "--frames",
            "120",
            "--tier",
            "ultra",
            "--no-adaptive",
            "--dump-state",
        ],
    );
    let report = stdout_json(&output);

    assert_eq!(report["tier"], "ultra");
    assert_eq!(report["quality"], 1.0);
}

#[test]
fn probe_reports_a_tier() {
    let root = TempDir::new().unwrap();
    let output = hyperfield(
        root.path(),
        &["probe", "--json", "--headless", "--frames", "2"],
    );
    let report = stdout_json(&output);

    let tier = report["tier"].as_str().expect("tier string");
    assert!(["low", "medium", "high", "ultra"].contains(&tier));
    assert!(report["score"].is_i64());
    assert!(report["capabilities"]["cpu_score"].is_u64());
}

#[test]
fn unknown_geometry_is_rejected() {
    let root = TempDir::new().unwrap();
    let output = hyperfield(
        root.path(),
        &["--headless", "--tier", "low", "--geometry", "klein-bottle"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("klein-bottle"), "stderr: {stderr}");
}

#[test]
fn configured_pack_joins_the_library() {
    let root = TempDir::new().unwrap();
    let config_dir = root.path().join("config");
    let pack_dir = config_dir.join("demo");
    fs::create_dir_all(&pack_dir).unwrap();
    fs::write(
        pack_dir.join("fragments.toml"),
        "name = \"demo\"\n\n[[geometries]]\nname = \"ripple\"\nsource = \"ripple.glsl\"\ndescription = \"Concentric ripples\"\n",
    )
    .unwrap();
    fs::write(
        pack_dir.join("ripple.glsl"),
        "float geometryLattice(vec4 p, float density, float thickness) { return 0.0; }\n",
    )
    .unwrap();
    fs::write(
        config_dir.join("hyperfield.toml"),
        "version = 1\n\n[fragments]\npacks = [\"demo\"]\n",
    )
    .unwrap();

    let output = hyperfield(root.path(), &["fragments"]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    let listing = String::from_utf8_lossy(&output.stdout);
    assert!(listing.contains("ripple"));
    assert!(listing.contains("pack:demo"));
}
