//! CLI integration tests

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const CONFIG: &str = r#"
[[sites]]
id = "KenyaDC"
sellable_racks = 186
contract_density_kw_per_rack = 5.0
design_it_capacity_kw = 640.0
design_total_load_kw = 900.0
design_pue = 1.5
rack_footprint_m2 = 2.5
gross_white_space_m2 = 800.0
carbon_factor_t_per_kwh = 0.0004

[[sites]]
id = "UgandaDC"
sellable_racks = 200
contract_density_kw_per_rack = 5.0
design_it_capacity_kw = 800.0
design_total_load_kw = 1200.0
design_pue = 1.4
rack_footprint_m2 = 2.5
gross_white_space_m2 = 850.0
carbon_factor_t_per_kwh = 0.0001

[forecast]
metrics = ["avg_it_load_kw", "pue"]
horizons = [{ periods = 3, label = "3m" }, { periods = 6, label = "6m" }]
max_parallel_pairs = 2
"#;

fn dcap(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dcap"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute dcap")
}

fn month_end(year: i32, month: u32) -> String {
    let days = match month {
        2 if year % 4 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    };
    format!("{}-{:02}-{:02}", year, month, days)
}

/// Eight months of KenyaDC, one UgandaDC month and one unknown site
fn write_fixtures(dir: &Path) -> (PathBuf, PathBuf) {
    let config_path = dir.join("config.toml");
    fs::write(&config_path, CONFIG).unwrap();

    let mut records: Vec<serde_json::Value> = (0..8)
        .map(|i| {
            serde_json::json!({
                "site_id": "KenyaDC",
                "reporting_date": month_end(2023, i + 1),
                "total_contracted_racks": 100.0 + i as f64,
                "reserved_racks": 80.0,
                "decommissioned_racks": 5.0,
                "avg_it_load_kw": 400.0 + 10.0 * i as f64,
                "avg_total_load_kw": 600.0 + 14.0 * i as f64,
            })
        })
        .collect();
    records.push(serde_json::json!({
        "site_id": "UgandaDC",
        "reporting_date": "2023-01-31",
        "total_contracted_racks": 120.0,
        "reserved_racks": 90.0,
        "decommissioned_racks": 0.0,
        "avg_it_load_kw": 500.0,
        "avg_total_load_kw": 700.0,
    }));
    records.push(serde_json::json!({
        "site_id": "MarsDC",
        "reporting_date": "2023-01-31",
        "total_contracted_racks": 10.0,
        "reserved_racks": null,
    }));

    let input_path = dir.join("records.json");
    fs::write(&input_path, serde_json::to_string(&records).unwrap()).unwrap();
    (config_path, input_path)
}

fn read_array(path: &Path) -> Vec<serde_json::Value> {
    let content = fs::read_to_string(path).unwrap();
    serde_json::from_str(&content).unwrap()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = dcap(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("run"), "Should show run command");
    assert!(stdout.contains("enrich"), "Should show enrich command");
    assert!(stdout.contains("sites"), "Should show sites command");
    assert!(stdout.contains("--config"), "Should show config option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = dcap(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("dcap"), "Should show binary name");
}

/// Test run subcommand help
#[test]
fn test_run_help() {
    let output = dcap(&["run", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--input"));
    assert!(stdout.contains("--output"));
    assert!(stdout.contains("--metrics-out"));
}

#[test]
fn test_sites_json() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, _) = write_fixtures(dir.path());

    let output = dcap(&["--config", config_path.to_str().unwrap(), "--format", "json", "sites"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let sites: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(sites.len(), 2);
    assert_eq!(sites[0]["site_id"], "KenyaDC");
    assert_eq!(sites[0]["sellable_racks"], 186);
}

#[test]
fn test_sites_table() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, _) = write_fixtures(dir.path());

    let output = dcap(&["--config", config_path.to_str().unwrap(), "sites"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("KenyaDC"));
    assert!(stdout.contains("UgandaDC"));
}

#[test]
fn test_missing_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");

    let output = dcap(&["--config", missing.to_str().unwrap(), "sites"]);
    assert!(!output.status.success(), "Missing config should fail");
    assert!(String::from_utf8_lossy(&output.stderr).contains("not found"));
}

#[test]
fn test_invalid_site_constant_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, CONFIG.replace("design_pue = 1.4", "design_pue = 0.9")).unwrap();

    let output = dcap(&["--config", config_path.to_str().unwrap(), "sites"]);
    assert!(!output.status.success(), "PUE target below 1 should be rejected");
}

#[test]
fn test_enrich_json() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, input_path) = write_fixtures(dir.path());

    let output = dcap(&[
        "--config",
        config_path.to_str().unwrap(),
        "--format",
        "json",
        "enrich",
        "--input",
        input_path.to_str().unwrap(),
    ]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["enriched"].as_array().unwrap().len(), 9);
    let rejected = report["rejected"].as_array().unwrap();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["site_id"], "MarsDC");
    assert_eq!(rejected[0]["kind"], "configuration");

    let first = &report["enriched"][0];
    assert_eq!(first["hours_in_period"], 744.0);
    assert_eq!(first["rack_utilization_pct"], 85.0);
}

#[test]
fn test_run_writes_all_tables() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, input_path) = write_fixtures(dir.path());
    let out_dir = dir.path().join("out");
    let metrics_path = dir.path().join("metrics.prom");

    let output = dcap(&[
        "--config",
        config_path.to_str().unwrap(),
        "--format",
        "json",
        "run",
        "--input",
        input_path.to_str().unwrap(),
        "--output",
        out_dir.to_str().unwrap(),
        "--metrics-out",
        metrics_path.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "Per-pair failures must not fail the run: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    for name in [
        "enriched_monthly.json",
        "forecast.json",
        "forecast_quality.json",
        "forecast_anomalies.json",
        "capacity_alerts.json",
        "diagnostics.json",
    ] {
        assert!(out_dir.join(name).exists(), "{} should be written", name);
    }

    // KenyaDC: 2 metrics x (8 history + 3 ahead + 8 history + 6 ahead)
    let forecasts = read_array(&out_dir.join("forecast.json"));
    assert_eq!(forecasts.len(), 2 * (11 + 14));
    assert!(forecasts.iter().all(|f| f["site_id"] == "KenyaDC"));

    let quality = read_array(&out_dir.join("forecast_quality.json"));
    assert_eq!(quality.len(), 4);
    assert!(quality
        .iter()
        .filter(|q| q["site_id"] == "UgandaDC")
        .all(|q| q["mape"].is_null()));

    let diagnostics = read_array(&out_dir.join("diagnostics.json"));
    assert!(diagnostics.iter().any(|d| d["site_id"] == "MarsDC"));
    assert!(diagnostics
        .iter()
        .any(|d| d["site_id"] == "UgandaDC" && d["kind"] == "insufficient_history"));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["enriched"], 9);
    assert_eq!(report["summary"]["rejected"], 1);

    let metrics = fs::read_to_string(&metrics_path).unwrap();
    assert!(metrics.contains("dcap_records_enriched_total 9"));
    assert!(metrics.contains("dcap_engine_fit_latency_seconds"));
}

#[test]
fn test_env_override_applies() {
    let dir = tempfile::tempdir().unwrap();
    let (config_path, input_path) = write_fixtures(dir.path());
    let out_dir = dir.path().join("out");

    let output = Command::new(env!("CARGO_BIN_EXE_dcap"))
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "--format",
            "json",
            "run",
            "--input",
            input_path.to_str().unwrap(),
            "--output",
            out_dir.to_str().unwrap(),
        ])
        .env("RUST_LOG", "warn")
        .env("DCAP__FORECAST__MAX_PARALLEL_PAIRS", "0")
        .output()
        .expect("Failed to execute dcap");

    assert!(
        !output.status.success(),
        "Zero parallel pairs from the environment should be rejected"
    );
}
