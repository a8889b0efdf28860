use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

fn driftkit(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("driftkit").unwrap();
    cmd.env("DRIFTKIT_CONFIG_DIR", config_dir).arg("--no-color");
    cmd
}

#[test]
fn test_no_subcommand_fails() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path()).assert().failure();
}

#[test]
fn test_targets_filtered_by_provider_and_continent() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["targets", "--provider", "aws", "--continent", "europe", "-f", "simple"])
        .assert()
        .success()
        .stdout(contains("aws-eu-west-1"))
        .stdout(contains("aws-eu-central-1"))
        .stdout(contains("gcp-").not())
        .stdout(contains("aws-us-east-1").not());
}

#[test]
fn test_targets_json_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = driftkit(dir.path())
        .args(["targets", "--provider", "oracle", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let v: serde_json::Value = serde_json::from_slice(&out).unwrap();
    let list = v.as_array().unwrap();
    assert!(!list.is_empty());
    assert!(list.iter().all(|t| t["provider"] == "Oracle"));
}

#[test]
fn test_unknown_provider_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["targets", "--provider", "hetzner"])
        .assert()
        .failure()
        .stderr(contains("unknown provider"));
}

#[test]
fn test_config_set_show_unset() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["config", "set", "batch_size", "4"])
        .assert()
        .success()
        .stdout(contains("batch_size = 4"));
    driftkit(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(contains("batch_size = 4"));
    driftkit(dir.path())
        .args(["config", "unset", "batch_size"])
        .assert()
        .success()
        .stdout(contains("Removed"));
}

#[test]
fn test_config_rejects_invalid_value() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["config", "set", "format", "xml"])
        .assert()
        .code(4)
        .stdout(contains("Error:"));
}

#[test]
fn test_custom_catalog_file() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = dir.path().join("targets.toml");
    std::fs::write(
        &catalog,
        r#"
[[targets]]
id = "lab-router"
provider = "Contabo"
region = "lab"
position = "Basement"
continent = "Europe"
country = "NL"
url = "http://192.0.2.1/favicon.ico"
"#,
    )
    .unwrap();
    driftkit(dir.path())
        .args(["targets", "-f", "simple", "--catalog"])
        .arg(&catalog)
        .assert()
        .success()
        .stdout(contains("lab-router"));
}

#[test]
fn test_latency_without_matching_targets() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["latency", "--provider", "contabo", "--continent", "africa"])
        .assert()
        .code(4)
        .stdout(contains("no targets match"));
}

#[test]
fn test_clock_rejects_out_of_range_durations() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["clock", "--timeout", "1e300"])
        .assert()
        .code(4)
        .stdout(contains("out of range"));
    driftkit(dir.path())
        .args(["clock", "--watch", "--interval", "1e-12"])
        .assert()
        .code(4)
        .stdout(contains("interval"));
}

#[test]
fn test_config_file_timeout_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "[defaults]\ntimeout = 1e300\n").unwrap();
    driftkit(dir.path())
        .args(["clock"])
        .assert()
        .code(4)
        .stdout(contains("timeout"));
}

#[cfg(feature = "network-tests")]
#[test]
fn test_clock_against_default_source() {
    let dir = tempfile::tempdir().unwrap();
    driftkit(dir.path())
        .args(["clock"])
        .assert()
        .success()
        .stdout(contains("Clock Offset:"));
}
