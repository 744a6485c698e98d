use std::process::Command;

use eyre::Context as _;

#[test]
fn doctor_json_runs_and_returns_valid_json() -> eyre::Result<()> {
    let exe = assert_cmd::cargo::cargo_bin!("blendmcp");

    let cfg_dir = tempfile::tempdir()?;
    let data_dir = tempfile::tempdir()?;

    let out = Command::new(exe)
        .env("BLENDMCP_CONFIG_DIR", cfg_dir.path())
        .env("BLENDMCP_DATA_DIR", data_dir.path())
        .args(["doctor", "--json"])
        .output()
        .context("run blendmcp doctor --json")?;

    assert!(
        out.status.success(),
        "doctor exited non-zero: status={:?}, stderr={}",
        out.status.code(),
        String::from_utf8_lossy(&out.stderr)
    );

    let v: serde_json::Value = serde_json::from_slice(&out.stdout).context("parse doctor json")?;
    assert_eq!(v.get("ok").and_then(serde_json::Value::as_bool), Some(true));
    assert!(v.get("version").and_then(|x| x.as_str()).is_some());
    assert!(v.get("paths").and_then(|x| x.as_object()).is_some());
    assert_eq!(
        v.pointer("/tokens")
            .and_then(|x| x.as_array())
            .map(Vec::len),
        Some(5),
        "five supported tokens expected"
    );
    Ok(())
}

#[test]
fn doctor_reports_a_parse_failure_without_failing() -> eyre::Result<()> {
    let exe = assert_cmd::cargo::cargo_bin!("blendmcp");

    let cfg_dir = tempfile::tempdir()?;
    let data_dir = tempfile::tempdir()?;
    std::fs::write(cfg_dir.path().join("config.toml"), "rpc = \"not a table\"")
        .context("write broken config")?;

    let out = Command::new(exe)
        .env("BLENDMCP_CONFIG_DIR", cfg_dir.path())
        .env("BLENDMCP_DATA_DIR", data_dir.path())
        .args(["doctor", "--json"])
        .output()
        .context("run blendmcp doctor --json")?;

    assert!(out.status.success(), "doctor must not fail on bad config");
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).context("parse doctor json")?;
    assert_eq!(
        v.pointer("/config/parse_ok")
            .and_then(serde_json::Value::as_bool),
        Some(false)
    );
    assert!(v.pointer("/config/error").is_some());
    Ok(())
}
