use crate::config::models::AppConfig;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[stress]
commands = ["sleep 1"]
timeout_seconds = 10

[sweep]
start_offset_seconds = 2
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.stress.commands, vec!["sleep 1".to_string()]);
    assert_eq!(config.stress.timeout_seconds, 10);
    assert_eq!(config.sweep.start_offset_seconds, 2);
}

#[test]
fn test_load_keeps_group_order() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[[sweep.parallel.zeta]]
type = "read"

[[sweep.parallel.alpha]]
type = "write"
"#
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let config = AppConfig::load(Some(&path)).unwrap();
    let groups: Vec<&str> = config.sweep.parallel.keys().map(String::as_str).collect();
    assert_eq!(groups, vec!["zeta", "alpha"]);
}

#[test]
fn test_load_missing_file() {
    let result = AppConfig::load(Some("/nonexistent/gfperf.toml"));
    assert!(result.is_err());
}

#[test]
fn test_load_rejects_invalid_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "[logging]\nlevel = \"loud\"").unwrap();

    let path = file.path().to_str().unwrap().to_string();
    assert!(AppConfig::load(Some(&path)).is_err());
}
