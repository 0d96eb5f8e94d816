//! Configuration surface integration tests

use std::io::Write;

use cli_lib::config::SweepConfig;

const FULL_CONFIG: &str = r#"
action_prefix = ">>>>>"

[[local]]
paths = ["/opt/app/logs", "/opt/app/tmp"]
suffixes = [".log", ".out"]
window = { days = 15 }

[[dfs]]
paths = ["/user/proj/2021/input", "/user/proj/*/tmp"]
skip_trash = true
window = { months = 4 }

[[warehouse]]
database = "proj"
warehouse_root = "/user/hive/warehouse/proj.db"
tables = ["tb*", "events"]
check_time_type = "partition-field"
partition_date_format = "%Y%m%d"

[[column_family]]
namespace = "ns1"
tables = ["*"]
drop_table = true
window = { months = 4 }
"#;

#[test]
fn test_full_config_builds_four_strategies() {
    let config: SweepConfig = toml::from_str(FULL_CONFIG).unwrap();
    assert_eq!(config.action_prefix.as_deref(), Some(">>>>>"));
    assert_eq!(config.local.len(), 1);
    assert_eq!(config.dfs.len(), 1);
    assert_eq!(config.warehouse.len(), 1);
    assert_eq!(config.column_family.len(), 1);

    let runner = config.into_runner().unwrap();
    assert_eq!(runner.strategy_count(), 4);
}

#[test]
fn test_defaults_fill_omitted_fields() {
    let config: SweepConfig = toml::from_str(
        r#"
[[warehouse]]
database = "proj"
warehouse_root = "/w"
tables = ["*"]
"#,
    )
    .unwrap();

    let warehouse = &config.warehouse[0];
    assert_eq!(warehouse.ddl_command, "hive -e");
    assert!(warehouse.managed);
    assert_eq!(warehouse.partition_date_format, "%Y%m%d");
    assert_eq!(warehouse.dfs_command, "hadoop fs");
    assert!(warehouse.window.is_none());
}

#[test]
fn test_unknown_key_is_rejected() {
    let result: Result<SweepConfig, _> = toml::from_str(
        r#"
[[local]]
paths = ["/opt/app/logs"]
delete_everything = true
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_empty_config_fails_to_build() {
    assert!(SweepConfig::default().into_runner().is_err());
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL_CONFIG.as_bytes()).unwrap();
    file.flush().unwrap();

    let config = SweepConfig::load(file.path()).unwrap();
    assert_eq!(config.local[0].paths.len(), 2);
}

#[test]
fn test_load_missing_file_is_contextual_error() {
    let err = SweepConfig::load(std::path::Path::new("/nonexistent/sweep.toml")).unwrap_err();
    assert!(format!("{:#}", err).contains("/nonexistent/sweep.toml"));
}
