use super::*;
use crate::{AppConfigProvider, ConfigProvider};
use std::fs;
use tempfile::tempdir;

fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).expect("Failed to write file");
    path
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    // raw (not yet normalized)
    assert_eq!(config.server.home_dir, "");

    assert_eq!(config.loader.modules_root, "modules");
    assert_eq!(config.loader.bootstrap_module(), Some("core.database"));
    assert_eq!(config.loader.phase1_timeout, Duration::from_secs(30));
    assert_eq!(config.loader.hook_timeout, Duration::from_secs(30));
    assert_eq!(config.loader.hook_execution, "sequential");

    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].file, "logs/modhost.log");
    assert!(config.modules.is_empty());
}

#[test]
fn test_yaml_serialization() {
    let yaml = AppConfig::default().to_yaml().expect("Failed to serialize to YAML");

    assert!(yaml.contains("server:"));
    assert!(yaml.contains("loader:"));
    assert!(yaml.contains("phase1_timeout: 30s"));
    assert!(yaml.contains("logging:"));
    assert!(yaml.contains("modules:"));
}

#[test]
fn test_layered_loading_yaml_only() {
    let tmp = tempdir().unwrap();
    let home = tmp.path().join("home");
    let yaml = format!(
        r#"
server:
  home_dir: "{}"

loader:
  modules_root: "/srv/modules"
  bootstrap_module: "core.storage"
  hook_timeout: 250ms
  hook_execution: concurrent

modules:
  core.settings:
    profile: "dev"
  heartbeat:
    interval: "5s"
"#,
        home.display()
    );
    let cfg_path = write(tmp.path(), "cfg.yaml", &yaml);

    let config = AppConfig::load_layered(&cfg_path).expect("Failed to load config");

    assert_eq!(config.home_dir(), home);
    assert!(home.is_dir(), "home_dir is created on load");
    assert_eq!(config.loader.modules_root, "/srv/modules");
    assert_eq!(config.loader.bootstrap_module(), Some("core.storage"));
    assert_eq!(config.loader.hook_timeout, Duration::from_millis(250));
    // untouched keys keep defaults
    assert_eq!(config.loader.phase1_timeout, Duration::from_secs(30));
    assert_eq!(config.loader.hook_execution, "concurrent");
    assert!(config.logging.is_none());

    assert_eq!(config.modules.len(), 2);
    assert_eq!(config.modules["core.settings"]["profile"], "dev");
}

#[test]
fn test_empty_bootstrap_disables_pinning() {
    let tmp = tempdir().unwrap();
    let yaml = format!(
        "server:\n  home_dir: \"{}\"\nloader:\n  bootstrap_module: \"\"\n",
        tmp.path().join("h").display()
    );
    let cfg_path = write(tmp.path(), "cfg.yaml", &yaml);

    let config = AppConfig::load_layered(&cfg_path).unwrap();
    assert_eq!(config.loader.bootstrap_module(), None);
}

#[test]
fn test_unknown_fields_are_rejected() {
    let tmp = tempdir().unwrap();
    let yaml = format!(
        "server:\n  home_dir: \"{}\"\nloader:\n  boostrap_module: core.db\n",
        tmp.path().join("h").display()
    );
    let cfg_path = write(tmp.path(), "cfg.yaml", &yaml);

    assert!(AppConfig::load_layered(&cfg_path).is_err());
}

#[test]
fn test_missing_config_file_is_an_error() {
    let tmp = tempdir().unwrap();
    let err = AppConfig::load_layered(tmp.path().join("nope.yaml")).unwrap_err();
    assert!(err.to_string().contains("config file not found"));
}

#[test]
fn test_relative_home_dir_is_rejected() {
    let tmp = tempdir().unwrap();
    let cfg_path = write(tmp.path(), "cfg.yaml", "server:\n  home_dir: \"relative/dir\"\n");

    let err = AppConfig::load_layered(&cfg_path).unwrap_err();
    assert!(format!("{err:#}").contains("home_dir"));
}

#[test]
fn test_modules_dir_files_override_inline_sections() {
    let tmp = tempdir().unwrap();
    let mods = tmp.path().join("conf.d");
    fs::create_dir_all(&mods).unwrap();
    write(&mods, "heartbeat.yaml", "interval: 1s\n");
    write(&mods, "README.md", "ignored");

    let yaml = format!(
        r#"
server:
  home_dir: "{}"
modules_dir: "{}"
modules:
  heartbeat:
    interval: "10s"
  core.settings:
    profile: "prod"
"#,
        tmp.path().join("h").display(),
        mods.display()
    );
    let cfg_path = write(tmp.path(), "cfg.yaml", &yaml);

    let config = AppConfig::load_layered(&cfg_path).unwrap();
    assert_eq!(config.modules["heartbeat"]["interval"], "1s");
    assert_eq!(config.modules["core.settings"]["profile"], "prod");
    assert!(!config.modules.contains_key("README"));
}

#[test]
fn test_cli_overrides() {
    let mut config = AppConfig {
        logging: None,
        ..AppConfig::default()
    };

    let args = CliArgs {
        modules_root: Some("/opt/mods".into()),
        verbose: 2,
        ..CliArgs::default()
    };
    config.apply_cli_overrides(&args);

    assert_eq!(config.loader.modules_root, "/opt/mods");
    let logging = config.logging.as_ref().unwrap();
    assert_eq!(logging["default"].console_level, "trace");
}

#[test]
fn test_cli_without_verbose_keeps_level() {
    let mut config = AppConfig::default();
    config.apply_cli_overrides(&CliArgs::default());

    assert_eq!(config.loader.modules_root, "modules");
    assert_eq!(config.logging.as_ref().unwrap()["default"].console_level, "info");
}

#[test]
fn test_config_provider_exposes_sections() {
    let mut config = AppConfig::default();
    config
        .modules
        .insert("heartbeat".into(), serde_json::json!({"interval": "2s"}));
    let provider = AppConfigProvider::new(config);

    assert_eq!(
        provider.get_module_config("heartbeat").unwrap()["interval"],
        "2s"
    );
    assert!(provider.get_module_config("missing").is_none());

    let loader = provider.get_config_raw("loader").unwrap();
    assert_eq!(loader["bootstrap_module"], "core.database");
    assert_eq!(loader["hook_timeout"], "30s");
    assert!(provider.get_config_raw("logging").is_some());
    assert!(provider.get_config_raw("nonsense").is_none());
}
