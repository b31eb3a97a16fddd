//! Loading configuration from files on disk.

use std::fs;

use tempfile::TempDir;
use tessera_config::{ConfigError, ConfigLoader};
use tessera_middleware::PanicPolicy;

#[test]
fn toml_file_keeps_defaults_for_missing_sections() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tessera.toml");
    fs::write(
        &path,
        r#"
            [multipart]
            max_files = 4
            upload_dir = "/srv/uploads"

            [logging]
            level = "warn"
        "#,
    )
    .unwrap();

    let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();

    assert_eq!(config.multipart.max_files, 4);
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.body.max_size, 50 * 1024 * 1024);
    assert_eq!(config.parser_options().multipart.max_files, 4);
}

#[test]
fn json_file_is_parsed_by_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tessera.json");
    fs::write(&path, r#"{"handler": {"panic_policy": "internal_error"}}"#).unwrap();

    let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();

    assert_eq!(config.handler.panic_policy, PanicPolicy::InternalError);
    assert_eq!(
        config.handler_options().panic_policy,
        PanicPolicy::InternalError
    );
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tessera.yaml");
    fs::write(&path, "body: {}").unwrap();

    assert!(matches!(
        ConfigLoader::new().with_file(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
fn dotenv_entries_override_the_file() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("tessera.toml");
    fs::write(&config_path, "[body]\nmax_size = 4096\n").unwrap();
    let env_path = dir.path().join(".env");
    fs::write(
        &env_path,
        "TESSERA_CFG_TEST__BODY__MAX_SIZE=8192\nTESSERA_CFG_TEST__LOGGING__JSON_FORMAT=false\nUNRELATED=1\n",
    )
    .unwrap();

    let config = ConfigLoader::new()
        .with_file(&config_path)
        .unwrap()
        .with_dotenv_file(&env_path)
        .unwrap()
        .with_env_prefix("TESSERA_CFG_TEST")
        .load()
        .unwrap();

    assert_eq!(config.body.max_size, 8192);
    assert!(!config.logging.json_format);
}

#[test]
fn dotenv_entries_need_a_prefix() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join(".env");
    fs::write(&env_path, "TESSERA_CFG_NOPREFIX__BODY__MAX_SIZE=8192\n").unwrap();

    let config = ConfigLoader::new()
        .with_dotenv_file(&env_path)
        .unwrap()
        .load()
        .unwrap();

    assert_eq!(config.body.max_size, 50 * 1024 * 1024);
}

#[test]
fn invalid_dotenv_value_fails_loading() {
    let dir = TempDir::new().unwrap();
    let env_path = dir.path().join(".env");
    fs::write(&env_path, "TESSERA_CFG_BAD__MULTIPART__MAX_FILES=lots\n").unwrap();

    let result = ConfigLoader::new()
        .with_dotenv_file(&env_path)
        .unwrap()
        .with_env_prefix("TESSERA_CFG_BAD")
        .load();

    assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
}

#[test]
fn missing_dotenv_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let result = ConfigLoader::new().with_dotenv_file(dir.path().join("missing.env"));
    assert!(matches!(result, Err(ConfigError::DotenvError(_))));
}
