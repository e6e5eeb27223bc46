mod common;
use crate::common::builders::ConfigFileBuilder;
use crate::common::{TestResult, init_tracing};

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use wmlkit::cli::LogLevel;
use wmlkit::config::{ConfigFile, load_and_validate};
use wmlkit::errors::WmlkitError;
use wmlkit::logging::resolve_level;
use wmlkit::types::CacheStorageMode;

#[test]
fn full_config_file_is_loaded() -> TestResult {
    init_tracing();

    let mut file = NamedTempFile::new()?;
    write!(
        file,
        r#"
[paths]
wesnoth = "/usr/games/wesnoth"
python = "/usr/bin/python3"
wmltools_dir = "/usr/share/games/wesnoth/data/tools"

[preprocessor]
default_defines = ["MULTIPLAYER"]

[lint]
verbosity = 2
spellcheck = true

[upload]
server = "add-ons.wesnoth.org"
port = 15018

[cache]
storage = "memory"
"#
    )?;

    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.paths.wesnoth, PathBuf::from("/usr/games/wesnoth"));
    assert_eq!(cfg.paths.data_dir, PathBuf::from("/usr/share/wesnoth"));
    assert_eq!(cfg.preprocessor.default_defines, vec!["MULTIPLAYER"]);
    assert_eq!(cfg.lint.verbosity, 2);
    assert!(cfg.lint.spellcheck);
    assert!(cfg.lint.dry_run);
    assert!(cfg.scan.crossreference);
    assert_eq!(cfg.upload.port, Some(15018));
    assert_eq!(cfg.cache.storage, CacheStorageMode::Memory);

    Ok(())
}

#[test]
fn empty_file_means_all_defaults() -> TestResult {
    init_tracing();

    let file = NamedTempFile::new()?;
    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.paths.python, PathBuf::from("python3"));
    assert_eq!(cfg.cache.storage, CacheStorageMode::File);
    assert_eq!(cfg.cache.path, PathBuf::from(".wmlkit/timestamps.toml"));
    assert_eq!(cfg.core_dir(), PathBuf::from("/usr/share/wesnoth/data/core"));

    Ok(())
}

#[test]
fn explicit_missing_file_is_an_io_error() {
    init_tracing();

    match load_and_validate("/no/such/dir/Custom.toml") {
        Err(WmlkitError::IoError(_)) => {}
        other => panic!("expected IoError, got {other:?}"),
    }
}

#[test]
fn unknown_storage_mode_is_a_toml_error() -> TestResult {
    init_tracing();

    let mut file = NamedTempFile::new()?;
    write!(file, "[cache]\nstorage = \"sqlite\"\n")?;

    match load_and_validate(file.path()) {
        Err(WmlkitError::TomlError(_)) => Ok(()),
        other => panic!("expected TomlError, got {other:?}"),
    }
}

fn expect_config_error(builder: ConfigFileBuilder, needle: &str) {
    match ConfigFile::try_from(builder.raw()) {
        Err(WmlkitError::ConfigError(msg)) => {
            assert!(msg.contains(needle), "{msg:?} should mention {needle:?}")
        }
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

#[test]
fn semantic_validation_errors() {
    init_tracing();

    expect_config_error(ConfigFileBuilder::new().lint_verbosity(4), "verbosity");
    expect_config_error(ConfigFileBuilder::new().python(""), "python");
    expect_config_error(
        ConfigFileBuilder::new().upload_server("host", Some(0)),
        "port",
    );
    expect_config_error(ConfigFileBuilder::new().upload_server("  ", None), "server");
    expect_config_error(ConfigFileBuilder::new().file_cache(""), "[cache].path");
}

#[test]
fn log_level_priority() {
    assert_eq!(
        resolve_level(Some(LogLevel::Debug), Some("error")),
        tracing::Level::DEBUG
    );
    assert_eq!(resolve_level(None, Some(" Warning ")), tracing::Level::WARN);
    assert_eq!(resolve_level(None, Some("loud")), tracing::Level::INFO);
    assert_eq!(resolve_level(None, None), tracing::Level::INFO);
}
