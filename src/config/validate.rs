// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, WmlkitError};
use crate::types::CacheStorageMode;

const MAX_VERBOSITY: u8 = 3;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::WmlkitError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_paths(cfg)?;
    validate_verbosity(cfg)?;
    validate_upload(cfg)?;
    validate_cache(cfg)?;
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    let paths = [
        ("wesnoth", &cfg.paths.wesnoth),
        ("data_dir", &cfg.paths.data_dir),
        ("config_dir", &cfg.paths.config_dir),
        ("python", &cfg.paths.python),
        ("wmltools_dir", &cfg.paths.wmltools_dir),
    ];
    for (key, value) in paths {
        if value.as_os_str().is_empty() {
            return Err(WmlkitError::ConfigError(format!(
                "[paths].{key} must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_verbosity(cfg: &RawConfigFile) -> Result<()> {
    for (section, verbosity) in [("lint", cfg.lint.verbosity), ("indent", cfg.indent.verbosity)] {
        if verbosity > MAX_VERBOSITY {
            return Err(WmlkitError::ConfigError(format!(
                "[{section}].verbosity must be <= {MAX_VERBOSITY} (got {verbosity})"
            )));
        }
    }
    Ok(())
}

fn validate_upload(cfg: &RawConfigFile) -> Result<()> {
    if cfg.upload.port == Some(0) {
        return Err(WmlkitError::ConfigError(
            "[upload].port must be >= 1 (got 0)".to_string(),
        ));
    }
    if let Some(server) = &cfg.upload.server {
        if server.trim().is_empty() {
            return Err(WmlkitError::ConfigError(
                "[upload].server must not be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_cache(cfg: &RawConfigFile) -> Result<()> {
    if cfg.cache.storage == CacheStorageMode::File && cfg.cache.path.as_os_str().is_empty() {
        return Err(WmlkitError::ConfigError(
            "[cache].path is required when storage = \"file\"".to_string(),
        ));
    }
    Ok(())
}
