#![allow(dead_code)]

use std::path::PathBuf;

use wmlkit::config::{ConfigFile, RawConfigFile};
use wmlkit::types::CacheStorageMode;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the all-defaults config, with the cache kept in memory so a
/// test never writes into the working directory by accident.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.cache.storage = CacheStorageMode::Memory;
        Self { config }
    }

    pub fn wesnoth(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.wesnoth = path.into();
        self
    }

    pub fn python(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.python = path.into();
        self
    }

    pub fn wmltools_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.wmltools_dir = path.into();
        self
    }

    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.data_dir = path.into();
        self
    }

    pub fn config_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.paths.config_dir = path.into();
        self
    }

    pub fn macros_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.preprocessor.macros_file = Some(path.into());
        self
    }

    pub fn default_define(mut self, define: &str) -> Self {
        self.config
            .preprocessor
            .default_defines
            .push(define.to_string());
        self
    }

    pub fn lint_verbosity(mut self, verbosity: u8) -> Self {
        self.config.lint.verbosity = verbosity;
        self
    }

    pub fn lint_spellcheck(mut self, val: bool) -> Self {
        self.config.lint.spellcheck = val;
        self
    }

    pub fn lint_dry_run(mut self, val: bool) -> Self {
        self.config.lint.dry_run = val;
        self
    }

    pub fn include_core(mut self, val: bool) -> Self {
        self.config.lint.include_core = val;
        self.config.scan.include_core = val;
        self
    }

    pub fn scan_collisions(mut self, val: bool) -> Self {
        self.config.scan.collisions = val;
        self
    }

    pub fn indent_dry_run(mut self, val: bool) -> Self {
        self.config.indent.dry_run = val;
        self
    }

    pub fn upload_server(mut self, server: &str, port: Option<u16>) -> Self {
        self.config.upload.server = Some(server.to_string());
        self.config.upload.port = port;
        self
    }

    pub fn file_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache.storage = CacheStorageMode::File;
        self.config.cache.path = path.into();
        self
    }

    /// The raw config, for tests that exercise validation failures.
    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
