// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::CacheStorageMode;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [paths]
/// wesnoth = "/usr/bin/wesnoth"
/// data_dir = "/usr/share/wesnoth"
/// config_dir = "/home/me/.config/wesnoth"
/// python = "python3"
/// wmltools_dir = "/usr/share/wesnoth/data/tools"
///
/// [lint]
/// dry_run = true
/// verbosity = 1
///
/// [cache]
/// storage = "file"
/// path = ".wmlkit/timestamps.toml"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub preprocessor: PreprocessorSection,

    #[serde(default)]
    pub lint: LintSection,

    #[serde(default)]
    pub scan: ScanSection,

    #[serde(default)]
    pub indent: IndentSection,

    #[serde(default)]
    pub upload: UploadSection,

    #[serde(default)]
    pub cache: CacheSection,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub preprocessor: PreprocessorSection,
    pub lint: LintSection,
    pub scan: ScanSection,
    pub indent: IndentSection,
    pub upload: UploadSection,
    pub cache: CacheSection,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            paths: raw.paths,
            preprocessor: raw.preprocessor,
            lint: raw.lint,
            scan: raw.scan,
            indent: raw.indent,
            upload: raw.upload,
            cache: raw.cache,
        }
    }

    /// Directory holding the WML core macros and units, passed to the lint
    /// and scan tools so that core references resolve.
    pub fn core_dir(&self) -> PathBuf {
        self.paths.data_dir.join("data").join("core")
    }
}

/// `[paths]` section: where the external tools live.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    /// The game executable; doubles as the preprocessor.
    #[serde(default = "default_wesnoth")]
    pub wesnoth: PathBuf,

    /// Game data directory (`--data-dir`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// User data directory (`--config-dir`).
    #[serde(default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Interpreter used to run the python based tools.
    #[serde(default = "default_python")]
    pub python: PathBuf,

    /// Directory containing `wmllint`, `wmlscope`, `wmlindent`,
    /// `wmlparser3.py` and `wesnoth_addon_manager`.
    #[serde(default = "default_wmltools_dir")]
    pub wmltools_dir: PathBuf,
}

fn default_wesnoth() -> PathBuf {
    PathBuf::from("wesnoth")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("/usr/share/wesnoth")
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(".wesnoth")
}

fn default_python() -> PathBuf {
    PathBuf::from("python3")
}

fn default_wmltools_dir() -> PathBuf {
    PathBuf::from("/usr/share/wesnoth/data/tools")
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            wesnoth: default_wesnoth(),
            data_dir: default_data_dir(),
            config_dir: default_config_dir(),
            python: default_python(),
            wmltools_dir: default_wmltools_dir(),
        }
    }
}

/// `[preprocessor]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PreprocessorSection {
    /// When set, the preprocessor reads and refreshes this macro cache via
    /// `--preprocess-input-macros` / `--preprocess-output-macros`.
    #[serde(default)]
    pub macros_file: Option<PathBuf>,

    /// Defines always passed to the preprocessor, before per-call extras.
    #[serde(default)]
    pub default_defines: Vec<String>,
}

/// `[lint]` section (`wmllint`).
#[derive(Debug, Clone, Deserialize)]
pub struct LintSection {
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Emitted as that many `-v` flags.
    #[serde(default)]
    pub verbosity: u8,

    #[serde(default)]
    pub spellcheck: bool,

    /// Prepend the core data directory to the targets.
    #[serde(default = "default_true")]
    pub include_core: bool,
}

impl Default for LintSection {
    fn default() -> Self {
        Self {
            dry_run: true,
            verbosity: 0,
            spellcheck: false,
            include_core: true,
        }
    }
}

/// `[scan]` section (`wmlscope`).
#[derive(Debug, Clone, Deserialize)]
pub struct ScanSection {
    #[serde(default = "default_true")]
    pub crossreference: bool,

    #[serde(default = "default_true")]
    pub unresolved: bool,

    #[serde(default)]
    pub collisions: bool,

    #[serde(default = "default_true")]
    pub include_core: bool,
}

impl Default for ScanSection {
    fn default() -> Self {
        Self {
            crossreference: true,
            unresolved: true,
            collisions: false,
            include_core: true,
        }
    }
}

/// `[indent]` section (`wmlindent`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndentSection {
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub verbosity: u8,
}

/// `[upload]` section (`wesnoth_addon_manager`).
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UploadSection {
    /// Add-on server address; the tool's own default when unset.
    #[serde(default)]
    pub server: Option<String>,

    #[serde(default)]
    pub port: Option<u16>,
}

/// `[cache]` section: the incremental preprocessing cache.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub storage: CacheStorageMode,

    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".wmlkit/timestamps.toml")
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            storage: CacheStorageMode::default(),
            path: default_cache_path(),
        }
    }
}

fn default_true() -> bool {
    true
}
