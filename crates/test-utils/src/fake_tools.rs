#![allow(dead_code)]

//! Stand-ins for the external WML tools.
//!
//! Each fake tool is a small `sh` script in a temp directory. The python
//! interpreter is configured as `sh`, so `<python> <tools>/wmllint ...`
//! simply runs the script with the real argument vector. The preprocessor
//! is an executable script used as the game binary.

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use wmlkit::config::ConfigFile;
use wmlkit::tools::Tool;

use crate::builders::ConfigFileBuilder;

pub struct FakeToolkit {
    dir: TempDir,
}

impl FakeToolkit {
    /// Lay out `bin/`, `tools/`, `data/data/core/` and `userdata/`.
    pub fn new() -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        for sub in ["bin", "tools", "data/data/core", "userdata", "work"] {
            fs::create_dir_all(dir.path().join(sub))?;
        }
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn wesnoth_path(&self) -> PathBuf {
        self.root().join("bin").join("wesnoth")
    }

    pub fn tools_dir(&self) -> PathBuf {
        self.root().join("tools")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root().join("data")
    }

    /// Scratch area for inputs and outputs.
    pub fn work_dir(&self) -> PathBuf {
        self.root().join("work")
    }

    /// Install `body` as the fake for `tool`. `body` is plain `sh`; the
    /// shebang is added here.
    pub fn install(&self, tool: Tool, body: &str) -> io::Result<PathBuf> {
        let path = match tool.script_name() {
            Some(name) => self.tools_dir().join(name),
            None => self.wesnoth_path(),
        };
        write_script(&path, body)?;
        Ok(path)
    }

    /// Write `contents` to `work/<rel>` and return the full path.
    pub fn write_input(&self, rel: &str, contents: &str) -> io::Result<PathBuf> {
        let path = self.work_dir().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Config builder already pointing at this toolkit.
    pub fn config_builder(&self) -> ConfigFileBuilder {
        ConfigFileBuilder::new()
            .wesnoth(self.wesnoth_path())
            .python("sh")
            .wmltools_dir(self.tools_dir())
            .data_dir(self.data_dir())
            .config_dir(self.root().join("userdata"))
    }

    pub fn config(&self) -> ConfigFile {
        self.config_builder().build()
    }
}

/// Write an executable `sh` script.
pub fn write_script(path: &Path, body: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("#!/bin/sh\n{body}\n"))?;
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms)
}
