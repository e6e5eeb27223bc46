// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `wmlkit`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wmlkit",
    version,
    about = "Drive the WML tools (preprocessor, wmllint, wmlscope, wmlindent, add-on uploader) from the command line.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Wmlkit.toml` in the current working directory. A missing
    /// default file means "all defaults".
    #[arg(long, global = true, value_name = "PATH", default_value = "Wmlkit.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WMLKIT_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the command that would run, but don't execute anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Preprocess one file into an output directory, skipping it if it has
    /// not changed since the last successful run.
    Preprocess {
        /// Input `.cfg` file.
        file: PathBuf,
        /// Output directory; created if missing.
        out_dir: PathBuf,
        #[command(flatten)]
        defines: DefineArgs,
        /// Preprocess even if the cache says the file is up to date.
        #[arg(long)]
        force: bool,
    },

    /// Run wmllint on a file or directory.
    Lint { target: PathBuf },

    /// Run wmlscope on a file or directory.
    Scan { target: PathBuf },

    /// Run wmlindent on a file or directory.
    Indent { target: PathBuf },

    /// Upload an add-on directory.
    Upload { addon_dir: PathBuf },

    /// List the macros defined by a macros file.
    Defines {
        macros_file: PathBuf,
        #[command(flatten)]
        defines: DefineArgs,
    },

    /// Print the id of the first campaign in a file.
    CampaignId { file: PathBuf },

    /// Inspect or reset the incremental preprocessing cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct DefineArgs {
    /// Extra preprocessor define (repeatable).
    #[arg(short = 'D', long = "define", value_name = "NAME")]
    pub defines: Vec<String>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
pub enum CacheAction {
    /// Print every cached path with its timestamp.
    Show,
    /// Remove all entries.
    Clear,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
