//! Command-line interface parsing for bankfind
//!
//! This module handles parsing of CLI arguments using clap: the `search`
//! command plus the administrative `refresh` and `clear` commands, and the
//! global overrides applied on top of the environment configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{Config, ConfigError};

/// bankfind - Search bank codes from a local cache backed by a partner directory
#[derive(Parser, Debug)]
#[command(name = "bankfind")]
#[command(about = "Search bank codes with a local cache and partner API fallback")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path of the JSON store, overriding BANKFIND_STORE_PATH
    #[arg(long, global = true, value_name = "PATH")]
    pub store: Option<PathBuf>,

    /// Timeout in seconds for store and partner API calls
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Operations exposed by the binary
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Search banks by name or code
    ///
    /// Examples:
    ///   bankfind search gtb      # Banks containing "gtb"
    ///   bankfind search          # Every bank
    ///   bankfind search --bare 058
    Search {
        /// Case-insensitive text to look for; empty matches everything
        #[arg(default_value = "")]
        query: String,

        /// Print only the array of banks instead of the envelope
        #[arg(long)]
        bare: bool,
    },
    /// Replace the store with a fresh copy of the partner directory
    Refresh,
    /// Remove every bank from the store
    Clear,
}

impl Cli {
    /// Applies command-line overrides to an environment configuration
    pub fn apply(&self, mut config: Config) -> Result<Config, ConfigError> {
        if let Some(ref path) = self.store {
            config = config.with_store_path(path.clone());
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout_secs(secs)?;
        }
        Ok(config)
    }
}
