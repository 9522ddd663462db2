use crate::config::{DataSourceKind, ProxyMode};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "guide-overlay", about = "Recent winning builds of the top players")]
pub struct Cli {
    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Command line flags merged on top of every other configuration source.
#[derive(Debug, Args, Serialize)]
pub struct SettingsOverrides {
    /// Where leaderboard and builds come from
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSourceKind>,

    /// Path or URL of the precomputed builds dump
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dump_location: Option<String>,

    /// Directory holding the persistent cache
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Route requests through the host bridge or the public relays
    #[arg(long, global = true)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_mode: Option<ProxyMode>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the top players
    Leaderboard,
    /// Aggregate recent winning builds of the top players
    Builds {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Show the full dump records, with bonded creatures and augments
    Detailed,
    /// Clear the caches, then aggregate again
    Refresh,
    /// Remove every cached entry
    ClearCache,
    /// Cache and request diagnostics
    Status,
    /// Keep refreshing builds on the configured schedule
    Watch,
}
