//! Command-line argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// MCPShield - Supply-chain security for MCP servers
///
/// Pins approved servers to cryptographically verified artifacts, detects
/// drift, and gates additions and scans through a declarative policy.
#[derive(Parser, Debug)]
#[command(name = "mcpshield")]
#[command(author = "MCPShield Team")]
#[command(version)]
#[command(about = "Pin, verify, and scan MCP server artifacts", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit machine-readable JSON instead of human output
    #[arg(long, global = true)]
    pub json: bool,

    /// Lockfile path (default: ./mcp.lock.json)
    #[arg(long, global = true)]
    pub lockfile: Option<PathBuf>,

    /// Policy path (default: ./policy.yaml)
    #[arg(long, global = true)]
    pub policy: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Verify, scan, and pin a server to the lockfile
    #[command(visible_alias = "a")]
    Add {
        /// Server namespace, e.g. io.github.owner/name
        namespace: String,
        /// Skip confirmation prompts
        #[arg(short = 'y', long)]
        yes: bool,
        /// Never prompt; fail instead of asking for overrides
        #[arg(long)]
        non_interactive: bool,
    },

    /// Re-scan every pinned server
    #[command(visible_alias = "s")]
    Scan {
        /// Fail (exit 1) when policy blocks a server
        #[arg(short, long)]
        enforce: bool,
        /// Use the cache exclusively; never touch the network
        #[arg(short, long)]
        offline: bool,
        /// Write a SARIF 2.1.0 report to this path
        #[arg(long, value_name = "PATH")]
        sarif: Option<PathBuf>,
    },

    /// Re-hash pinned artifacts and report drift (never rewrites the lockfile)
    Verify {
        /// Use the cache exclusively; never touch the network
        #[arg(short, long)]
        offline: bool,
    },

    /// Remove a server from the lockfile
    #[command(visible_alias = "rm")]
    Remove {
        /// Server namespace to remove
        namespace: String,
    },

    /// List pinned servers
    #[command(visible_alias = "ls")]
    List,

    /// Validate the lockfile and policy documents
    Validate,

    /// Diagnose the local environment
    Doctor,

    /// Manage the content-addressed artifact cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Manage tool settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write a config file with the default settings
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Show the effective settings (file plus env overrides)
    Show,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show cache location and usage
    Info,
    /// Remove cache entries older than the configured max age
    Cleanup {
        /// Override max age in days
        #[arg(long)]
        max_age_days: Option<u64>,
    },
    /// Remove the entire cache
    Purge {
        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}
