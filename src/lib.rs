//! # MCPShield - Supply-Chain Security for MCP Servers
//!
//! This library contains all the shared functionality used by the
//! `mcpshield` CLI.
//!
//! ## Pipeline
//! namespace → identity verification → artifact resolution → content-addressed
//! cache → security scan → policy gate → lockfile
//!
//! ## Architecture
//! - [`cli`] - Command-line interface
//! - [`core`] - Digest engine, cache, safe extractor, security analysis
//! - [`registry`] - MCP registry metadata client and normalization
//! - [`resolvers`] - Per-ecosystem artifact resolvers (npm, pypi)
//! - [`lockfile`] - Canonical lockfile store with atomic durable writes
//! - [`workflows`] - Add / Scan / Verify orchestration

// Production-ready clippy configuration
#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::suspicious)]
// Allow documentation lints - internal code, not public API
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
// Allow some pedantic lints that are too strict for this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::similar_names)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_precision_loss)]

pub mod cli;
pub mod config;
pub mod core;
pub mod lockfile;
pub mod registry;
pub mod resolvers;
pub mod workflows;

/// Tool name stamped into report envelopes and user agents.
pub const TOOL_NAME: &str = "mcpshield";

/// Tool version stamped into report envelopes.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");
