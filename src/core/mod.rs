//! Core module - digest engine, cache, safe extraction, security analysis

pub mod archive;
pub mod cache;
pub mod digest;
pub mod error;
pub mod http;
pub mod paths;
pub mod security;
pub mod types;

pub use cache::ContentCache;
pub use error::{Result, ShieldError};
pub use types::*;
