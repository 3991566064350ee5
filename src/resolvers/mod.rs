//! Per-ecosystem artifact resolvers

pub mod download;
pub mod npm;
pub mod pypi;
pub mod traits;
pub mod types;

pub use traits::{Resolver, resolver_for};
pub use types::{DownloadOutcome, ResolverConfig};
