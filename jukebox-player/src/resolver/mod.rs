//! Song resolution
//!
//! Turns a free-form user query (a URL or search words) into a [`Song`].
//! Sessions call resolvers from spawned tasks and abandon the call when the
//! request is cancelled, so implementations need no cancellation support of
//! their own beyond being drop-safe.

pub mod library;

pub use library::LibraryResolver;

use async_trait::async_trait;
use jukebox_common::{RequesterId, Song};
use thiserror::Error;

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Query matched nothing playable
    #[error("No results for '{0}'")]
    NotFound(String),

    /// Backend failed while looking the query up
    #[error("Lookup failed: {0}")]
    Backend(String),
}

/// Looks up songs for user queries
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str, requester: &RequesterId) -> Result<Song, ResolveError>;
}

/// Check whether a query is a direct `http(s)` link
pub fn is_url(query: &str) -> bool {
    let lower = query.trim().to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")) && !lower.contains(char::is_whitespace)
}
