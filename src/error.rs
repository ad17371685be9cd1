//! Error kinds surfaced at the search boundary.
//!
//! Workers report the first error they hit; the driver stops dispatching
//! new blocks and re-raises it. Warnings (genetic-code mismatch, odd-looking
//! query alphabet) go to the diagnostic stream and never end up here.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Index missing, unreadable, or internally inconsistent.
    #[error("index error: {0}")]
    Index(String),

    /// A query violates the declared alphabet or is empty.
    #[error("query error: {0}")]
    Query(String),

    /// Mapping-file or sequence-file content rejected.
    #[error("parse error: {0}")]
    Parse(String),

    /// Allocation failed. The driver prints segmentation guidance on top.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// Incompatible options, rejected before any work begins.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed taxonomy tree encountered during LCA computation.
    #[error("LCA error: {0}")]
    Lca(String),

    /// A documented contract was observably violated. Always a bug.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

pub type Result<T> = std::result::Result<T, SearchError>;
