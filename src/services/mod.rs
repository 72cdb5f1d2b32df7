//! Service layer for the clip indexer.
//!
//! - Upstream access (`SourceClient`): channel discovery, clip listing,
//!   enrichment and rate-limit backoff

mod source;

pub use source::{SourceClient, UNKNOWN_GAME};
