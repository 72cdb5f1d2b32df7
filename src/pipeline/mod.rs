//! Crawl pipeline: discover live channels, fetch their clips, merge them
//! into the store and back the store up.

pub mod crawl;

pub use crawl::{CrawlState, Crawler, ERROR_STATUS_TTL};
