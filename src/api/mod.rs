//! HTTP query layer.
//!
//! - `GET /api/v1/clips`: filtered, sorted clip listing
//! - `GET /api/v1/status`: status line and store counters

pub mod handler;
pub mod server;

pub use handler::{ClipQuery, ClipQueryParams, StatusResponse};
pub use server::{ApiError, AppState, JsonResult, router, serve};
