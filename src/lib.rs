// src/lib.rs

//! clipdex: live clip crawler and time-decayed clip index

pub mod api;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod store;
pub mod utils;
