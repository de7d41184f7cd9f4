//! Bangla News - a bilingual news aggregation backend
//!
//! This crate polls Bangla RSS feeds once a day, sorts their items into
//! editorial categories and serves the cached result as a JSON API.

pub mod article;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod scheduler;
pub mod trending;
