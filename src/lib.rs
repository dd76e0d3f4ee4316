//! Newsdesk - a viewer for pre-aggregated news
//!
//! This crate loads articles, a source catalog and an update timestamp from
//! static endpoints and serves them as a filterable, searchable web page with
//! auto-refresh, bookmarks and JSON export.

pub mod config;
pub mod db;
pub mod export;
pub mod fetcher;
pub mod filter;
pub mod model;
pub mod render;
pub mod routes;
pub mod state;
