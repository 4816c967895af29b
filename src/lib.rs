//! Dare admin console library
//!
//! Batched TTL caching for wallet profiles and IPFS metadata, cursor paging over
//! the dare listing, and the terminal console built on top of them.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod pager;
pub mod titles;
pub mod ui;
