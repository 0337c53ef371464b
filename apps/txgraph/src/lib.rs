//! # txgraph
//!
//! HTTP API, CLI and configuration around `txgraph-core`.

pub mod api;
pub mod cli;
pub mod config;
