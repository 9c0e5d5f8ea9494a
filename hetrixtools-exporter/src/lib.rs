//! Prometheus metrics exporter for HetrixTools uptime monitors.
//!
//! This crate polls the HetrixTools v3 uptime monitor API on every scrape and
//! exposes the latest per-location check results via an HTTP `/metrics`
//! endpoint.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │  HetrixTools    │<────│    Collector    │<────│   HTTP Server   │
//! │  API (v3)       │     │  (per scrape)   │     │   (/metrics)    │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! hetrixtools-exporter --hetrixtools.api-key "$HETRIXTOOLS_API_KEY"
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod api;
pub mod client;
pub mod collector;
pub mod config;
pub mod http;

pub use client::{ClientError, HetrixClient};
pub use collector::{MonitorCollector, SharedCollector};
pub use config::ExporterConfig;
pub use http::HttpServer;
