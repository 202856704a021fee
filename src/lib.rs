//! Development server that compiles scripts per client capabilities.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ───────────────▶ http::server ──▶ routing (manifest or static?)
//!                                        │
//!                     static ◀───────────┤
//!                                        ▼ manifest
//!                              descriptor (parse capability header)
//!                                        │
//!                                        ▼
//!                              manifest (load, first matching config)
//!                                        │
//!                                        ▼
//!                              build (fresh? 304 / cached / compile)
//!                                        │
//!   Client Response                      ▼
//!   ◀─────────────── http::encoding (deflate / gzip / identity)
//!
//!   Cross-cutting: config (TOML + hot reload), observability, lifecycle
//! ```

// Core subsystems
pub mod build;
pub mod config;
pub mod descriptor;
pub mod http;
pub mod manifest;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
