//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Validate → [reset caches] → Log manifest inventory → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then caches, then listener
//! - In-flight compiles are not awaited on shutdown; partial artifacts are
//!   never visible because writes are atomic

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
