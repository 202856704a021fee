//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + CLI overrides
//!     → loader.rs (parse, deserialize, apply overrides)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → http::server builds a Runtime from it
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config (overrides re-applied)
//!     → validation.rs validates
//!     → server swaps in a new Runtime atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{default_config, load_config, ConfigError, ConfigOverrides};
pub use schema::{
    CompilerConfig, ContentConfig, DescriptorConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    ServerConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
