//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the bundle server.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where scripts and manifests are served from.
    pub content: ContentConfig,

    /// How clients identify their capabilities.
    pub descriptor: DescriptorConfig,

    /// External bundler invocation.
    pub compiler: CompilerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8082").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8082".to_string(),
        }
    }
}

/// Served content.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ContentConfig {
    /// Project root; URL paths are resolved below it.
    pub root: PathBuf,

    /// Name of the artifact directory created next to each entry script.
    pub cache_dir: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            cache_dir: ".lib".to_string(),
        }
    }
}

/// Capability descriptor settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Request header carrying the descriptor.
    pub header: String,

    /// Product token that starts the descriptor (`<product>/<version>`).
    pub product: String,

    /// Namespace prepended to surface names starting with `.`.
    pub surface_namespace: String,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            header: "user-agent".to_string(),
            product: "LiquidCore".to_string(),
            surface_namespace: "org.liquidplayer.surfaces".to_string(),
        }
    }
}

/// External bundler configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Bundler executable.
    pub program: String,

    /// Arguments passed before the per-build flags.
    pub args: Vec<String>,

    /// Flag marking a module as external (repeated per module).
    pub external_flag: String,

    /// Flag applying a transform globally (repeated per transform).
    pub transform_flag: String,

    /// Flag taking the comma-separated list of injectable globals.
    pub globals_flag: String,

    /// Modules provided by the client runtime, never bundled.
    pub builtin_modules: Vec<String>,

    /// Module globals the bundler may inject.
    pub allowed_globals: Vec<String>,

    /// Per-compile timeout in seconds.
    pub timeout_secs: u64,

    /// Maximum concurrent bundler processes.
    pub max_workers: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            program: "browserify".to_string(),
            args: strings(&[
                "--no-builtins",
                "--no-commondir",
                "--ignore-missing",
                "--no-browser-field",
                "--extension=.js",
            ]),
            external_flag: "-x".to_string(),
            transform_flag: "-g".to_string(),
            globals_flag: "--insert-global-vars".to_string(),
            builtin_modules: strings(&[
                "process",
                "assert",
                "buffer",
                "child_process",
                "constants",
                "crypto",
                "events",
                "fs",
                "os",
                "path",
                "readline",
                "stream",
                "url",
                "util",
                "vm",
            ]),
            allowed_globals: strings(&["__filename", "__dirname"]),
            timeout_secs: 120,
            max_workers: 4,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    /// Must cover a cold compile.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 300 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.compiler.builtin_modules.len(), 15);
    }

    #[test]
    fn test_partial_sections() {
        let config: ServerConfig = toml::from_str(
            r#"
            [content]
            root = "/srv/app"

            [compiler]
            program = "esbuild"
            max_workers = 1

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.content.root, PathBuf::from("/srv/app"));
        assert_eq!(config.content.cache_dir, ".lib");
        assert_eq!(config.compiler.program, "esbuild");
        assert_eq!(config.compiler.max_workers, 1);
        assert_eq!(config.compiler.external_flag, "-x");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.descriptor.product, "LiquidCore");
    }
}
