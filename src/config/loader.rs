//! Configuration loading from disk.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::ServerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line values that take precedence over the file.
///
/// Re-applied on every reload so a file change never undoes them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub root: Option<PathBuf>,
    pub port: Option<u16>,
    pub max_workers: Option<usize>,
    pub verbose: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(root) = &self.root {
            config.content.root = root.clone();
        }
        if let Some(port) = self.port {
            match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    config.listener.bind_address = addr.to_string();
                }
                Err(_) => config.listener.bind_address = format!("0.0.0.0:{port}"),
            }
        }
        if let Some(workers) = self.max_workers {
            config.compiler.max_workers = workers;
        }
        if self.verbose {
            config.observability.log_level = "debug".to_string();
        }
    }
}

/// Load a TOML file, apply overrides, and validate the result.
pub fn load_config(path: &Path, overrides: &ConfigOverrides) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ServerConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    finish(&mut config, overrides)?;
    Ok(config)
}

/// Defaults plus overrides, for running without a config file.
pub fn default_config(overrides: &ConfigOverrides) -> Result<ServerConfig, ConfigError> {
    let mut config = ServerConfig::default();
    finish(&mut config, overrides)?;
    Ok(config)
}

fn finish(config: &mut ServerConfig, overrides: &ConfigOverrides) -> Result<(), ConfigError> {
    overrides.apply(config);
    validate_config(config).map_err(ConfigError::Validation)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bundle-server.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_overrides_win() {
        let (_dir, path) = write(
            r#"
            [listener]
            bind_address = "127.0.0.1:8000"

            [content]
            root = "/from/file"
            "#,
        );
        let overrides = ConfigOverrides {
            root: Some(PathBuf::from("/from/cli")),
            port: Some(9999),
            max_workers: Some(1),
            verbose: true,
        };

        let config = load_config(&path, &overrides).unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:9999");
        assert_eq!(config.content.root, PathBuf::from("/from/cli"));
        assert_eq!(config.compiler.max_workers, 1);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_errors() {
        let missing = load_config(Path::new("/nonexistent/bundle.toml"), &ConfigOverrides::default());
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let (_dir, path) = write("[compiler\nprogram = ");
        assert!(matches!(
            load_config(&path, &ConfigOverrides::default()),
            Err(ConfigError::Parse { .. })
        ));

        let (_dir, path) = write("[compiler]\ntimeout_secs = 0\n");
        let err = load_config(&path, &ConfigOverrides::default()).unwrap_err();
        assert!(err.to_string().contains("compiler.timeout_secs"));
    }

    #[test]
    fn test_default_config() {
        let config = default_config(&ConfigOverrides {
            port: Some(8090),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8090");
    }
}
