//! Configuration management for the collab server

use serde::Deserialize;
use std::env;
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub document: DocumentConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Path the WebSocket endpoint is mounted on
    pub socket_path: String,
    /// Allowed CORS origin; `*` allows any
    pub cors_origin: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    /// Text the shared document starts from
    pub seed: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                socket_path: "/api".to_string(),
                cors_origin: "*".to_string(),
            },
            document: DocumentConfig {
                seed: "Start document".to_string(),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a config from any variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let port = match lookup("SERVER_PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
                name: "SERVER_PORT",
                value,
            })?,
            None => defaults.server.port,
        };

        let socket_path = lookup("SOCKET_PATH").unwrap_or(defaults.server.socket_path);
        if !socket_path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                name: "SOCKET_PATH",
                value: socket_path,
            });
        }

        Ok(Config {
            server: ServerConfig {
                host: lookup("SERVER_HOST").unwrap_or(defaults.server.host),
                port,
                socket_path,
                cors_origin: lookup("CORS_ALLOW_ORIGIN").unwrap_or(defaults.server.cors_origin),
            },
            document: DocumentConfig {
                seed: lookup("DOCUMENT_SEED").unwrap_or(defaults.document.seed),
            },
        })
    }
}
