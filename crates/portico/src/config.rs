// File: src/config.rs
// Purpose: Configuration parsing from portico.toml

use anyhow::{Context, Result};
use portico_router::RouteDefinition;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub project: ProjectConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub app: AppConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// Route table, in match order
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
}

/// Project metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_version")]
    pub version: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Prefix the application is mounted under (e.g. "/blog").
    /// Stripped from the request path before routing.
    #[serde(default)]
    pub base_url: String,

    /// The listener itself terminates TLS; behind a proxy leave this off
    /// and let `X-Forwarded-Proto` decide
    #[serde(default = "default_false")]
    pub tls: bool,

    /// Largest request body accepted, in bytes
    #[serde(default = "default_max_body")]
    pub max_body_bytes: usize,
}

/// Dispatcher behaviour
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Show error details on error pages. Never enable in production.
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Action to run when an action requires a signed-in session
    #[serde(default)]
    pub login_action: Option<ActionTarget>,
}

/// A controller/action pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTarget {
    pub controller: String,
    pub action: String,
}

impl ActionTarget {
    pub fn new(controller: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            action: action.into(),
        }
    }
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Seconds a session may sit unused before it is dropped
    #[serde(default = "default_session_lifetime")]
    pub lifetime: u64,
}

/// Database connections and repository mapping
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DatabaseConfig {
    /// Named connections; the first one is the default
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,

    /// Entity name → connection name, for entities not on the default connection
    #[serde(default)]
    pub repository_connections: HashMap<String, String>,
}

/// A single named connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_connection_name")]
    pub name: String,

    /// sqlx URL, e.g. `sqlite:blog.db` or `postgres://user:pw@localhost/blog`
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl ConnectionConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            max_connections: default_max_connections(),
        }
    }
}

// Default values
fn default_name() -> String {
    "portico-app".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_max_body() -> usize {
    2 * 1024 * 1024
}

fn default_cookie_name() -> String {
    "PORTICO_SESSID".to_string()
}

fn default_session_lifetime() -> u64 {
    1440
}

fn default_connection_name() -> String {
    "default".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_false() -> bool {
    false
}

// Default implementations
impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            version: default_version(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            base_url: String::new(),
            tls: false,
            max_body_bytes: default_max_body(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            lifetime: default_session_lifetime(),
        }
    }
}

impl Config {
    /// Read a TOML config file; a missing or blank file means all defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        toml::from_str(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// `./portico.toml`
    pub fn load_default() -> Result<Self> {
        Self::load("portico.toml")
    }

    /// Apply `PORTICO_DEBUG` and `DATABASE_URL` from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("PORTICO_DEBUG").ok().as_deref(),
            std::env::var("DATABASE_URL").ok().as_deref(),
        );
    }

    fn apply_overrides(&mut self, debug: Option<&str>, database_url: Option<&str>) {
        if let Some(debug) = debug {
            self.app.debug = matches!(debug.trim(), "1" | "true" | "yes" | "on");
        }

        if let Some(url) = database_url {
            let existing = self
                .database
                .connections
                .iter_mut()
                .find(|c| c.name == default_connection_name());
            match existing {
                Some(conn) => conn.url = url.to_string(),
                None => self
                    .database
                    .connections
                    .insert(0, ConnectionConfig::new(default_connection_name(), url)),
            }
        }
    }

    /// Socket address string for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
