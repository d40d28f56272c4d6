//! Server configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! `Chat.toml` in the working directory, then `CHAT_*` environment
//! variables. `$PORT` seeds the default port for hosted environments.

use std::env;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;

/// Default bind host
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default port when neither `$PORT` nor `CHAT_PORT` is set
pub const DEFAULT_PORT: u16 = 1081;

/// Default cap on a single buffered input line
pub const DEFAULT_MAX_LINE_LENGTH: usize = 4096;

/// Rooms that exist from startup, owned by the server
pub const DEFAULT_ROOMS: [&str; 4] = ["chat", "hottub", "PAD", "anime"];

/// Configuration for the server
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Hostname or IP address to bind
    pub host: String,

    /// Port number to bind
    pub port: u16,

    /// Longest line a client may send, in bytes
    pub max_line_length: usize,

    /// Server-owned rooms created at startup
    pub default_rooms: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            default_rooms: DEFAULT_ROOMS.iter().map(|r| r.to_string()).collect(),
        }
    }
}

impl ServerConfig {
    /// Load the server configuration from defaults, `Chat.toml` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::defaults()?
            .add_source(File::with_name("Chat").required(false))
            .add_source(
                Environment::with_prefix("CHAT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("default_rooms"),
            )
            .build()?
            .try_deserialize()
    }

    /// Builder seeded with every default value
    fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Config::builder()
            .set_default("host", DEFAULT_HOST)?
            .set_default("port", i64::from(port))?
            .set_default("max_line_length", DEFAULT_MAX_LINE_LENGTH as i64)?
            .set_default("default_rooms", DEFAULT_ROOMS.to_vec())
    }

    /// Get the server address as a string
    pub fn get_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
