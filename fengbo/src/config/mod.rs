// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Error;

mod listener;
mod log;
mod message;

pub use self::log::{Log, LogLevel};
pub use listener::Listener;
pub use message::Message;

/// Broker main config, normally parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "Listener::default_listeners")]
    listeners: Vec<Listener>,

    #[serde(default = "Message::default")]
    message: Message,

    #[serde(default = "Log::default")]
    log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listeners: Listener::default_listeners(),
            message: Message::default(),
            log: Log::default(),
        }
    }
}

impl Config {
    /// Parse config from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or is not valid TOML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    #[must_use]
    pub fn listeners(&self) -> &[Listener] {
        &self.listeners
    }

    #[must_use]
    pub const fn message(&self) -> &Message {
        &self.message
    }

    #[must_use]
    pub const fn log(&self) -> &Log {
        &self.log
    }

    /// Validate config options.
    ///
    /// # Errors
    ///
    /// Returns error if some option is out of range.
    pub fn validate(&self) -> Result<(), Error> {
        for listener in &self.listeners {
            listener.validate()?;
        }
        self.message.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.listeners().len(), 1);
        assert_eq!(config.message().retry_interval(), 5);
        assert_eq!(config.message().max_retries(), 3);
        assert!((config.message().keep_alive_factor() - 1.5).abs() < f64::EPSILON);
        config.validate().unwrap();
    }

    #[test]
    fn test_parse() {
        let content = r#"
[[listeners]]
address = "127.0.0.1:2883"
connect_timeout = 30

[message]
retry_interval = 2
max_retries = 5
max_inflight = 8

[log]
log_level = "debug"
"#;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(config.listeners()[0].address(), "127.0.0.1:2883");
        assert_eq!(config.message().retry_interval(), 2);
        assert_eq!(config.message().max_retries(), 5);
        assert_eq!(config.message().max_inflight(), 8);
        assert_eq!(config.log().log_level(), LogLevel::Debug);
    }
}
