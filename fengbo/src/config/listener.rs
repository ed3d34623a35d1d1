// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

use crate::error::{Error, ErrorKind};

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:1883";

const fn default_connect_timeout() -> u64 {
    60
}

const fn default_allow_empty_client_id() -> bool {
    true
}

/// One TCP endpoint the broker accepts MQTT connections on.
#[derive(Debug, Clone, Deserialize)]
pub struct Listener {
    /// Socket address to bind, like `0.0.0.0:1883`. Port 0 asks the
    /// kernel for a free port, which the server reports after binding.
    #[serde(default = "Listener::default_address")]
    address: String,

    /// Seconds an attachment may stay silent before sending CONNECT.
    /// Zero disables the timeout.
    #[serde(default = "default_connect_timeout")]
    connect_timeout: u64,

    /// Accept a zero-byte client id and assign a random one
    /// [MQTT-3.1.3-6].
    #[serde(default = "default_allow_empty_client_id")]
    allow_empty_client_id: bool,
}

impl Default for Listener {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            connect_timeout: default_connect_timeout(),
            allow_empty_client_id: default_allow_empty_client_id(),
        }
    }
}

impl Listener {
    #[must_use]
    pub fn default_address() -> String {
        DEFAULT_ADDRESS.to_string()
    }

    #[must_use]
    pub fn default_listeners() -> Vec<Self> {
        vec![Self::default()]
    }

    /// Bind a listener on `address` with default options.
    #[must_use]
    pub fn with_address(address: &str) -> Self {
        Self {
            address: address.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    #[must_use]
    pub const fn allow_empty_client_id(&self) -> bool {
        self.allow_empty_client_id
    }

    /// Validate listener options.
    ///
    /// # Errors
    ///
    /// Returns error if `address` is not a parsable socket address.
    pub fn validate(&self) -> Result<(), Error> {
        if self.address.parse::<std::net::SocketAddr>().is_err() {
            return Err(Error::from_string(
                ErrorKind::ConfigError,
                format!("Invalid listener address: {}", self.address),
            ));
        }
        Ok(())
    }
}
