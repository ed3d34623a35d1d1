// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;

use crate::error::{Error, ErrorKind};

const fn default_retry_interval() -> u64 {
    5
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_keep_alive_factor() -> f64 {
    1.5
}

const fn default_max_inflight() -> usize {
    16
}

/// Delivery protocol tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Base seconds between retransmissions of an unacknowledged
    /// QoS 1/2 message. The actual gap grows linearly with the retry
    /// count.
    #[serde(default = "default_retry_interval")]
    retry_interval: u64,

    /// Delivery attempts per in-flight message before it is dropped
    /// with a delivery-expired event.
    #[serde(default = "default_max_retries")]
    max_retries: u32,

    /// Multiplier applied to the client's keep alive interval before
    /// the broker declares the connection dead [MQTT-3.1.2-24].
    #[serde(default = "default_keep_alive_factor")]
    keep_alive_factor: f64,

    /// Cap on simultaneously in-flight outbound messages per session.
    /// Deliveries beyond the window wait in a backlog queue.
    #[serde(default = "default_max_inflight")]
    max_inflight: usize,
}

impl Default for Message {
    fn default() -> Self {
        Self {
            retry_interval: default_retry_interval(),
            max_retries: default_max_retries(),
            keep_alive_factor: default_keep_alive_factor(),
            max_inflight: default_max_inflight(),
        }
    }
}

impl Message {
    #[must_use]
    pub const fn retry_interval(&self) -> u64 {
        self.retry_interval
    }

    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    pub const fn keep_alive_factor(&self) -> f64 {
        self.keep_alive_factor
    }

    #[must_use]
    pub const fn max_inflight(&self) -> usize {
        self.max_inflight
    }

    /// Validate message options.
    ///
    /// # Errors
    ///
    /// Returns error if an option is zero or out of range.
    pub fn validate(&self) -> Result<(), Error> {
        if self.retry_interval == 0 {
            return Err(Error::new(
                ErrorKind::ConfigError,
                "retry_interval must be at least 1 second",
            ));
        }
        if self.keep_alive_factor < 1.0 {
            return Err(Error::new(
                ErrorKind::ConfigError,
                "keep_alive_factor must be >= 1.0",
            ));
        }
        if self.max_inflight == 0 {
            return Err(Error::new(
                ErrorKind::ConfigError,
                "max_inflight must be at least 1",
            ));
        }
        Ok(())
    }
}
