// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::time::Duration;

use crate::config;

/// Per-attachment options, assembled by the listener from the broker
/// config before a session actor is spawned.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    connect_timeout: u64,
    allow_empty_client_id: bool,
    keep_alive_factor: f64,
    retry_interval: Duration,
    max_retries: u32,
    max_inflight: usize,
}

impl SessionConfig {
    #[must_use]
    pub fn new(listener: &config::Listener, message: &config::Message) -> Self {
        Self {
            connect_timeout: listener.connect_timeout(),
            allow_empty_client_id: listener.allow_empty_client_id(),
            keep_alive_factor: message.keep_alive_factor(),
            retry_interval: Duration::from_secs(message.retry_interval()),
            max_retries: message.max_retries(),
            max_inflight: message.max_inflight(),
        }
    }

    #[must_use]
    #[inline]
    pub const fn connect_timeout(&self) -> u64 {
        self.connect_timeout
    }

    #[must_use]
    #[inline]
    pub const fn allow_empty_client_id(&self) -> bool {
        self.allow_empty_client_id
    }

    /// Deadline for a client with `keep_alive` seconds: the broker waits
    /// one and a half times the interval by default [MQTT-3.1.2-24].
    /// Zero disables the keep alive mechanism.
    #[must_use]
    pub fn keep_alive_timeout(&self, keep_alive: u16) -> Option<Duration> {
        if keep_alive == 0 {
            None
        } else {
            Some(Duration::from_secs_f64(
                f64::from(keep_alive) * self.keep_alive_factor,
            ))
        }
    }

    #[must_use]
    #[inline]
    pub const fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    #[must_use]
    #[inline]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    #[must_use]
    #[inline]
    pub const fn max_inflight(&self) -> usize {
        self.max_inflight
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(&config::Listener::default(), &config::Message::default())
    }
}
