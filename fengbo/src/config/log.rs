// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use serde::Deserialize;
use std::path::{Path, PathBuf};

#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,

    Error,

    Warn,

    #[default]
    Info,

    Debug,

    Trace,
}

const fn default_console_log() -> bool {
    true
}

/// Logging options.
#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    /// Print log to console.
    #[serde(default = "default_console_log")]
    console_log: bool,

    /// Write log to a size-rolled file when set.
    #[serde(default)]
    log_file: Option<PathBuf>,

    #[serde(default)]
    log_level: LogLevel,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            console_log: default_console_log(),
            log_file: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Log {
    #[must_use]
    pub const fn console_log(&self) -> bool {
        self.console_log
    }

    #[must_use]
    pub fn log_file(&self) -> Option<&Path> {
        self.log_file.as_deref()
    }

    #[must_use]
    pub const fn log_level(&self) -> LogLevel {
        self.log_level
    }
}
