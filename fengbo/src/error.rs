// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::fmt::{self, Display};
use std::io;
use tokio::sync::mpsc;

use crate::commands::{
    DispatcherToListenerCmd, ListenerToDispatcherCmd, ListenerToSessionCmd, ServerToDispatcherCmd,
    SessionToListenerCmd,
};
use crate::types::SessionId;

/// Represent the types of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Error occurred while performing I/O.
    IoError,

    /// Invalid config file or option.
    ConfigError,

    /// Failed to initialize the logger.
    LoggerError,

    /// Packet encode error.
    EncodeError,

    /// Packet decode error. The peer sent a malformed packet.
    DecodeError,

    /// The peer sent a well-formed packet at the wrong time or with
    /// invalid content, like a second CONNECT.
    ProtocolViolation,

    /// Send packet error.
    SendError,

    /// All 65535 packet identifiers of a session are in flight.
    NoFreePacketId,

    /// Session with id not found in the listener pipeline.
    SessionNotFound,

    /// Operation is invalid in the current session status.
    StatusError,

    /// mpsc channel error.
    ChannelError,
}

#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    #[must_use]
    pub fn new(kind: ErrorKind, message: &str) -> Self {
        Self {
            kind,
            message: message.to_owned(),
        }
    }

    #[must_use]
    pub fn from_string(kind: ErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[must_use]
    pub fn session_error(session_id: SessionId) -> Self {
        Self::from_string(
            ErrorKind::SessionNotFound,
            format!("Session with id {session_id} not found"),
        )
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::from_string(ErrorKind::IoError, format!("IoError {err}"))
    }
}

impl From<codec::EncodeError> for Error {
    fn from(err: codec::EncodeError) -> Self {
        Self::from_string(ErrorKind::EncodeError, format!("{err:?}"))
    }
}

impl From<codec::DecodeError> for Error {
    fn from(err: codec::DecodeError) -> Self {
        Self::from_string(ErrorKind::DecodeError, format!("{err:?}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::from_string(ErrorKind::ConfigError, format!("Invalid config: {err}"))
    }
}

macro_rules! convert_send_error {
    ($cmd_type: ident) => {
        impl From<mpsc::error::SendError<$cmd_type>> for Error {
            fn from(err: mpsc::error::SendError<$cmd_type>) -> Self {
                Self::from_string(
                    ErrorKind::ChannelError,
                    format!("{} channel error: {}", stringify!($cmd_type), err),
                )
            }
        }
    };
}

convert_send_error!(DispatcherToListenerCmd);
convert_send_error!(ListenerToDispatcherCmd);
convert_send_error!(ListenerToSessionCmd);
convert_send_error!(ServerToDispatcherCmd);
convert_send_error!(SessionToListenerCmd);
