// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::Error;

/// Duplex byte stream of one client attachment.
///
/// The enum mirrors the transport interface the broker core consumes:
/// anything that can read chunks and write buffers fits behind a new
/// variant without touching the session logic.
#[derive(Debug)]
pub enum Stream {
    Mqtt(TcpStream),
}

impl Stream {
    /// Read available bytes into `buf`, returning the count. Zero means
    /// the peer closed the connection.
    ///
    /// # Errors
    ///
    /// Returns error if the socket read fails.
    pub async fn read_buf(&mut self, buf: &mut Vec<u8>) -> Result<usize, Error> {
        match self {
            Self::Mqtt(tcp_stream) => Ok(tcp_stream.read_buf(buf).await?),
        }
    }

    /// Write the whole buffer to the stream.
    ///
    /// # Errors
    ///
    /// Returns error if the socket write fails.
    pub async fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        match self {
            Self::Mqtt(tcp_stream) => {
                tcp_stream.write_all(buf).await?;
                Ok(buf.len())
            }
        }
    }

    /// Shut down the write half, flushing pending data.
    ///
    /// # Errors
    ///
    /// Returns error if the socket shutdown fails.
    pub async fn close(&mut self) -> Result<(), Error> {
        match self {
            Self::Mqtt(tcp_stream) => Ok(tcp_stream.shutdown().await?),
        }
    }
}
