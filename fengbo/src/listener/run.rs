// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Listener main loop.

use super::Listener;
use crate::stream::Stream;

impl Listener {
    /// Accept connections and relay commands until the process ends.
    ///
    /// # Panics
    ///
    /// Panics if called twice; the channel receivers can only be taken
    /// once.
    pub async fn run_loop(&mut self) {
        let mut session_receiver = self
            .session_receiver
            .take()
            .expect("Invalid session receiver");
        let mut dispatcher_receiver = self
            .dispatcher_receiver
            .take()
            .expect("Invalid dispatcher receiver");

        loop {
            tokio::select! {
                accept_result = self.socket.accept() => {
                    match accept_result {
                        Ok((tcp_stream, address)) => {
                            log::debug!("listener {}: accepted {address}", self.id);
                            self.new_connection(Stream::Mqtt(tcp_stream));
                        }
                        Err(err) => {
                            log::error!("listener {}: accept failed: {err}", self.id);
                        }
                    }
                }
                Some(cmd) = session_receiver.recv() => {
                    if let Err(err) = self.handle_session_cmd(cmd).await {
                        log::error!("listener {}: session cmd failed: {err}", self.id);
                    }
                }
                Some(cmd) = dispatcher_receiver.recv() => {
                    if let Err(err) = self.handle_dispatcher_cmd(cmd).await {
                        log::error!("listener {}: dispatcher cmd failed: {err}", self.id);
                    }
                }
            }
        }
    }
}
