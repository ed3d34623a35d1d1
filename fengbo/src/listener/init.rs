// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Listener setup and connection admission.

use std::collections::HashMap;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, Receiver, Sender};

use super::{Listener, CHANNEL_CAPACITY};
use crate::commands::{DispatcherToListenerCmd, ListenerToDispatcherCmd};
use crate::config;
use crate::error::Error;
use crate::session::{Session, SessionConfig};
use crate::stream::Stream;
use crate::types::ListenerId;

impl Listener {
    /// Bind a TCP endpoint described by `listener_config`.
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be bound.
    pub async fn bind(
        id: ListenerId,
        listener_config: &config::Listener,
        message_config: &config::Message,
        dispatcher_sender: Sender<ListenerToDispatcherCmd>,
        dispatcher_receiver: Receiver<DispatcherToListenerCmd>,
    ) -> Result<Self, Error> {
        let address = listener_config.address();
        log::info!("listener {id}: bind mqtt://{address}");
        let socket = TcpListener::bind(address).await?;

        let (session_sender, session_receiver) = mpsc::channel(CHANNEL_CAPACITY);
        Ok(Self {
            id,
            socket,
            session_config: SessionConfig::new(listener_config, message_config),
            current_session_id: 0,

            session_senders: HashMap::new(),

            session_sender,
            session_receiver: Some(session_receiver),

            dispatcher_sender,
            dispatcher_receiver: Some(dispatcher_receiver),
        })
    }

    pub(super) fn next_session_id(&mut self) -> u64 {
        self.current_session_id += 1;
        self.current_session_id
    }

    /// Spawn a session actor for a freshly accepted transport.
    pub(super) fn new_connection(&mut self, stream: Stream) {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);
        let session_id = self.next_session_id();
        self.session_senders.insert(session_id, sender);

        let session = Session::new(
            session_id,
            self.session_config.clone(),
            stream,
            self.session_sender.clone(),
            receiver,
        );
        tokio::spawn(session.run_loop());
        log::info!("listener {}: new connection, session {session_id}", self.id);
    }
}
