// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{Receiver, Sender};

use crate::commands::{
    DispatcherToListenerCmd, ListenerToDispatcherCmd, ListenerToSessionCmd, SessionToListenerCmd,
};
use crate::session::SessionConfig;
use crate::types::{ListenerId, SessionId};

mod dispatcher;
mod init;
mod run;
mod session;

pub(crate) const CHANNEL_CAPACITY: usize = 128;

/// One accept loop plus the supervision of its session actors.
///
/// The listener relays commands in both directions: session actors talk
/// to the dispatcher through it, and dispatcher deliveries are fanned
/// back out to the right session channel.
#[derive(Debug)]
pub struct Listener {
    id: ListenerId,
    socket: TcpListener,
    session_config: SessionConfig,
    current_session_id: SessionId,

    session_senders: HashMap<SessionId, Sender<ListenerToSessionCmd>>,

    session_sender: Sender<SessionToListenerCmd>,
    session_receiver: Option<Receiver<SessionToListenerCmd>>,

    dispatcher_sender: Sender<ListenerToDispatcherCmd>,
    dispatcher_receiver: Option<Receiver<DispatcherToListenerCmd>>,
}

impl Listener {
    #[must_use]
    pub const fn id(&self) -> ListenerId {
        self.id
    }

    /// Socket address the listener is bound to. Useful when the config
    /// asked for port 0.
    ///
    /// # Errors
    ///
    /// Returns error if the socket is gone.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }
}
