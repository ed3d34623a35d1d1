// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Dispatcher cmd handlers: route the command to the session channel it
//! names.

use super::Listener;
use crate::commands::{DispatcherToListenerCmd, ListenerToSessionCmd};
use crate::error::Error;
use crate::types::SessionId;

impl Listener {
    pub(super) async fn handle_dispatcher_cmd(
        &mut self,
        cmd: DispatcherToListenerCmd,
    ) -> Result<(), Error> {
        match cmd {
            DispatcherToListenerCmd::ConnectAck(session_id, packet, cached_session) => {
                self.send_to_session(
                    session_id,
                    ListenerToSessionCmd::ConnectAck(packet, cached_session),
                )
                .await
            }
            DispatcherToListenerCmd::Publish(session_id, message) => {
                self.send_to_session(session_id, ListenerToSessionCmd::Publish(message))
                    .await
            }
            DispatcherToListenerCmd::SubscribeAck(session_id, packet) => {
                self.send_to_session(session_id, ListenerToSessionCmd::SubscribeAck(packet))
                    .await
            }
            DispatcherToListenerCmd::DisconnectSession(session_id) => {
                self.send_to_session(session_id, ListenerToSessionCmd::Disconnect)
                    .await
            }
        }
    }

    async fn send_to_session(
        &mut self,
        session_id: SessionId,
        cmd: ListenerToSessionCmd,
    ) -> Result<(), Error> {
        if let Some(session_sender) = self.session_senders.get(&session_id) {
            session_sender.send(cmd).await.map_err(Into::into)
        } else {
            Err(Error::session_error(session_id))
        }
    }
}
