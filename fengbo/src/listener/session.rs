// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Session cmd handlers: everything goes up to the dispatcher with the
//! global session id attached.

use super::Listener;
use crate::commands::{DisconnectReason, ListenerToDispatcherCmd, SessionToListenerCmd};
use crate::error::Error;
use crate::session::CachedSession;
use crate::types::SessionGid;

impl Listener {
    pub(super) async fn handle_session_cmd(
        &mut self,
        cmd: SessionToListenerCmd,
    ) -> Result<(), Error> {
        match cmd {
            SessionToListenerCmd::Connect(session_id, info) => {
                self.dispatcher_sender
                    .send(ListenerToDispatcherCmd::SessionConnected(
                        SessionGid::new(self.id, session_id),
                        info,
                    ))
                    .await
                    .map_err(Into::into)
            }
            SessionToListenerCmd::Publish(_session_id, packet) => self
                .dispatcher_sender
                .send(ListenerToDispatcherCmd::Publish(packet))
                .await
                .map_err(Into::into),
            SessionToListenerCmd::Subscribe(session_id, packet) => self
                .dispatcher_sender
                .send(ListenerToDispatcherCmd::Subscribe(
                    SessionGid::new(self.id, session_id),
                    packet,
                ))
                .await
                .map_err(Into::into),
            SessionToListenerCmd::Unsubscribe(session_id, packet) => self
                .dispatcher_sender
                .send(ListenerToDispatcherCmd::Unsubscribe(
                    SessionGid::new(self.id, session_id),
                    packet,
                ))
                .await
                .map_err(Into::into),
            SessionToListenerCmd::Disconnect(session_id, client_id, reason, snapshot) => {
                self.on_session_disconnect(session_id, client_id, reason, snapshot)
                    .await
            }
        }
    }

    async fn on_session_disconnect(
        &mut self,
        session_id: u64,
        client_id: String,
        reason: DisconnectReason,
        snapshot: Option<CachedSession>,
    ) -> Result<(), Error> {
        if self.session_senders.remove(&session_id).is_none() {
            log::error!(
                "listener {}: no channel for closing session {session_id}",
                self.id
            );
        }

        self.dispatcher_sender
            .send(ListenerToDispatcherCmd::SessionClosed(
                SessionGid::new(self.id, session_id),
                client_id,
                reason,
                snapshot,
            ))
            .await
            .map_err(Into::into)
    }
}
