// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Handles commands from the listener.

use std::time::Instant;

use codec::v3::{ConnectAckPacket, ConnectReturnCode, SubscribeAckPacket};
use codec::QoS;

use super::{CachedSession, Session, Status};
use crate::commands::{DisconnectReason, ListenerToSessionCmd};
use crate::error::{Error, ErrorKind};
use crate::types::PublishMessage;

impl Session {
    pub(super) async fn handle_listener_cmd(
        &mut self,
        cmd: ListenerToSessionCmd,
    ) -> Result<(), Error> {
        match cmd {
            ListenerToSessionCmd::ConnectAck(packet, cached_session) => {
                self.on_listener_connect_ack(packet, cached_session).await
            }
            ListenerToSessionCmd::Publish(message) => self.on_listener_publish(message).await,
            ListenerToSessionCmd::SubscribeAck(packet) => {
                self.on_listener_subscribe_ack(packet).await
            }
            ListenerToSessionCmd::Disconnect => self.on_listener_disconnect(),
        }
    }

    async fn on_listener_connect_ack(
        &mut self,
        packet: ConnectAckPacket,
        cached_session: Option<CachedSession>,
    ) -> Result<(), Error> {
        let return_code = packet.return_code();
        self.send(packet).await?;

        if return_code != ConnectReturnCode::Accepted {
            self.halt(DisconnectReason::ProtocolViolation);
            return Ok(());
        }
        self.status = Status::Connected;

        // Resume the persistent session: unacknowledged deliveries are
        // re-sent in packet id order with DUP=1, then the backlog goes
        // out as fresh transmissions [MQTT-4.4.0-1].
        if let Some(cached_session) = cached_session {
            self.load_cached_session(cached_session).await?;
        }
        Ok(())
    }

    async fn load_cached_session(&mut self, cached_session: CachedSession) -> Result<(), Error> {
        let (next_packet_id, inflight, backlog, pub_recv_ids) = cached_session.into_parts();
        self.pub_recv_ids = pub_recv_ids;
        let actions = self
            .inflight
            .resume(next_packet_id, inflight, backlog, Instant::now());
        for action in actions {
            self.send_resend_action(action).await?;
        }
        Ok(())
    }

    /// A message routed to this subscriber. QoS 0 goes straight to the
    /// wire; QoS 1/2 enter the delivery window, or its backlog when the
    /// window is saturated.
    async fn on_listener_publish(&mut self, message: PublishMessage) -> Result<(), Error> {
        if self.status != Status::Connected {
            log::debug!(
                "session {}: dropping delivery, not connected: {:?}",
                self.id,
                message.topic()
            );
            return Ok(());
        }

        if message.qos() == QoS::AtMostOnce {
            let packet = message.to_packet(codec::PacketId::new(0))?;
            return self.send(packet).await;
        }

        match self.inflight.push(message, Instant::now()) {
            Ok(Some(packet_id)) => self.send_inflight_publish(packet_id).await,
            Ok(None) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NoFreePacketId => {
                // Drop this delivery only; the session stays up.
                log::warn!("session {}: delivery dropped: {err}", self.id);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn on_listener_subscribe_ack(
        &mut self,
        packet: SubscribeAckPacket,
    ) -> Result<(), Error> {
        // The SUBACK MUST carry the same packet id as the SUBSCRIBE it
        // acknowledges [MQTT-3.8.4-2].
        self.send(packet).await
    }

    /// A newer connection with the same client id took over
    /// [MQTT-3.1.4-2].
    fn on_listener_disconnect(&mut self) -> Result<(), Error> {
        self.halt(DisconnectReason::TakenOver);
        Ok(())
    }
}
