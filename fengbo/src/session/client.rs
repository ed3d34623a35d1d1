// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Handles packets arriving from the client.

use std::time::Instant;

use codec::utils::random_client_id;
use codec::v3::{
    ConnectAckPacket, ConnectPacket, ConnectReturnCode, DisconnectPacket, PingRequestPacket,
    PingResponsePacket, PublishAckPacket, PublishCompletePacket, PublishPacket,
    PublishReceivedPacket, PublishReleasePacket, SubscribePacket, UnsubscribeAckPacket,
    UnsubscribePacket,
};
use codec::{
    ByteArray, DecodeError, DecodePacket, FixedHeader, PacketType, ProtocolLevel, QoS,
};

use super::{Session, Status};
use crate::commands::{ConnectInfo, DisconnectReason, SessionToListenerCmd};
use crate::error::{Error, ErrorKind};
use crate::will::WillMessage;

impl Session {
    pub(super) async fn handle_client_packet(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let fixed_header = FixedHeader::decode(&mut ba)?;

        // Any control packet resets the keep alive clock [MQTT-3.1.2-23].
        self.last_active = Instant::now();

        // The first packet from the client MUST be CONNECT [MQTT-3.1.0-1].
        if self.status == Status::Invalid && fixed_header.packet_type() != PacketType::Connect {
            return Err(Error::from_string(
                ErrorKind::ProtocolViolation,
                format!(
                    "Got {:?} before CONNECT",
                    fixed_header.packet_type()
                ),
            ));
        }

        match fixed_header.packet_type() {
            PacketType::Connect => self.on_client_connect(buf).await,
            PacketType::Publish { .. } => self.on_client_publish(buf).await,
            PacketType::PublishAck => self.on_client_publish_ack(buf).await,
            PacketType::PublishReceived => self.on_client_publish_received(buf).await,
            PacketType::PublishRelease => self.on_client_publish_release(buf).await,
            PacketType::PublishComplete => self.on_client_publish_complete(buf).await,
            PacketType::Subscribe => self.on_client_subscribe(buf).await,
            PacketType::Unsubscribe => self.on_client_unsubscribe(buf).await,
            PacketType::PingRequest => self.on_client_ping(buf).await,
            PacketType::Disconnect => self.on_client_disconnect(buf).await,
            t => {
                log::warn!("session {}: unexpected packet type {t:?}", self.id);
                Ok(())
            }
        }
    }

    async fn reject_connect(&mut self, return_code: ConnectReturnCode) -> Result<(), Error> {
        // If a server sends a CONNACK packet containing a non-zero
        // return code it MUST set Session Present to 0 [MQTT-3.2.2-4]
        // and then close the network connection [MQTT-3.2.2-5].
        let ack_packet = ConnectAckPacket::new(false, return_code);
        self.send(ack_packet).await?;
        self.halt(DisconnectReason::ProtocolViolation);
        Ok(())
    }

    async fn on_client_connect(&mut self, buf: &[u8]) -> Result<(), Error> {
        // A second CONNECT on a live connection is a protocol violation
        // and the client is disconnected [MQTT-3.1.0-2].
        if self.status != Status::Invalid {
            return Err(Error::new(
                ErrorKind::ProtocolViolation,
                "Got a second CONNECT packet",
            ));
        }

        let mut ba = ByteArray::new(buf);
        let mut packet = match ConnectPacket::decode(&mut ba) {
            Ok(packet) => packet,
            Err(DecodeError::InvalidProtocolLevel) => {
                // Respond 0x01 and disconnect [MQTT-3.1.2-2].
                return self.reject_connect(ConnectReturnCode::UnacceptedProtocol).await;
            }
            Err(DecodeError::InvalidClientId) => {
                return self.reject_connect(ConnectReturnCode::IdentifierRejected).await;
            }
            Err(err) => {
                // The Server MUST close the connection without sending a
                // CONNACK if the packet does not conform [MQTT-3.1.4-1].
                return Err(err.into());
            }
        };

        // The broker core only speaks protocol level 4.
        if packet.protocol_level() != ProtocolLevel::V311 {
            return self.reject_connect(ConnectReturnCode::UnacceptedProtocol).await;
        }

        if packet.client_id().is_empty() {
            // A zero-byte client id gets a broker-assigned one when the
            // config allows it [MQTT-3.1.3-6].
            if self.config.allow_empty_client_id() {
                let client_id = random_client_id();
                let _ = packet.set_client_id(&client_id);
            } else {
                return self.reject_connect(ConnectReturnCode::IdentifierRejected).await;
            }
        }

        let will = match WillMessage::from_connect(&packet) {
            Ok(will) => will,
            Err(err) => return Err(err),
        };

        self.client_id = packet.client_id().to_string();
        self.clean_session = packet.connect_flags().clean_session();
        self.keep_alive_timeout = self.config.keep_alive_timeout(packet.keep_alive());
        self.status = Status::Connecting;

        let info = ConnectInfo {
            client_id: self.client_id.clone(),
            clean_session: self.clean_session,
            will,
        };
        self.sender
            .send(SessionToListenerCmd::Connect(self.id, info))
            .await?;
        Ok(())
    }

    async fn on_client_publish(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = PublishPacket::decode(&mut ba)?;
        let packet_id = packet.packet_id();

        match packet.qos() {
            QoS::AtMostOnce => {
                self.sender
                    .send(SessionToListenerCmd::Publish(self.id, packet))
                    .await?;
            }
            QoS::AtLeastOnce => {
                // Deliver first, then acknowledge [MQTT-4.3.2].
                self.sender
                    .send(SessionToListenerCmd::Publish(self.id, packet))
                    .await?;
                self.send(PublishAckPacket::new(packet_id)).await?;
            }
            QoS::ExactOnce => {
                if self.pub_recv_ids.contains(&packet_id) {
                    // Already forwarded: suppress re-delivery but repeat
                    // the PUBREC [MQTT-4.3.3].
                    return self.send(PublishReceivedPacket::new(packet_id)).await;
                }
                if self.pub_recv_ids.len() >= self.config.max_inflight() {
                    log::error!(
                        "session {}: too many unreleased QoS 2 publishes",
                        self.id
                    );
                    return Err(Error::new(
                        ErrorKind::ProtocolViolation,
                        "QoS 2 receive window exceeded",
                    ));
                }
                self.pub_recv_ids.insert(packet_id);
                self.sender
                    .send(SessionToListenerCmd::Publish(self.id, packet))
                    .await?;
                self.send(PublishReceivedPacket::new(packet_id)).await?;
            }
        }
        Ok(())
    }

    /// PUBACK closes a QoS 1 delivery; duplicates are ignored.
    async fn on_client_publish_ack(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = PublishAckPacket::decode(&mut ba)?;

        if self.inflight.ack_publish(packet.packet_id()) {
            self.flush_backlog().await?;
        } else {
            log::debug!(
                "session {}: stray PUBACK for packet {}",
                self.id,
                packet.packet_id()
            );
        }
        Ok(())
    }

    /// PUBREC moves a QoS 2 delivery into its second phase; the broker
    /// answers with a PUBREL carrying the same packet id.
    async fn on_client_publish_received(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = PublishReceivedPacket::decode(&mut ba)?;
        let packet_id = packet.packet_id();

        if self.inflight.on_pubrec(packet_id) {
            self.send(PublishReleasePacket::new(packet_id)).await?;
            self.inflight.pubrel_written(packet_id, Instant::now());
        }
        Ok(())
    }

    /// PUBCOMP closes a QoS 2 delivery.
    async fn on_client_publish_complete(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = PublishCompletePacket::decode(&mut ba)?;

        if self.inflight.on_pubcomp(packet.packet_id()) {
            self.flush_backlog().await?;
        }
        Ok(())
    }

    /// PUBREL releases an inbound QoS 2 publish. A PUBREL for an unknown
    /// packet id still gets a PUBCOMP.
    async fn on_client_publish_release(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = PublishReleasePacket::decode(&mut ba)?;
        let packet_id = packet.packet_id();

        if !self.pub_recv_ids.remove(&packet_id) {
            log::debug!(
                "session {}: PUBREL for unknown packet {packet_id}",
                self.id
            );
        }
        self.send(PublishCompletePacket::new(packet_id)).await
    }

    async fn on_client_subscribe(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        // Reserved header bits, reserved QoS bits and an empty filter
        // list are all protocol violations that close the connection
        // [MQTT-3.8.1-1] [MQTT-3-8.3-4] [MQTT-3.8.3-3]. Individually
        // invalid filters survive decoding and are answered with the
        // SUBACK failure code instead.
        let packet = SubscribePacket::decode(&mut ba)?;
        self.sender
            .send(SessionToListenerCmd::Subscribe(self.id, packet))
            .await?;
        Ok(())
    }

    async fn on_client_unsubscribe(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let packet = UnsubscribePacket::decode(&mut ba)?;
        let packet_id = packet.packet_id();

        self.sender
            .send(SessionToListenerCmd::Unsubscribe(self.id, packet))
            .await?;

        // The UNSUBACK has the same packet id as the request
        // [MQTT-3.10.4-4].
        self.send(UnsubscribeAckPacket::new(packet_id)).await
    }

    async fn on_client_ping(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let _packet = PingRequestPacket::decode(&mut ba)?;
        self.send(PingResponsePacket::new()).await
    }

    /// A clean disconnect: the will message is discarded, never
    /// published [MQTT-3.14.4-3].
    async fn on_client_disconnect(&mut self, buf: &[u8]) -> Result<(), Error> {
        let mut ba = ByteArray::new(buf);
        let _packet = DisconnectPacket::decode(&mut ba)?;
        self.halt(DisconnectReason::Clean);
        Ok(())
    }

    /// Fill freed window slots from the backlog and send the promoted
    /// messages.
    pub(super) async fn flush_backlog(&mut self) -> Result<(), Error> {
        let (promoted, dropped) = self.inflight.promote_backlog(Instant::now());
        for message in &dropped {
            log::warn!(
                "session {}: delivery dropped, no free packet id for {:?}",
                self.id,
                message.topic()
            );
        }
        for packet_id in promoted {
            self.send_inflight_publish(packet_id).await?;
        }
        Ok(())
    }
}
