// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::collections::HashSet;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{self, MissedTickBehavior};

use codec::v3::PublishReleasePacket;
use codec::{
    ByteArray, DecodeError, DecodePacket, EncodePacket, FixedHeader, Packet, PacketId, PacketType,
};

use crate::commands::{DisconnectReason, ListenerToSessionCmd, SessionToListenerCmd};
use crate::error::{Error, ErrorKind};
use crate::stream::Stream;
use crate::types::SessionId;

mod cache;
mod client;
mod config;
pub mod inflight;
mod listener;

pub use cache::CachedSession;
pub use config::SessionConfig;

use inflight::{InflightQueue, ResendAction};

/// Interval of the housekeeping tick driving connect timeout, keep
/// alive and retransmission checks.
const TICK_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Transport accepted, CONNECT not seen yet.
    Invalid,

    /// CONNECT forwarded, CONNACK not yet sent.
    Connecting,

    Connected,

    Disconnected,
}

/// One client attachment.
///
/// The actor owns the transport, the inbound QoS 2 bookkeeping and the
/// outbound delivery window. Everything that outlives the attachment
/// (subscriptions, retained messages, persistent state) lives behind the
/// listener in the dispatcher.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    stream: Stream,

    status: Status,
    client_id: String,
    clean_session: bool,
    reason: DisconnectReason,

    /// Deadline derived from the CONNECT keep alive value; `None` when
    /// the client disabled the mechanism.
    keep_alive_timeout: Option<Duration>,

    /// Last instant a control packet arrived from the client.
    last_active: Instant,

    /// When the transport was accepted, for the connect timeout.
    accepted_at: Instant,

    /// Inbound QoS 2 publishes seen but not yet released [MQTT-4.3.3].
    pub_recv_ids: HashSet<PacketId>,

    /// Outbound QoS 1/2 delivery window.
    inflight: InflightQueue,

    sender: Sender<SessionToListenerCmd>,
    receiver: Receiver<ListenerToSessionCmd>,
}

impl Session {
    #[must_use]
    pub fn new(
        id: SessionId,
        config: SessionConfig,
        stream: Stream,
        sender: Sender<SessionToListenerCmd>,
        receiver: Receiver<ListenerToSessionCmd>,
    ) -> Self {
        let inflight = InflightQueue::new(
            config.max_inflight(),
            config.retry_interval(),
            config.max_retries(),
        );
        Self {
            id,
            config,
            stream,

            status: Status::Invalid,
            client_id: String::new(),
            clean_session: true,
            reason: DisconnectReason::TransportClosed,

            keep_alive_timeout: None,
            last_active: Instant::now(),
            accepted_at: Instant::now(),

            pub_recv_ids: HashSet::new(),
            inflight,

            sender,
            receiver,
        }
    }

    /// Drive this attachment until it disconnects, then report the
    /// outcome to the listener.
    pub async fn run_loop(mut self) {
        let mut buf: Vec<u8> = Vec::with_capacity(4096);
        let mut tick = time::interval(TICK_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while self.status != Status::Disconnected {
            tokio::select! {
                read_result = self.stream.read_buf(&mut buf) => {
                    match read_result {
                        Ok(0) => {
                            log::info!("session {}: peer closed connection", self.id);
                            self.halt(DisconnectReason::TransportClosed);
                        }
                        Ok(_n) => {
                            if let Err(err) = self.handle_incoming(&mut buf).await {
                                log::error!("session {}: {err}", self.id);
                                self.halt(DisconnectReason::ProtocolViolation);
                            }
                        }
                        Err(err) => {
                            log::info!("session {}: read failed: {err}", self.id);
                            self.halt(DisconnectReason::TransportClosed);
                        }
                    }
                }
                Some(cmd) = self.receiver.recv() => {
                    if let Err(err) = self.handle_listener_cmd(cmd).await {
                        log::error!("session {}: listener cmd failed: {err}", self.id);
                        self.halt(DisconnectReason::TransportClosed);
                    }
                }
                _ = tick.tick() => {
                    self.on_tick().await;
                }
            }
        }

        let _ = self.stream.close().await;

        let snapshot = if !self.clean_session && !self.client_id.is_empty() {
            let (next_packet_id, inflight, backlog) = self.inflight.clone().into_parts();
            Some(CachedSession::new(
                self.client_id.clone(),
                next_packet_id,
                inflight,
                backlog,
                self.pub_recv_ids.clone(),
            ))
        } else {
            None
        };

        if let Err(err) = self
            .sender
            .send(SessionToListenerCmd::Disconnect(
                self.id,
                self.client_id.clone(),
                self.reason,
                snapshot,
            ))
            .await
        {
            log::error!(
                "session {}: failed to report disconnect: {err:?}",
                self.id
            );
        }
    }

    /// Record the shutdown verdict. The first call wins.
    fn halt(&mut self, reason: DisconnectReason) {
        if self.status != Status::Disconnected {
            self.status = Status::Disconnected;
            self.reason = reason;
        }
    }

    /// Split complete packets out of the read buffer and dispatch them.
    ///
    /// TCP is a byte stream, so one read may carry a fraction of a
    /// packet or several packets back to back; the tail stays in `buf`
    /// until more bytes arrive.
    async fn handle_incoming(&mut self, buf: &mut Vec<u8>) -> Result<(), Error> {
        loop {
            if self.status == Status::Disconnected {
                buf.clear();
                return Ok(());
            }
            let Some(packet_len) = Self::complete_packet_len(buf)? else {
                return Ok(());
            };
            let packet: Vec<u8> = buf.drain(..packet_len).collect();
            self.handle_client_packet(&packet).await?;
        }
    }

    /// Length of the first complete packet in `buf`, or `None` when
    /// more bytes are needed.
    fn complete_packet_len(buf: &[u8]) -> Result<Option<usize>, Error> {
        if buf.is_empty() {
            return Ok(None);
        }
        let mut ba = ByteArray::new(buf);
        match FixedHeader::decode(&mut ba) {
            Ok(header) => {
                let total = header.bytes() + header.remaining_length();
                if buf.len() >= total {
                    Ok(Some(total))
                } else {
                    Ok(None)
                }
            }
            // The length field itself is still incomplete.
            Err(DecodeError::OutOfRange) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Encode and write one packet to the client.
    async fn send<P: EncodePacket + Packet>(&mut self, packet: P) -> Result<(), Error> {
        // The first packet sent from the Server to the Client MUST be a
        // CONNACK packet [MQTT-3.2.0-1].
        if self.status == Status::Connecting && packet.packet_type() != PacketType::ConnectAck {
            log::error!(
                "session {}: refusing to send {:?} before CONNACK",
                self.id,
                packet.packet_type()
            );
            return Err(Error::new(ErrorKind::StatusError, "CONNACK must be sent first"));
        }
        if self.status == Status::Disconnected {
            return Err(Error::new(
                ErrorKind::SendError,
                "Cannot send packet on disconnected stream",
            ));
        }

        let mut buf = Vec::new();
        packet.encode(&mut buf)?;
        self.stream.write(&buf).await.map(drop)?;
        Ok(())
    }

    /// Write the PUBLISH for an in-flight entry.
    async fn send_inflight_publish(&mut self, packet_id: PacketId) -> Result<(), Error> {
        let Some(entry) = self.inflight.get(packet_id) else {
            return Ok(());
        };
        let mut packet = entry.message().to_packet(packet_id)?;
        if entry.dup() {
            packet.set_dup(true)?;
        }
        self.send(packet).await
    }

    async fn send_resend_action(&mut self, action: ResendAction) -> Result<(), Error> {
        match action {
            ResendAction::Publish(packet_id) => self.send_inflight_publish(packet_id).await,
            ResendAction::Pubrel(packet_id) => {
                self.send(PublishReleasePacket::new(packet_id)).await
            }
        }
    }

    /// Housekeeping: connect timeout, keep alive deadline and the
    /// retransmission scan.
    async fn on_tick(&mut self) {
        let now = Instant::now();

        // If the Server does not receive a CONNECT packet within a
        // reasonable amount of time after the network connection is
        // established, it SHOULD close the connection.
        if self.status == Status::Invalid
            && self.config.connect_timeout() > 0
            && self.accepted_at.elapsed().as_secs() > self.config.connect_timeout()
        {
            log::info!("session {}: connect timeout", self.id);
            self.halt(DisconnectReason::TransportClosed);
            return;
        }

        if self.status != Status::Connected {
            return;
        }

        // If the Keep Alive value is non-zero and the Server does not
        // receive a Control Packet within one and a half times the Keep
        // Alive period, it MUST disconnect [MQTT-3.1.2-24].
        if let Some(timeout) = self.keep_alive_timeout {
            if self.last_active.elapsed() > timeout {
                log::warn!(
                    "session {}: keep alive expired for client {:?}",
                    self.id,
                    self.client_id
                );
                self.halt(DisconnectReason::KeepAliveExpired);
                return;
            }
        }

        let (resend, expired) = self.inflight.due_retransmits(now);
        for action in resend {
            if let Err(err) = self.send_resend_action(action).await {
                log::error!("session {}: retransmit failed: {err}", self.id);
                self.halt(DisconnectReason::TransportClosed);
                return;
            }
        }
        for entry in &expired {
            log::warn!(
                "session {}: delivery expired for packet {} on {:?}",
                self.id,
                entry.packet_id(),
                entry.message().topic()
            );
        }
        if !expired.is_empty() {
            let (promoted, dropped) = self.inflight.promote_backlog(now);
            for message in &dropped {
                log::warn!(
                    "session {}: delivery dropped, no free packet id for {:?}",
                    self.id,
                    message.topic()
                );
            }
            for packet_id in promoted {
                if let Err(err) = self.send_inflight_publish(packet_id).await {
                    log::error!("session {}: send failed: {err}", self.id);
                    self.halt(DisconnectReason::TransportClosed);
                    return;
                }
            }
        }
    }
}
