// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Shared harness: starts a broker on a loopback port and drives it
//! with a raw codec-level client.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use codec::v3::{
    ConnectAckPacket, ConnectPacket, ConnectReturnCode, DisconnectPacket, PublishAckPacket,
    PublishCompletePacket, PublishPacket, PublishReceivedPacket, PublishReleasePacket,
    SubscribeAckPacket, SubscribePacket, UnsubscribeAckPacket,
};
use codec::{ByteArray, DecodePacket, EncodePacket, FixedHeader, PacketId, QoS};
use fengbo::config::Config;
use fengbo::server::{Server, ServerHandle};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Start a broker on 127.0.0.1 with an ephemeral port.
///
/// `message_options` are appended to the `[message]` table, so tests
/// can shrink retry intervals or the in-flight window.
pub async fn start_broker(message_options: &str) -> (ServerHandle, SocketAddr) {
    let _ = env_logger::builder().is_test(true).try_init();
    let toml_text = format!(
        "[[listeners]]\naddress = \"127.0.0.1:0\"\n\n[message]\n{message_options}\n"
    );
    let config: Config = toml::from_str(&toml_text).expect("invalid test config");
    let handle = Server::new(config)
        .start()
        .await
        .expect("broker failed to start");
    let addr = handle.addresses()[0];
    (handle, addr)
}

/// Byte-level MQTT client speaking through the codec.
pub struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestClient {
    /// Open a TCP connection without sending anything.
    pub async fn open(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    /// Open a connection and complete the MQTT handshake.
    pub async fn connect(addr: SocketAddr, client_id: &str, clean_session: bool) -> Self {
        let (client, connack) = Self::connect_full(addr, client_id, clean_session, 60, None).await;
        assert_eq!(connack.return_code(), ConnectReturnCode::Accepted);
        client
    }

    /// Open a connection, send CONNECT with all options, and return the
    /// CONNACK alongside the client.
    pub async fn connect_full(
        addr: SocketAddr,
        client_id: &str,
        clean_session: bool,
        keep_alive: u16,
        will: Option<(&str, &[u8], QoS, bool)>,
    ) -> (Self, ConnectAckPacket) {
        let mut client = Self::open(addr).await;
        let mut packet = ConnectPacket::new(client_id).expect("bad client id");
        packet.set_keep_alive(keep_alive);
        if let Some((topic, payload, qos, retain)) = will {
            packet
                .set_will(topic, payload, qos, retain)
                .expect("bad will");
        }
        let mut flags = packet.connect_flags().clone();
        flags.set_clean_session(clean_session);
        packet.set_connect_flags(flags);
        client.send(packet).await;
        let connack = client.expect_connack().await;
        (client, connack)
    }

    pub async fn send<P: EncodePacket>(&mut self, packet: P) {
        let mut buf = Vec::new();
        packet.encode(&mut buf).expect("encode failed");
        self.stream.write_all(&buf).await.expect("write failed");
    }

    pub async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write failed");
    }

    /// Read one complete packet, or `None` on timeout or close.
    pub async fn recv_packet(&mut self) -> Option<Vec<u8>> {
        self.recv_packet_within(RECV_TIMEOUT).await
    }

    pub async fn recv_packet_within(&mut self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(len) = complete_packet_len(&self.buf) {
                return Some(self.buf.drain(..len).collect());
            }
            let mut chunk = [0u8; 1024];
            match tokio::time::timeout_at(deadline, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => return None,
                Ok(Ok(n)) => self.buf.extend_from_slice(&chunk[..n]),
                Ok(Err(_)) | Err(_) => return None,
            }
        }
    }

    /// Assert that nothing arrives for `duration`.
    pub async fn expect_silence(&mut self, duration: Duration) {
        assert!(
            self.recv_packet_within(duration).await.is_none(),
            "expected no packet"
        );
    }

    /// Assert the broker closed the connection without further packets.
    pub async fn expect_closed(&mut self) {
        assert!(
            self.recv_packet_within(RECV_TIMEOUT).await.is_none(),
            "expected connection close"
        );
    }

    pub async fn expect_connack(&mut self) -> ConnectAckPacket {
        decode(&self.recv_packet().await.expect("expected CONNACK"))
    }

    pub async fn expect_suback(&mut self) -> SubscribeAckPacket {
        decode(&self.recv_packet().await.expect("expected SUBACK"))
    }

    pub async fn expect_unsuback(&mut self) -> UnsubscribeAckPacket {
        decode(&self.recv_packet().await.expect("expected UNSUBACK"))
    }

    pub async fn expect_publish(&mut self) -> PublishPacket {
        decode(&self.recv_packet().await.expect("expected PUBLISH"))
    }

    pub async fn expect_publish_within(&mut self, timeout: Duration) -> PublishPacket {
        decode(
            &self
                .recv_packet_within(timeout)
                .await
                .expect("expected PUBLISH"),
        )
    }

    pub async fn expect_puback(&mut self) -> PublishAckPacket {
        decode(&self.recv_packet().await.expect("expected PUBACK"))
    }

    pub async fn expect_pubrec(&mut self) -> PublishReceivedPacket {
        decode(&self.recv_packet().await.expect("expected PUBREC"))
    }

    pub async fn expect_pubrel(&mut self) -> PublishReleasePacket {
        decode(&self.recv_packet().await.expect("expected PUBREL"))
    }

    pub async fn expect_pubcomp(&mut self) -> PublishCompletePacket {
        decode(&self.recv_packet().await.expect("expected PUBCOMP"))
    }

    /// Subscribe to one filter and return the SUBACK.
    pub async fn subscribe(&mut self, filter: &str, qos: QoS, packet_id: u16) -> SubscribeAckPacket {
        let packet = SubscribePacket::new(filter, qos, PacketId::new(packet_id))
            .expect("bad filter");
        self.send(packet).await;
        let suback = self.expect_suback().await;
        assert_eq!(suback.packet_id(), packet_id);
        suback
    }

    /// Publish at QoS 0 (no handshake).
    pub async fn publish_qos0(&mut self, topic: &str, payload: &[u8], retain: bool) {
        let mut packet = PublishPacket::new(topic, QoS::AtMostOnce, payload).expect("bad topic");
        packet.set_retain(retain);
        self.send(packet).await;
    }

    /// Publish at QoS 1 and wait for the PUBACK.
    pub async fn publish_qos1(&mut self, topic: &str, payload: &[u8], retain: bool, packet_id: u16) {
        let mut packet = PublishPacket::new(topic, QoS::AtLeastOnce, payload).expect("bad topic");
        packet.set_retain(retain);
        packet.set_packet_id(PacketId::new(packet_id));
        self.send(packet).await;
        let puback = self.expect_puback().await;
        assert_eq!(puback.packet_id(), packet_id);
    }

    /// Publish at QoS 2 and run the full PUBREC/PUBREL/PUBCOMP exchange.
    pub async fn publish_qos2(&mut self, topic: &str, payload: &[u8], retain: bool, packet_id: u16) {
        let mut packet = PublishPacket::new(topic, QoS::ExactOnce, payload).expect("bad topic");
        packet.set_retain(retain);
        packet.set_packet_id(PacketId::new(packet_id));
        self.send(packet).await;
        let pubrec = self.expect_pubrec().await;
        assert_eq!(pubrec.packet_id(), packet_id);
        self.send(PublishReleasePacket::new(PacketId::new(packet_id)))
            .await;
        let pubcomp = self.expect_pubcomp().await;
        assert_eq!(pubcomp.packet_id(), packet_id);
    }

    /// Send a clean DISCONNECT and drop the connection.
    pub async fn disconnect(mut self) {
        self.send(DisconnectPacket::new()).await;
        // Give the broker a moment to process before the socket drops.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

fn complete_packet_len(buf: &[u8]) -> Option<usize> {
    if buf.is_empty() {
        return None;
    }
    let mut ba = ByteArray::new(buf);
    match FixedHeader::decode(&mut ba) {
        Ok(header) => {
            let total = header.bytes() + header.remaining_length();
            (buf.len() >= total).then_some(total)
        }
        Err(_err) => None,
    }
}

pub fn decode<P: DecodePacket>(buf: &[u8]) -> P {
    let mut ba = ByteArray::new(buf);
    P::decode(&mut ba).expect("failed to decode packet")
}

/// Let in-flight broker bookkeeping settle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}
