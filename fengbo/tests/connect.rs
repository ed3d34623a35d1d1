// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Connection handshake behavior.

mod common;

use std::time::Duration;

use codec::v3::{ConnectPacket, ConnectReturnCode, PingRequestPacket, PingResponsePacket};
use codec::{EncodePacket, QoS};
use common::{decode, settle, start_broker, TestClient};

#[tokio::test]
async fn test_connect_accepted() {
    let (mut broker, addr) = start_broker("").await;

    let (_client, connack) = TestClient::connect_full(addr, "c1", true, 60, None).await;
    assert_eq!(connack.return_code(), ConnectReturnCode::Accepted);
    assert!(!connack.session_present());

    broker.shutdown();
}

#[tokio::test]
async fn test_ping_is_answered() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::connect(addr, "c1", true).await;
    client.send(PingRequestPacket::new()).await;
    let response = client.recv_packet().await.expect("expected PINGRESP");
    let _packet: PingResponsePacket = decode(&response);

    broker.shutdown();
}

#[tokio::test]
async fn test_unacceptable_protocol_level_refused() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::open(addr).await;
    // CONNECT with protocol level 3 (MQTT 3.1).
    let connect = [
        0x10, 0x0e, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x03, 0x02, 0x00, 0x3c, 0x00, 0x02, b'c',
        b'1',
    ];
    client.send_raw(&connect).await;

    let connack = client.expect_connack().await;
    assert_eq!(connack.return_code(), ConnectReturnCode::UnacceptedProtocol);
    assert!(!connack.session_present());
    client.expect_closed().await;

    broker.shutdown();
}

#[tokio::test]
async fn test_bad_protocol_name_closes_without_connack() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::open(addr).await;
    let connect = [
        0x10, 0x0e, 0x00, 0x04, b'M', b'Q', b'T', b'X', 0x04, 0x02, 0x00, 0x3c, 0x00, 0x02, b'c',
        b'1',
    ];
    client.send_raw(&connect).await;
    client.expect_closed().await;

    broker.shutdown();
}

#[tokio::test]
async fn test_first_packet_must_be_connect() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::open(addr).await;
    client.send(PingRequestPacket::new()).await;
    client.expect_closed().await;

    broker.shutdown();
}

#[tokio::test]
async fn test_second_connect_is_a_protocol_violation() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::connect(addr, "c1", true).await;
    let packet = ConnectPacket::new("c1").unwrap();
    client.send(packet).await;
    client.expect_closed().await;

    broker.shutdown();
}

#[tokio::test]
async fn test_empty_client_id_gets_assigned_one() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::open(addr).await;
    // Zero-byte client id with CleanSession=1.
    let connect = [
        0x10, 0x0c, 0x00, 0x04, b'M', b'Q', b'T', b'T', 0x04, 0x02, 0x00, 0x3c, 0x00, 0x00,
    ];
    client.send_raw(&connect).await;

    let connack = client.expect_connack().await;
    assert_eq!(connack.return_code(), ConnectReturnCode::Accepted);

    broker.shutdown();
}

#[tokio::test]
async fn test_malformed_packet_closes_connection() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::connect(addr, "c1", true).await;
    // Packet type 0 is not a valid control packet.
    client.send_raw(&[0x00, 0x00]).await;
    client.expect_closed().await;

    broker.shutdown();
}

#[tokio::test]
async fn test_takeover_closes_older_attachment() {
    let (mut broker, addr) = start_broker("").await;

    let mut first = TestClient::connect(addr, "dup", true).await;
    let _second = TestClient::connect(addr, "dup", true).await;

    // The first connection is dropped by the broker [MQTT-3.1.4-2].
    first.expect_closed().await;

    broker.shutdown();
}

#[tokio::test]
async fn test_coalesced_packets_are_split() {
    let (mut broker, addr) = start_broker("").await;

    // CONNECT and PINGREQ in a single TCP segment.
    let mut client = TestClient::open(addr).await;
    let mut bytes = Vec::new();
    ConnectPacket::new("c1").unwrap().encode(&mut bytes).unwrap();
    PingRequestPacket::new().encode(&mut bytes).unwrap();
    client.send_raw(&bytes).await;

    let connack = client.expect_connack().await;
    assert_eq!(connack.return_code(), ConnectReturnCode::Accepted);
    let response = client.recv_packet().await.expect("expected PINGRESP");
    let _packet: PingResponsePacket = decode(&response);

    broker.shutdown();
}

#[tokio::test]
async fn test_stats_report_active_clients_and_state() {
    let (mut broker, addr) = start_broker("").await;

    let mut publisher = TestClient::connect(addr, "stats-pub", true).await;
    publisher.publish_qos1("status", b"on", true, 1).await;
    let _subscriber = TestClient::connect(addr, "stats-sub", false).await;
    settle().await;

    let stats = broker.query_stats().await.unwrap();
    let mut active = stats.active_client_ids();
    active.sort_unstable();
    assert_eq!(active, vec!["stats-pub", "stats-sub"]);
    assert_eq!(stats.retained_topics, 1);

    broker.shutdown();
}

#[tokio::test]
async fn test_qos0_publish_needs_no_ack() {
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("loop/echo", QoS::AtMostOnce, 1).await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos0("loop/echo", b"fire", false).await;

    let publish = subscriber.expect_publish().await;
    assert_eq!(publish.topic(), "loop/echo");
    assert_eq!(publish.payload(), b"fire");
    assert_eq!(publish.qos(), QoS::AtMostOnce);
    // No more traffic on either side.
    publisher.expect_silence(Duration::from_millis(200)).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_self_delivery_is_permitted() {
    let (mut broker, addr) = start_broker("").await;

    let mut client = TestClient::connect(addr, "loopback", true).await;
    client.subscribe("self/topic", QoS::AtMostOnce, 1).await;
    client.publish_qos0("self/topic", b"me", false).await;

    let publish = client.expect_publish().await;
    assert_eq!(publish.topic(), "self/topic");
    assert_eq!(publish.payload(), b"me");

    broker.shutdown();
}
