// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Will message lifecycle.

mod common;

use std::time::Duration;

use codec::v3::PublishAckPacket;
use codec::QoS;
use common::{start_broker, TestClient};

#[tokio::test]
async fn test_will_published_on_keep_alive_timeout() {
    // Scenario S4: keep_alive=2, will on `c/down`. After more than
    // 2 x 1.5 seconds of silence the will is routed to subscribers.
    let (mut broker, addr) = start_broker("").await;

    let mut watcher = TestClient::connect(addr, "watcher", true).await;
    watcher.subscribe("c/down", QoS::AtLeastOnce, 1).await;

    let (_client, connack) = TestClient::connect_full(
        addr,
        "c",
        true,
        2,
        Some(("c/down", b"bye", QoS::AtLeastOnce, false)),
    )
    .await;
    assert_eq!(
        connack.return_code(),
        codec::v3::ConnectReturnCode::Accepted
    );

    // Stay silent past the keep alive window.
    let publish = watcher.expect_publish_within(Duration::from_secs(6)).await;
    assert_eq!(publish.topic(), "c/down");
    assert_eq!(publish.payload(), b"bye");
    assert_eq!(publish.qos(), QoS::AtLeastOnce);
    watcher.send(PublishAckPacket::new(publish.packet_id())).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_will_published_on_transport_drop() {
    let (mut broker, addr) = start_broker("").await;

    let mut watcher = TestClient::connect(addr, "watcher", true).await;
    watcher.subscribe("c/down", QoS::AtMostOnce, 1).await;

    let (client, _connack) = TestClient::connect_full(
        addr,
        "c",
        true,
        60,
        Some(("c/down", b"lost", QoS::AtMostOnce, false)),
    )
    .await;
    drop(client);

    let publish = watcher.expect_publish().await;
    assert_eq!(publish.topic(), "c/down");
    assert_eq!(publish.payload(), b"lost");

    broker.shutdown();
}

#[tokio::test]
async fn test_clean_disconnect_discards_will() {
    let (mut broker, addr) = start_broker("").await;

    let mut watcher = TestClient::connect(addr, "watcher", true).await;
    watcher.subscribe("c/down", QoS::AtMostOnce, 1).await;

    let (client, _connack) = TestClient::connect_full(
        addr,
        "c",
        true,
        60,
        Some(("c/down", b"bye", QoS::AtMostOnce, false)),
    )
    .await;
    client.disconnect().await;

    watcher.expect_silence(Duration::from_secs(1)).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_takeover_fires_the_old_will() {
    let (mut broker, addr) = start_broker("").await;

    let mut watcher = TestClient::connect(addr, "watcher", true).await;
    watcher.subscribe("c/down", QoS::AtMostOnce, 1).await;

    let (_first, _) = TestClient::connect_full(
        addr,
        "c",
        true,
        60,
        Some(("c/down", b"superseded", QoS::AtMostOnce, false)),
    )
    .await;
    // The second connection supersedes the first; the first closed
    // without DISCONNECT, so its will fires.
    let (_second, _) = TestClient::connect_full(addr, "c", true, 60, None).await;

    let publish = watcher.expect_publish().await;
    assert_eq!(publish.payload(), b"superseded");

    broker.shutdown();
}

#[tokio::test]
async fn test_retained_will_enters_retained_store() {
    let (mut broker, addr) = start_broker("").await;

    let (client, _connack) = TestClient::connect_full(
        addr,
        "c",
        true,
        60,
        Some(("c/state", b"offline", QoS::AtMostOnce, true)),
    )
    .await;
    drop(client);
    tokio::time::sleep(Duration::from_millis(200)).await;

    // A subscriber arriving after the abnormal close still sees the
    // will, via the retained store.
    let mut late = TestClient::connect(addr, "late", true).await;
    late.subscribe("c/state", QoS::AtMostOnce, 1).await;
    let publish = late.expect_publish().await;
    assert_eq!(publish.payload(), b"offline");
    assert!(publish.retain());

    broker.shutdown();
}

#[tokio::test]
async fn test_protocol_violation_fires_will() {
    let (mut broker, addr) = start_broker("").await;

    let mut watcher = TestClient::connect(addr, "watcher", true).await;
    watcher.subscribe("c/down", QoS::AtMostOnce, 1).await;

    let (mut client, _connack) = TestClient::connect_full(
        addr,
        "c",
        true,
        60,
        Some(("c/down", b"crashed", QoS::AtMostOnce, false)),
    )
    .await;
    // Malformed packet: the broker closes the attachment abnormally.
    client.send_raw(&[0x00, 0x00]).await;

    let publish = watcher.expect_publish().await;
    assert_eq!(publish.payload(), b"crashed");

    broker.shutdown();
}
