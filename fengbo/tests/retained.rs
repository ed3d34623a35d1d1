// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Retained message behavior end to end.

mod common;

use std::time::Duration;

use codec::v3::PublishAckPacket;
use codec::QoS;
use common::{settle, start_broker, TestClient};

#[tokio::test]
async fn test_retained_message_replayed_to_new_subscriber() {
    // Scenario S2: a retained QoS 1 publish arrives before any
    // subscriber; a later subscription at QoS 2 receives it at QoS 1
    // with RETAIN set.
    let (mut broker, addr) = start_broker("").await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos1("status", b"on", true, 1).await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("status", QoS::ExactOnce, 1).await;

    let publish = subscriber.expect_publish().await;
    assert_eq!(publish.topic(), "status");
    assert_eq!(publish.payload(), b"on");
    assert_eq!(publish.qos(), QoS::AtLeastOnce);
    assert!(publish.retain(), "retained replay keeps the RETAIN flag");
    subscriber.send(PublishAckPacket::new(publish.packet_id())).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_empty_payload_clears_retained_entry() {
    // Scenario S3: publishing an empty retained payload deletes the
    // entry; later subscribers receive nothing.
    let (mut broker, addr) = start_broker("").await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos1("status", b"on", true, 1).await;
    publisher.publish_qos0("status", b"", true).await;
    settle().await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("status", QoS::ExactOnce, 1).await;
    subscriber.expect_silence(Duration::from_millis(300)).await;

    let stats = broker.query_stats().await.unwrap();
    assert_eq!(stats.retained_topics, 0);

    broker.shutdown();
}

#[tokio::test]
async fn test_qos0_retained_publish_is_stored() {
    let (mut broker, addr) = start_broker("").await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos0("door", b"open", true).await;
    settle().await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("door", QoS::AtMostOnce, 1).await;

    let publish = subscriber.expect_publish().await;
    assert_eq!(publish.payload(), b"open");
    assert!(publish.retain());

    broker.shutdown();
}

#[tokio::test]
async fn test_retained_replaced_by_newer_publish() {
    let (mut broker, addr) = start_broker("").await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos1("status", b"on", true, 1).await;
    publisher.publish_qos1("status", b"off", true, 2).await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("status", QoS::AtMostOnce, 1).await;

    let publish = subscriber.expect_publish().await;
    assert_eq!(publish.payload(), b"off");
    subscriber.expect_silence(Duration::from_millis(300)).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_wildcard_subscription_replays_all_matching_retained() {
    let (mut broker, addr) = start_broker("").await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos0("sensors/a/temp", b"1", true).await;
    publisher.publish_qos0("sensors/b/temp", b"2", true).await;
    publisher.publish_qos0("other", b"3", true).await;
    settle().await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("sensors/#", QoS::AtMostOnce, 1).await;

    // Replay is sorted by topic.
    let first = subscriber.expect_publish().await;
    assert_eq!(first.topic(), "sensors/a/temp");
    let second = subscriber.expect_publish().await;
    assert_eq!(second.topic(), "sensors/b/temp");
    subscriber.expect_silence(Duration::from_millis(300)).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_routed_delivery_clears_retain_flag() {
    // RETAIN stays set only on replayed snapshots; live routing to an
    // established subscription clears it [MQTT-3.3.1-9].
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "s", true).await;
    subscriber.subscribe("status", QoS::AtMostOnce, 1).await;

    let mut publisher = TestClient::connect(addr, "p", true).await;
    publisher.publish_qos0("status", b"on", true).await;

    let publish = subscriber.expect_publish().await;
    assert_eq!(publish.payload(), b"on");
    assert!(!publish.retain());

    broker.shutdown();
}
