// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Session persistence across reconnects.

mod common;

use std::time::Duration;

use codec::v3::PublishAckPacket;
use codec::QoS;
use common::{settle, start_broker, TestClient};

#[tokio::test]
async fn test_persistent_session_resumes_with_queued_messages() {
    // Scenario S5: a persistent subscriber misses three QoS 1 publishes
    // while offline and receives them in order on reconnect, DUP=0.
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "pers", false).await;
    subscriber.subscribe("work/#", QoS::AtLeastOnce, 1).await;
    subscriber.disconnect().await;

    let mut publisher = TestClient::connect(addr, "pub", true).await;
    publisher.publish_qos1("work/a", b"1", false, 1).await;
    publisher.publish_qos1("work/b", b"2", false, 2).await;
    publisher.publish_qos1("work/c", b"3", false, 3).await;
    settle().await;

    let (mut subscriber, connack) =
        TestClient::connect_full(addr, "pers", false, 60, None).await;
    assert!(connack.session_present());

    for expected in [("work/a", b"1"), ("work/b", b"2"), ("work/c", b"3")] {
        let publish = subscriber.expect_publish().await;
        assert_eq!(publish.topic(), expected.0);
        assert_eq!(publish.payload(), expected.1);
        assert_eq!(publish.qos(), QoS::AtLeastOnce);
        assert!(!publish.dup(), "queued messages are first transmissions");
        subscriber.send(PublishAckPacket::new(publish.packet_id())).await;
    }
    subscriber.expect_silence(Duration::from_millis(300)).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_unacked_inflight_resent_with_dup_on_resume() {
    let (mut broker, addr) = start_broker("retry_interval = 30").await;

    let mut subscriber = TestClient::connect(addr, "pers", false).await;
    subscriber.subscribe("jobs", QoS::AtLeastOnce, 1).await;

    let mut publisher = TestClient::connect(addr, "pub", true).await;
    publisher.publish_qos1("jobs", b"task", false, 1).await;

    // Receive but never acknowledge, then drop the transport.
    let first = subscriber.expect_publish().await;
    assert!(!first.dup());
    drop(subscriber);
    settle().await;

    let (mut subscriber, connack) =
        TestClient::connect_full(addr, "pers", false, 60, None).await;
    assert!(connack.session_present());

    let again = subscriber.expect_publish().await;
    assert!(again.dup(), "unacked in-flight is re-sent with DUP=1");
    assert_eq!(again.packet_id(), first.packet_id());
    assert_eq!(again.payload(), b"task");
    subscriber.send(PublishAckPacket::new(again.packet_id())).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_clean_session_discards_subscriptions_and_queue() {
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "c", false).await;
    subscriber.subscribe("work/#", QoS::AtLeastOnce, 1).await;
    subscriber.disconnect().await;

    let mut publisher = TestClient::connect(addr, "pub", true).await;
    publisher.publish_qos1("work/a", b"missed", false, 1).await;
    settle().await;

    // Reconnecting with clean_session=1 erases everything.
    let (mut subscriber, connack) =
        TestClient::connect_full(addr, "c", true, 60, None).await;
    assert!(!connack.session_present());
    subscriber.expect_silence(Duration::from_millis(300)).await;

    publisher.publish_qos1("work/b", b"also missed", false, 2).await;
    subscriber.expect_silence(Duration::from_millis(300)).await;

    // And the persistence is gone for the next connect too.
    subscriber.disconnect().await;
    let (_subscriber, connack) =
        TestClient::connect_full(addr, "c", false, 60, None).await;
    assert!(!connack.session_present());

    broker.shutdown();
}

#[tokio::test]
async fn test_clean_session_never_reports_session_present() {
    let (mut broker, addr) = start_broker("").await;

    let (subscriber, connack) = TestClient::connect_full(addr, "c", true, 60, None).await;
    assert!(!connack.session_present());
    subscriber.disconnect().await;

    let (_subscriber, connack) = TestClient::connect_full(addr, "c", true, 60, None).await;
    assert!(!connack.session_present());

    broker.shutdown();
}

#[tokio::test]
async fn test_persistent_subscriptions_survive_reconnect() {
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "pers", false).await;
    subscriber.subscribe("alerts", QoS::AtMostOnce, 1).await;
    subscriber.disconnect().await;

    // No re-subscribe after resume; the trie entry is still there.
    let (mut subscriber, connack) =
        TestClient::connect_full(addr, "pers", false, 60, None).await;
    assert!(connack.session_present());

    let mut publisher = TestClient::connect(addr, "pub", true).await;
    publisher.publish_qos0("alerts", b"ping", false).await;

    let publish = subscriber.expect_publish().await;
    assert_eq!(publish.topic(), "alerts");

    broker.shutdown();
}

#[tokio::test]
async fn test_offline_qos0_messages_are_not_queued() {
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "pers", false).await;
    subscriber.subscribe("lossy", QoS::AtMostOnce, 1).await;
    subscriber.disconnect().await;

    let mut publisher = TestClient::connect(addr, "pub", true).await;
    publisher.publish_qos0("lossy", b"gone", false).await;
    settle().await;

    let (mut subscriber, connack) =
        TestClient::connect_full(addr, "pers", false, 60, None).await;
    assert!(connack.session_present());
    subscriber.expect_silence(Duration::from_millis(300)).await;

    broker.shutdown();
}

#[tokio::test]
async fn test_offline_pending_counts_visible_in_stats() {
    let (mut broker, addr) = start_broker("").await;

    let mut subscriber = TestClient::connect(addr, "pers", false).await;
    subscriber.subscribe("work/#", QoS::AtLeastOnce, 1).await;
    subscriber.disconnect().await;

    let mut publisher = TestClient::connect(addr, "pub", true).await;
    publisher.publish_qos1("work/a", b"1", false, 1).await;
    publisher.publish_qos1("work/b", b"2", false, 2).await;
    settle().await;

    let stats = broker.query_stats().await.unwrap();
    let session = stats
        .sessions
        .iter()
        .find(|session| session.client_id == "pers")
        .expect("persistent session should be listed");
    assert!(!session.online);
    assert_eq!(session.pending_messages, 2);

    broker.shutdown();
}
