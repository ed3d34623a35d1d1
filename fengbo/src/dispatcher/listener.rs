// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Listener cmd handlers: connection lifecycle and publish routing.

use bytes::Bytes;

use codec::v3::{
    ConnectAckPacket, ConnectReturnCode, PublishPacket, SubscribeAck, SubscribeAckPacket,
    SubscribePacket, UnsubscribePacket,
};
use codec::QoS;

use super::{Dispatcher, DisconnectOutcome};
use crate::commands::{
    ConnectInfo, DisconnectReason, DispatcherToListenerCmd, ListenerToDispatcherCmd,
};
use crate::error::Error;
use crate::session::CachedSession;
use crate::types::{PublishMessage, SessionGid};

impl Dispatcher {
    pub(super) async fn handle_listener_cmd(
        &mut self,
        cmd: ListenerToDispatcherCmd,
    ) -> Result<(), Error> {
        match cmd {
            ListenerToDispatcherCmd::SessionConnected(gid, info) => {
                self.on_session_connected(gid, info).await
            }
            ListenerToDispatcherCmd::Publish(packet) => {
                self.on_session_publish(&packet).await;
                Ok(())
            }
            ListenerToDispatcherCmd::Subscribe(gid, packet) => {
                self.on_session_subscribe(gid, packet).await
            }
            ListenerToDispatcherCmd::Unsubscribe(gid, packet) => {
                self.on_session_unsubscribe(gid, &packet);
                Ok(())
            }
            ListenerToDispatcherCmd::SessionClosed(gid, client_id, reason, snapshot) => {
                self.on_session_closed(gid, &client_id, reason, snapshot)
                    .await;
                Ok(())
            }
        }
    }

    async fn on_session_connected(
        &mut self,
        gid: SessionGid,
        info: ConnectInfo,
    ) -> Result<(), Error> {
        log::info!(
            "dispatcher: client {:?} connected, clean_session={}",
            info.client_id,
            info.clean_session
        );

        let outcome = self
            .store
            .connect(&info.client_id, info.clean_session, gid);

        // A second connection with the same client id supersedes the
        // first [MQTT-3.1.4-2]. The old attachment is closed without a
        // DISCONNECT from its client, so its will fires.
        if let Some(old_gid) = outcome.taken_over {
            self.fire_will(&info.client_id).await;
            if let Err(err) = self
                .send_to_listener(
                    old_gid,
                    DispatcherToListenerCmd::DisconnectSession(old_gid.session_id()),
                )
                .await
            {
                log::error!("dispatcher: failed to close superseded attachment: {err}");
            }
        }

        // A reconnect within the will delay window cancels the pending
        // will of the earlier attachment.
        self.pending_wills.remove(&info.client_id);

        if info.clean_session {
            self.trie.remove_client(&info.client_id);
        }
        match info.will {
            Some(will) => {
                self.wills.insert(info.client_id.clone(), will);
            }
            None => {
                self.wills.remove(&info.client_id);
            }
        }

        let ack_packet = ConnectAckPacket::new(outcome.session_present, ConnectReturnCode::Accepted);
        self.send_to_listener(
            gid,
            DispatcherToListenerCmd::ConnectAck(gid.session_id(), ack_packet, outcome.resumed),
        )
        .await
    }

    async fn on_session_publish(&mut self, packet: &PublishPacket) {
        self.route_publish(
            packet.topic().to_string(),
            packet.payload_bytes(),
            packet.qos(),
            packet.retain(),
        )
        .await;
    }

    /// Fan a publish out to every matching subscriber.
    ///
    /// The retained store is updated first, then each match gets the
    /// message at `min(publish_qos, subscribe_qos)`. Offline persistent
    /// sessions queue QoS 1/2 deliveries; QoS 0 to an offline client is
    /// dropped.
    pub(super) async fn route_publish(
        &mut self,
        topic: String,
        payload: Bytes,
        qos: QoS,
        retain: bool,
    ) {
        if retain {
            self.retained.set(&topic, payload.clone(), qos);
        }

        let matches = self.trie.matches(&topic);
        for (client_id, sub_qos) in matches {
            let effective_qos = qos.min(sub_qos);
            let message =
                PublishMessage::new(topic.clone(), payload.clone(), effective_qos, false);

            if let Some(gid) = self.store.live(&client_id) {
                if let Err(err) = self
                    .send_to_listener(
                        gid,
                        DispatcherToListenerCmd::Publish(gid.session_id(), message),
                    )
                    .await
                {
                    log::error!("dispatcher: delivery to {client_id:?} failed: {err}");
                }
            } else if effective_qos > QoS::AtMostOnce {
                self.store.queue_offline(&client_id, message);
            }
        }
    }

    async fn on_session_subscribe(
        &mut self,
        gid: SessionGid,
        packet: SubscribePacket,
    ) -> Result<(), Error> {
        let Some(client_id) = self.store.client_of(gid) else {
            log::error!("dispatcher: subscribe from unknown attachment {gid:?}");
            return Ok(());
        };
        let client_id = client_id.to_string();

        // A SUBSCRIBE with multiple filters is handled as a sequence of
        // single subscriptions with one combined SUBACK [MQTT-3.8.4-4].
        // Invalid filters fail individually, the rest proceed.
        let mut acknowledgements = Vec::with_capacity(packet.topics().len());
        let mut admitted = Vec::new();
        for topic in packet.topics() {
            if self.trie.subscribe(&client_id, topic.topic(), topic.qos()) {
                self.store
                    .record_subscription(&client_id, topic.topic(), topic.qos());
                acknowledgements.push(SubscribeAck::QoS(topic.qos()));
                admitted.push((topic.topic().to_string(), topic.qos()));
            } else {
                acknowledgements.push(SubscribeAck::Failed);
            }
        }

        let ack_packet = SubscribeAckPacket::with_vec(packet.packet_id(), acknowledgements);
        self.send_to_listener(
            gid,
            DispatcherToListenerCmd::SubscribeAck(gid.session_id(), ack_packet),
        )
        .await?;

        // Replay retained messages after the SUBACK, with RETAIN kept
        // set and the QoS capped at the granted level [MQTT-3.3.1-8]
        // [MQTT-3.8.4-3].
        let mut replay = Vec::new();
        for (filter, granted_qos) in &admitted {
            for retained in self.retained.matching(filter) {
                let effective_qos = retained.qos().min(*granted_qos);
                replay.push(PublishMessage::new(
                    retained.topic().to_string(),
                    retained.payload().clone(),
                    effective_qos,
                    true,
                ));
            }
        }
        for message in replay {
            self.send_to_listener(
                gid,
                DispatcherToListenerCmd::Publish(gid.session_id(), message),
            )
            .await?;
        }
        Ok(())
    }

    fn on_session_unsubscribe(&mut self, gid: SessionGid, packet: &UnsubscribePacket) {
        let Some(client_id) = self.store.client_of(gid) else {
            log::error!("dispatcher: unsubscribe from unknown attachment {gid:?}");
            return;
        };
        let client_id = client_id.to_string();

        for topic in packet.topics() {
            self.trie.unsubscribe(&client_id, topic.as_ref());
            self.store.remove_subscription(&client_id, topic.as_ref());
        }
    }

    async fn on_session_closed(
        &mut self,
        gid: SessionGid,
        client_id: &str,
        reason: DisconnectReason,
        snapshot: Option<CachedSession>,
    ) {
        if client_id.is_empty() {
            // The attachment never completed a CONNECT.
            return;
        }

        match self.store.disconnect(client_id, gid, snapshot) {
            DisconnectOutcome::Stale => return,
            DisconnectOutcome::Removed => {
                self.trie.remove_client(client_id);
            }
            DisconnectOutcome::Cached => {}
        }

        log::info!("dispatcher: client {client_id:?} disconnected, reason {reason:?}");
        if reason.publishes_will() {
            self.fire_will(client_id).await;
        } else {
            self.wills.remove(client_id);
        }
    }
}
