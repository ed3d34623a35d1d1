// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Command enums exchanged between the broker actors.
//!
//! Every long-running component is a task owning mpsc channel ends;
//! these enums name the messages by direction.

use codec::v3::{ConnectAckPacket, PublishPacket, SubscribeAckPacket, SubscribePacket,
    UnsubscribePacket};
use tokio::sync::oneshot;

use crate::metrics::BrokerStats;
use crate::session::CachedSession;
use crate::types::{PublishMessage, SessionGid, SessionId};
use crate::will::WillMessage;

/// Why a session actor stopped.
///
/// Everything except `Clean` counts as abnormal termination, which
/// triggers publication of the session's will message [MQTT-3.1.2-8].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a DISCONNECT packet.
    Clean,

    /// The transport was closed or failed without a DISCONNECT.
    TransportClosed,

    /// No control packet arrived within 1.5 times the keep alive
    /// interval [MQTT-3.1.2-24].
    KeepAliveExpired,

    /// The client sent a malformed packet or violated the protocol.
    ProtocolViolation,

    /// A new connection with the same client id took over
    /// [MQTT-3.1.4-2].
    TakenOver,
}

impl DisconnectReason {
    /// Will messages fire on every termination except a clean one.
    #[must_use]
    pub fn publishes_will(self) -> bool {
        self != Self::Clean
    }
}

/// Description of an accepted CONNECT, sent up to the dispatcher.
#[derive(Debug, Clone)]
pub struct ConnectInfo {
    pub client_id: String,
    pub clean_session: bool,
    pub will: Option<WillMessage>,
}

#[derive(Debug, Clone)]
pub enum SessionToListenerCmd {
    /// CONNECT handshake passed local validation.
    Connect(SessionId, ConnectInfo),

    /// Inbound application message, after the session has done its part
    /// of the QoS handshake.
    Publish(SessionId, PublishPacket),

    Subscribe(SessionId, SubscribePacket),

    Unsubscribe(SessionId, UnsubscribePacket),

    /// Session actor is terminating. Carries the client id (empty when
    /// the CONNECT never completed) and the state snapshot when the
    /// session is persistent.
    Disconnect(SessionId, String, DisconnectReason, Option<CachedSession>),
}

#[derive(Debug, Clone)]
pub enum ListenerToSessionCmd {
    /// Handshake verdict, with the resumed session state when the store
    /// held one.
    ConnectAck(ConnectAckPacket, Option<CachedSession>),

    /// Message routed to this subscriber; the session allocates the
    /// packet id and runs the outbound QoS machine.
    Publish(PublishMessage),

    SubscribeAck(SubscribeAckPacket),

    /// Close this attachment. Another connection took over the client id.
    Disconnect,
}

#[derive(Debug, Clone)]
pub enum ListenerToDispatcherCmd {
    SessionConnected(SessionGid, ConnectInfo),

    Publish(PublishPacket),

    Subscribe(SessionGid, SubscribePacket),

    Unsubscribe(SessionGid, UnsubscribePacket),

    SessionClosed(SessionGid, String, DisconnectReason, Option<CachedSession>),
}

#[derive(Debug, Clone)]
pub enum DispatcherToListenerCmd {
    ConnectAck(SessionId, ConnectAckPacket, Option<CachedSession>),

    Publish(SessionId, PublishMessage),

    SubscribeAck(SessionId, SubscribeAckPacket),

    DisconnectSession(SessionId),
}

#[derive(Debug)]
pub enum ServerToDispatcherCmd {
    /// Observable broker state, answered over the oneshot channel.
    QueryStats(oneshot::Sender<BrokerStats>),
}
