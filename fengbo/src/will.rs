// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Will messages.
//!
//! A will message is registered at CONNECT time and published by the
//! broker when the connection terminates abnormally: keep alive expiry,
//! transport failure, protocol violation, or takeover by a newer
//! connection [MQTT-3.1.2-8]. A clean DISCONNECT discards it without
//! publication [MQTT-3.1.2-10].

use bytes::Bytes;
use codec::topic::is_valid_pub_topic;
use codec::v3::ConnectPacket;
use codec::QoS;

use crate::error::{Error, ErrorKind};

/// Application message pre-registered at CONNECT. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct WillMessage {
    topic: String,
    payload: Bytes,
    qos: QoS,
    retain: bool,

    /// Seconds to wait before publication. A reconnect of the same
    /// client id within the window cancels the pending will. Carried
    /// over from the MQTT 5.0 will properties; 3.1.1 connects always
    /// get zero.
    delay_interval: u32,
}

impl WillMessage {
    /// Create a will message after validating the topic.
    ///
    /// # Errors
    ///
    /// Returns error if `topic` is empty or contains wildcards.
    pub fn new(
        topic: &str,
        payload: Bytes,
        qos: QoS,
        retain: bool,
        delay_interval: u32,
    ) -> Result<Self, Error> {
        if !is_valid_pub_topic(topic) {
            return Err(Error::from_string(
                ErrorKind::ProtocolViolation,
                format!("Invalid will topic: {topic:?}"),
            ));
        }
        Ok(Self {
            topic: topic.to_string(),
            payload,
            qos,
            retain,
            delay_interval,
        })
    }

    /// Extract the will message carried by a CONNECT packet, if any.
    ///
    /// # Errors
    ///
    /// Returns error if the will flag is set but the topic is invalid.
    pub fn from_connect(packet: &ConnectPacket) -> Result<Option<Self>, Error> {
        let flags = packet.connect_flags();
        if !flags.will() {
            return Ok(None);
        }
        let Some(topic) = packet.will_topic() else {
            return Err(Error::new(
                ErrorKind::ProtocolViolation,
                "Will flag set without will topic",
            ));
        };
        Self::new(
            topic,
            Bytes::copy_from_slice(packet.will_payload()),
            flags.will_qos(),
            flags.will_retain(),
            0,
        )
        .map(Some)
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    #[must_use]
    pub const fn qos(&self) -> QoS {
        self.qos
    }

    #[must_use]
    pub const fn retain(&self) -> bool {
        self.retain
    }

    #[must_use]
    pub const fn delay_interval(&self) -> u32 {
        self.delay_interval
    }
}
