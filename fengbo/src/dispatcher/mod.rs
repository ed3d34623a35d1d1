// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! The dispatcher task: message router plus the process-wide state.
//!
//! One task owns the subscription trie, the retained store, the session
//! store and the registered will messages. Serializing every mutation
//! through its command loop is what gives publishes their per-publisher
//! ordering and keeps writers exclusive without locks.

use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender};

use crate::commands::{DispatcherToListenerCmd, ListenerToDispatcherCmd, ServerToDispatcherCmd};
use crate::error::Error;
use crate::metrics::{BrokerStats, SessionStats};
use crate::types::{ListenerId, SessionGid};
use crate::will::WillMessage;

mod listener;
mod retain;
mod store;
mod trie;

pub use retain::{RetainedMessage, RetainedStore};
pub use store::{ConnectOutcome, DisconnectOutcome, SessionStore};
pub use trie::SubTrie;

const WILL_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug)]
pub struct Dispatcher {
    trie: SubTrie,
    retained: RetainedStore,
    store: SessionStore,

    /// Wills of live attachments, by client id.
    wills: HashMap<String, WillMessage>,

    /// Wills whose delay interval is running. The generation number
    /// invalidates a timer when the client reconnects before it fires.
    pending_wills: HashMap<String, (u64, WillMessage)>,
    will_seq: u64,
    will_sender: Sender<(String, u64)>,
    will_receiver: Receiver<(String, u64)>,

    listener_senders: HashMap<ListenerId, Sender<DispatcherToListenerCmd>>,
    listener_receiver: Receiver<ListenerToDispatcherCmd>,

    server_receiver: Receiver<ServerToDispatcherCmd>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        listener_senders: Vec<(ListenerId, Sender<DispatcherToListenerCmd>)>,
        listener_receiver: Receiver<ListenerToDispatcherCmd>,
        server_receiver: Receiver<ServerToDispatcherCmd>,
    ) -> Self {
        let (will_sender, will_receiver) = mpsc::channel(WILL_CHANNEL_CAPACITY);
        Self {
            trie: SubTrie::new(),
            retained: RetainedStore::new(),
            store: SessionStore::new(),

            wills: HashMap::new(),
            pending_wills: HashMap::new(),
            will_seq: 0,
            will_sender,
            will_receiver,

            listener_senders: listener_senders.into_iter().collect(),
            listener_receiver,

            server_receiver,
        }
    }

    pub async fn run_loop(&mut self) {
        loop {
            tokio::select! {
                Some(cmd) = self.listener_receiver.recv() => {
                    if let Err(err) = self.handle_listener_cmd(cmd).await {
                        log::error!("dispatcher: listener cmd failed: {err}");
                    }
                }
                Some(cmd) = self.server_receiver.recv() => {
                    self.handle_server_cmd(cmd);
                }
                Some((client_id, generation)) = self.will_receiver.recv() => {
                    self.on_will_timer(client_id, generation).await;
                }
                else => break,
            }
        }
    }

    fn handle_server_cmd(&mut self, cmd: ServerToDispatcherCmd) {
        match cmd {
            ServerToDispatcherCmd::QueryStats(reply) => {
                let mut sessions: Vec<SessionStats> = self
                    .store
                    .iter_stats()
                    .map(|(client_id, online, pending_messages)| SessionStats {
                        client_id: client_id.to_string(),
                        online,
                        pending_messages,
                    })
                    .collect();
                sessions.sort_by(|a, b| a.client_id.cmp(&b.client_id));
                let stats = BrokerStats {
                    sessions,
                    retained_topics: self.retained.len(),
                    subscription_count: self.trie.subscription_count(),
                };
                let _ = reply.send(stats);
            }
        }
    }

    pub(super) async fn send_to_listener(
        &mut self,
        gid: SessionGid,
        cmd: DispatcherToListenerCmd,
    ) -> Result<(), Error> {
        if let Some(sender) = self.listener_senders.get(&gid.listener_id()) {
            sender.send(cmd).await?;
            Ok(())
        } else {
            Err(Error::session_error(gid.session_id()))
        }
    }

    /// Start the termination path of the registered will, if any.
    pub(super) async fn fire_will(&mut self, client_id: &str) {
        let Some(will) = self.wills.remove(client_id) else {
            return;
        };
        if will.delay_interval() == 0 {
            self.route_will(will).await;
            return;
        }

        self.will_seq += 1;
        let generation = self.will_seq;
        let delay = Duration::from_secs(u64::from(will.delay_interval()));
        self.pending_wills
            .insert(client_id.to_string(), (generation, will));

        let sender = self.will_sender.clone();
        let client_id = client_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = sender.send((client_id, generation)).await;
        });
    }

    async fn on_will_timer(&mut self, client_id: String, generation: u64) {
        match self.pending_wills.remove(&client_id) {
            Some((current, will)) if current == generation => {
                self.route_will(will).await;
            }
            // A newer attachment replaced or cancelled this timer.
            Some(other) => {
                self.pending_wills.insert(client_id, other);
            }
            None => {}
        }
    }

    async fn route_will(&mut self, will: WillMessage) {
        log::info!("dispatcher: publishing will on {:?}", will.topic());
        self.route_publish(
            will.topic().to_string(),
            will.payload().clone(),
            will.qos(),
            will.retain(),
        )
        .await;
    }
}
