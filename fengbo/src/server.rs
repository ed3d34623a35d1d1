// Copyright (c) 2025 Fengbo Authors. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Server assembly: wires the dispatcher and the listeners together and
//! runs them.

use std::net::SocketAddr;
use tokio::sync::mpsc::{self, Sender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::commands::ServerToDispatcherCmd;
use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, ErrorKind};
use crate::listener::{Listener, CHANNEL_CAPACITY};
use crate::metrics::BrokerStats;
use crate::types::ListenerId;

/// Handle on a running broker.
///
/// Dropping the handle does not stop the broker; call [`ServerHandle::shutdown`]
/// to abort its tasks.
#[derive(Debug)]
pub struct ServerHandle {
    addresses: Vec<SocketAddr>,
    dispatcher_sender: Sender<ServerToDispatcherCmd>,
    tasks: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound socket addresses, one per listener.
    #[must_use]
    pub fn addresses(&self) -> &[SocketAddr] {
        &self.addresses
    }

    /// Observable broker state: known sessions, retained topic count
    /// and subscription count.
    ///
    /// # Errors
    ///
    /// Returns error if the dispatcher is gone.
    pub async fn query_stats(&self) -> Result<BrokerStats, Error> {
        let (sender, receiver) = oneshot::channel();
        self.dispatcher_sender
            .send(ServerToDispatcherCmd::QueryStats(sender))
            .await
            .map_err(|_err| Error::new(ErrorKind::ChannelError, "Dispatcher is gone"))?;
        receiver
            .await
            .map_err(|_err| Error::new(ErrorKind::ChannelError, "Dispatcher dropped the query"))
    }

    /// Abort every broker task.
    pub fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// Wait for the broker tasks. They only return on abort.
    pub async fn wait(&mut self) {
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
    }
}

/// Broker server context.
#[derive(Debug)]
pub struct Server {
    config: Config,
}

impl Server {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Bind all listeners and spawn the broker tasks.
    ///
    /// # Errors
    ///
    /// Returns error if the config is invalid or a listener address
    /// cannot be bound.
    pub async fn start(&self) -> Result<ServerHandle, Error> {
        self.config.validate()?;

        let (listeners_to_dispatcher_sender, listeners_to_dispatcher_receiver) =
            mpsc::channel(CHANNEL_CAPACITY);
        let (server_sender, server_receiver) = mpsc::channel(CHANNEL_CAPACITY);

        let mut listeners = Vec::new();
        let mut dispatcher_senders = Vec::new();
        let mut addresses = Vec::new();

        for (index, listener_config) in self.config.listeners().iter().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let listener_id = index as ListenerId + 1;
            let (dispatcher_to_listener_sender, dispatcher_to_listener_receiver) =
                mpsc::channel(CHANNEL_CAPACITY);

            let listener = Listener::bind(
                listener_id,
                listener_config,
                self.config.message(),
                listeners_to_dispatcher_sender.clone(),
                dispatcher_to_listener_receiver,
            )
            .await?;
            addresses.push(listener.local_addr()?);
            dispatcher_senders.push((listener_id, dispatcher_to_listener_sender));
            listeners.push(listener);
        }

        let mut dispatcher = Dispatcher::new(
            dispatcher_senders,
            listeners_to_dispatcher_receiver,
            server_receiver,
        );

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(async move {
            dispatcher.run_loop().await;
        }));
        for mut listener in listeners {
            tasks.push(tokio::spawn(async move {
                listener.run_loop().await;
            }));
        }

        log::info!("fengbo broker listening on {addresses:?}");
        Ok(ServerHandle {
            addresses,
            dispatcher_sender: server_sender,
            tasks,
        })
    }

    /// Start the broker and run until the process is stopped.
    ///
    /// # Errors
    ///
    /// Returns error if startup fails.
    pub async fn run(&self) -> Result<(), Error> {
        let mut handle = self.start().await?;
        handle.wait().await;
        Ok(())
    }
}
