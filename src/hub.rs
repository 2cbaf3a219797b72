//! Broadcast hub: the publish and subscribe entry points.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{HubError, HubResult};
use crate::pump::{read_pump, write_pump};
use crate::registry::{Registry, Subscriber};
use crate::transport::Connection;
use crate::types::{DispatchMode, DispatchReport, SubscriberId, SubscriberInfo};

/// Shared handle to the subscriber registry and its dispatch policy
#[derive(Debug, Clone)]
pub struct Hub {
    registry: Arc<Registry>,
    mode: DispatchMode,
}

impl Hub {
    pub fn new(mode: DispatchMode, eager_eviction: bool) -> Self {
        Self {
            registry: Arc::new(Registry::new(eager_eviction)),
            mode,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Deliver `message` to every live subscriber.
    ///
    /// In hand-off mode this returns once every subscriber that was live when
    /// the pass started has taken the message. Empty messages are rejected
    /// without touching the registry.
    ///
    /// The pass runs on its own task: dropping the returned future (say, the
    /// publishing client went away) does not cut it short.
    pub async fn broadcast(&self, message: &str) -> HubResult<DispatchReport> {
        if message.is_empty() {
            return Err(HubError::EmptyMessage);
        }

        let registry = self.registry.clone();
        let mode = self.mode;
        let text = message.to_owned();
        let pass = tokio::spawn(async move {
            match mode {
                DispatchMode::HandOff => registry.dispatch(&text).await,
                DispatchMode::Queued { .. } => registry.dispatch_queued(&text).await,
            }
        });
        let report = pass.await.map_err(|e| HubError::Dispatch(e.to_string()))?;

        tracing::debug!(
            delivered = report.delivered,
            dropped = report.dropped,
            evicted = report.evicted,
            "Broadcast complete"
        );
        Ok(report)
    }

    /// Register a connection and start its reader and writer pumps.
    ///
    /// Returns as soon as the subscriber is registered; the pumps keep running
    /// for the lifetime of the connection.
    pub async fn subscribe<C: Connection>(&self, connection: C) -> Subscription {
        let capacity = match self.mode {
            DispatchMode::HandOff => 1,
            DispatchMode::Queued { capacity } => capacity.max(1),
        };
        let (delivery_tx, delivery_rx) = mpsc::channel(capacity);

        let subscriber = Subscriber::new(connection.peer(), delivery_tx);
        let id = subscriber.id();
        self.registry.add(subscriber).await;

        let (source, sink) = connection.split();
        let reader = tokio::spawn(read_pump(source, self.registry.clone(), id));
        let writer = tokio::spawn(write_pump(
            sink,
            delivery_rx,
            self.registry.clone(),
            id,
        ));

        Subscription {
            id,
            reader: Some(reader),
            writer,
        }
    }

    /// Tracked entries, including closed ones not yet evicted
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }

    pub async fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.registry.snapshot().await
    }
}

/// A registered subscriber and its running pumps
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    reader: Option<JoinHandle<()>>,
    writer: JoinHandle<()>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for both pumps to finish
    pub async fn join(mut self) {
        self.disconnected().await;
        if let Err(e) = self.writer.await {
            tracing::error!(subscriber = %self.id, "Writer pump failed: {}", e);
        }
    }

    /// Wait for the reader pump only, i.e. until the disconnect is recorded
    pub async fn disconnected(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        if let Err(e) = reader.await {
            tracing::error!(subscriber = %self.id, "Reader pump failed: {}", e);
        }
    }
}
