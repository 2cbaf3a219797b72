//! Per-subscriber reader and writer loops.

use std::sync::Arc;
use tokio::sync::mpsc;

use crate::registry::{Envelope, Registry};
use crate::transport::{MessageSink, MessageSource};
use crate::types::SubscriberId;

/// Read until the connection ends, then close the subscriber.
///
/// Subscribers are receive-only, so inbound payloads are discarded. Reading
/// is still required: it is the only way to notice the remote end went away.
pub async fn read_pump<S: MessageSource>(
    mut source: S,
    registry: Arc<Registry>,
    id: SubscriberId,
) {
    loop {
        match source.recv().await {
            Ok(Some(text)) => {
                tracing::trace!(subscriber = %id, len = text.len(), "Ignoring inbound message");
            }
            Ok(None) => {
                tracing::debug!(subscriber = %id, "Connection closed by peer");
                break;
            }
            Err(e) => {
                tracing::debug!(subscriber = %id, "Error reading message: {}", e);
                break;
            }
        }
    }

    registry.close(id).await;
}

/// Write every delivered message to the connection.
///
/// Ends when the delivery channel is closed (the subscriber was closed) or a
/// write fails. A failed write closes the subscriber as a failed read would.
/// Either way the connection is closed from our side before returning.
pub async fn write_pump<K: MessageSink>(
    mut sink: K,
    mut delivery: mpsc::Receiver<Envelope>,
    registry: Arc<Registry>,
    id: SubscriberId,
) {
    while let Some(mut envelope) = delivery.recv().await {
        envelope.acknowledge();
        tracing::debug!(subscriber = %id, "Broadcast message received: {}", envelope.text());

        if let Err(e) = sink.send(envelope.into_text()).await {
            tracing::warn!(subscriber = %id, "Error writing message: {}", e);
            // Drop the receiver first: a broadcaster blocked on this channel
            // holds the registry lock and must see the writer gone.
            drop(delivery);
            registry.close(id).await;
            break;
        }
    }

    if let Err(e) = sink.close().await {
        tracing::debug!(subscriber = %id, "Error closing connection: {}", e);
    }
}
