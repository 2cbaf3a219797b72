//! In-process transport built on tokio channels.
//!
//! Useful for driving the hub without sockets: the server side implements
//! [`Connection`], the client side lets a test send, receive, close, or
//! break the connection at will. As with a socket, closing the server's send
//! half also ends its receive half.

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use super::{Connection, MessageSink, MessageSource};
use crate::error::{HubError, HubResult};

/// Messages the server may write before a non-reading client stalls it
const DEFAULT_CAPACITY: usize = 16;

enum Inbound {
    Text(String),
    Fail(String),
}

/// Create a connected server/client pair
pub fn memory_pair(peer: impl Into<String>) -> (MemoryConnection, MemoryClient) {
    memory_pair_with_capacity(peer, DEFAULT_CAPACITY)
}

/// Create a pair whose server-to-client direction buffers at most `capacity`
/// messages. Once full, server writes wait until the client reads.
pub fn memory_pair_with_capacity(
    peer: impl Into<String>,
    capacity: usize,
) -> (MemoryConnection, MemoryClient) {
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity.max(1));

    let connection = MemoryConnection {
        peer: peer.into(),
        inbound: inbound_rx,
        outbound: outbound_tx,
    };
    let client = MemoryClient {
        inbound: Some(inbound_tx),
        outbound: outbound_rx,
    };
    (connection, client)
}

/// Server side of an in-memory connection
pub struct MemoryConnection {
    peer: String,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    outbound: mpsc::Sender<String>,
}

impl Connection for MemoryConnection {
    type Source = MemorySource;
    type Sink = MemorySink;

    fn peer(&self) -> String {
        self.peer.clone()
    }

    fn split(self) -> (MemorySource, MemorySink) {
        let (local_close_tx, local_close_rx) = oneshot::channel();
        let source = MemorySource {
            inbound: self.inbound,
            local_close: Some(local_close_rx),
        };
        let sink = MemorySink {
            outbound: Some(self.outbound),
            local_close: Some(local_close_tx),
        };
        (source, sink)
    }
}

pub struct MemorySource {
    inbound: mpsc::UnboundedReceiver<Inbound>,
    /// Fires when the sink is closed or dropped
    local_close: Option<oneshot::Receiver<()>>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&mut self) -> HubResult<Option<String>> {
        let Some(local_close) = self.local_close.as_mut() else {
            return Ok(None);
        };

        let next = tokio::select! {
            msg = self.inbound.recv() => Some(msg),
            _ = local_close => None,
        };

        match next {
            Some(Some(Inbound::Text(text))) => Ok(Some(text)),
            Some(Some(Inbound::Fail(reason))) => Err(HubError::Transport(reason)),
            Some(None) => Ok(None),
            None => {
                self.local_close = None;
                Ok(None)
            }
        }
    }
}

pub struct MemorySink {
    outbound: Option<mpsc::Sender<String>>,
    local_close: Option<oneshot::Sender<()>>,
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, text: String) -> HubResult<()> {
        let Some(tx) = &self.outbound else {
            return Err(HubError::ConnectionClosed);
        };
        tx.send(text).await.map_err(|_| HubError::ConnectionClosed)
    }

    async fn close(&mut self) -> HubResult<()> {
        self.outbound = None;
        if let Some(tx) = self.local_close.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}

/// Client side of an in-memory connection
pub struct MemoryClient {
    inbound: Option<mpsc::UnboundedSender<Inbound>>,
    outbound: mpsc::Receiver<String>,
}

impl MemoryClient {
    /// Send a message to the server. Returns false once the client has closed.
    pub fn send(&self, text: impl Into<String>) -> bool {
        match &self.inbound {
            Some(tx) => tx.send(Inbound::Text(text.into())).is_ok(),
            None => false,
        }
    }

    /// Next message written by the server, or `None` once the server closed
    pub async fn recv(&mut self) -> Option<String> {
        self.outbound.recv().await
    }

    pub fn try_recv(&mut self) -> Option<String> {
        self.outbound.try_recv().ok()
    }

    /// Close the connection in an orderly way
    pub fn close(&mut self) {
        self.inbound = None;
    }

    /// Break the connection with a transport error
    pub fn fail(&mut self, reason: impl Into<String>) {
        if let Some(tx) = self.inbound.take() {
            let _ = tx.send(Inbound::Fail(reason.into()));
        }
    }

    /// Stop accepting server writes while leaving the read side open, so the
    /// server's next write fails
    pub fn stop_reading(&mut self) {
        self.outbound.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_messages_flow_both_ways() {
        let (connection, mut client) = memory_pair("peer-1");
        assert_eq!(connection.peer(), "peer-1");
        let (mut source, mut sink) = connection.split();

        assert!(client.send("hello"));
        assert_eq!(source.recv().await.unwrap(), Some("hello".to_string()));

        sink.send("world".to_string()).await.unwrap();
        assert_eq!(client.recv().await, Some("world".to_string()));
    }

    #[tokio::test]
    async fn test_client_close_ends_source() {
        let (connection, mut client) = memory_pair("peer");
        let (mut source, _sink) = connection.split();

        client.close();
        assert!(!client.send("late"));
        assert_eq!(source.recv().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_client_fail_surfaces_error() {
        let (connection, mut client) = memory_pair("peer");
        let (mut source, _sink) = connection.split();

        client.fail("reset by peer");
        let err = source.recv().await.unwrap_err();
        assert!(err.to_string().contains("reset by peer"));
    }

    #[tokio::test]
    async fn test_stop_reading_fails_server_writes() {
        let (connection, mut client) = memory_pair("peer");
        let (_source, mut sink) = connection.split();

        client.stop_reading();
        assert!(matches!(
            sink.send("x".to_string()).await,
            Err(HubError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_sink_close_ends_client_stream() {
        let (connection, mut client) = memory_pair("peer");
        let (_source, mut sink) = connection.split();

        sink.close().await.unwrap();
        assert_eq!(client.recv().await, None);
        assert!(sink.send("x".to_string()).await.is_err());
    }

    #[tokio::test]
    async fn test_sink_close_ends_source() {
        let (connection, client) = memory_pair("peer");
        let (mut source, mut sink) = connection.split();

        sink.close().await.unwrap();
        assert_eq!(source.recv().await.unwrap(), None);
        // Stays ended even though the client never closed
        assert!(client.send("late"));
        assert_eq!(source.recv().await.unwrap(), None);
    }
}
