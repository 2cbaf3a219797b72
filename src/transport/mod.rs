//! Connection abstraction consumed by the hub.
//!
//! The hub never names a concrete transport. A connection is split into a
//! receive half, driven by the reader pump, and a send half, driven by the
//! writer pump. The transport must tolerate one concurrent reader plus one
//! concurrent writer, which the split enforces by construction.

mod memory;
mod websocket;

use async_trait::async_trait;

use crate::error::HubResult;

pub use memory::{
    memory_pair, memory_pair_with_capacity, MemoryClient, MemoryConnection, MemorySink,
    MemorySource,
};
pub use websocket::{WsConnection, WsSink, WsSource};

/// Receive half of a connection
#[async_trait]
pub trait MessageSource: Send + 'static {
    /// Read one message.
    ///
    /// Returns `Ok(None)` once the remote end has closed the connection in an
    /// orderly way, and an error for anything else that ends it.
    async fn recv(&mut self) -> HubResult<Option<String>>;
}

/// Send half of a connection
#[async_trait]
pub trait MessageSink: Send + 'static {
    /// Write one text message
    async fn send(&mut self, text: String) -> HubResult<()>;

    /// Close the connection from our side
    async fn close(&mut self) -> HubResult<()>;
}

/// An established, message-oriented duplex connection
pub trait Connection: Send + 'static {
    type Source: MessageSource;
    type Sink: MessageSink;

    /// Label for the remote end, used in logs and the stats listing
    fn peer(&self) -> String;

    fn split(self) -> (Self::Source, Self::Sink);
}
