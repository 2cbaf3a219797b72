use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use std::net::SocketAddr;

use super::{Connection, MessageSink, MessageSource};
use crate::error::HubResult;

/// An upgraded axum WebSocket together with the address it came from
pub struct WsConnection {
    socket: WebSocket,
    peer: SocketAddr,
}

impl WsConnection {
    pub fn new(socket: WebSocket, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl Connection for WsConnection {
    type Source = WsSource;
    type Sink = WsSink;

    fn peer(&self) -> String {
        self.peer.to_string()
    }

    fn split(self) -> (WsSource, WsSink) {
        let (sender, receiver) = self.socket.split();
        (WsSource(receiver), WsSink(sender))
    }
}

pub struct WsSource(SplitStream<WebSocket>);

#[async_trait]
impl MessageSource for WsSource {
    async fn recv(&mut self) -> HubResult<Option<String>> {
        loop {
            match self.0.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(String::from_utf8_lossy(&data).into_owned()))
                }
                // Pongs are queued by tungstenite itself and flushed with the next write
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

pub struct WsSink(SplitSink<WebSocket, Message>);

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, text: String) -> HubResult<()> {
        self.0.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn close(&mut self) -> HubResult<()> {
        self.0.close().await?;
        Ok(())
    }
}
