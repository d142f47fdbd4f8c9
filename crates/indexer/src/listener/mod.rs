//! Event source abstraction for the ledger transaction feed.
//!
//! The network delivers transaction notifications as JSON messages on a
//! subscription stream. The subscription's connection lifecycle (reconnects,
//! heartbeats) is the transport's responsibility; the pipeline only consumes
//! an ordered sequence of raw messages through [`EventSource`].

use async_trait::async_trait;
use tokio::sync::mpsc;

/// An asynchronous sequence of raw ledger feed messages.
///
/// `next_message` returns `None` when the feed has ended; the pipeline then
/// drains in-flight work and shuts down.
#[async_trait]
pub trait EventSource: Send {
    /// Receive the next raw message, or `None` at end of stream.
    async fn next_message(&mut self) -> Option<serde_json::Value>;
}

/// Channel-backed event source.
///
/// Whatever transport the deployment wires in (a websocket reader, a replay
/// file, a test) pushes messages into the sender half.
pub struct ChannelEventSource {
    receiver: mpsc::Receiver<serde_json::Value>,
}

impl ChannelEventSource {
    /// Create a source and the sender that feeds it.
    pub fn new(buffer: usize) -> (mpsc::Sender<serde_json::Value>, Self) {
        let (sender, receiver) = mpsc::channel(buffer);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_message(&mut self) -> Option<serde_json::Value> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn channel_source_yields_in_order_then_ends() {
        let (sender, mut source) = ChannelEventSource::new(8);

        sender.send(json!({ "seq": 1 })).await.unwrap();
        sender.send(json!({ "seq": 2 })).await.unwrap();
        drop(sender);

        assert_eq!(source.next_message().await, Some(json!({ "seq": 1 })));
        assert_eq!(source.next_message().await, Some(json!({ "seq": 2 })));
        assert_eq!(source.next_message().await, None);
    }
}
