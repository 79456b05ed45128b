//! # Bus Client Layer
//!
//! The publish/subscribe bus is an external collaborator. This module only
//! defines the surface the dispatch pipeline consumes from it:
//!
//! - [`BusClient`] - subscribe / publish / request / drain / close
//! - [`Connector`] - produces a connected [`BusClient`]
//! - [`RawMessage`] - one message as delivered by the bus
//!
//! Adapters for concrete transports live in `hookline-std`.

use crate::error::BusError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Message headers. A header name may carry several values.
pub type Headers = BTreeMap<String, Vec<String>>;

/// A stream of messages delivered for one subscription.
///
/// The stream ends when the subscription is closed or drained.
pub type MessageStream = BoxStream<'static, RawMessage>;

/// A message as delivered by the bus, before decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawMessage {
    /// Subject the message was published to.
    pub subject: String,
    /// Subject to send a response to, if the sender expects one.
    pub reply: Option<String>,
    /// Raw payload bytes.
    pub payload: Bytes,
    /// Message headers.
    pub headers: Headers,
}

impl RawMessage {
    /// Create a message without reply target or headers.
    pub fn new(subject: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            subject: subject.into(),
            reply: None,
            payload: payload.into(),
            headers: Headers::new(),
        }
    }

    /// Set the reply target.
    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Append a header value.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Options passed through to the bus when subscribing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeOptions {
    /// Queue group; members of one group share the message load.
    pub queue_group: Option<String>,
    /// Unsubscribe automatically after this many messages.
    pub max_messages: Option<u64>,
}

impl SubscribeOptions {
    /// Join a queue group.
    pub fn queue_group(mut self, group: impl Into<String>) -> Self {
        self.queue_group = Some(group.into());
        self
    }

    /// Stop after `max` messages.
    pub fn max_messages(mut self, max: u64) -> Self {
        self.max_messages = Some(max);
        self
    }
}

/// A connected publish/subscribe client.
///
/// Implementations must allow concurrent calls from many subscription loops.
#[async_trait]
pub trait BusClient: Send + Sync + 'static {
    /// Open a subscription on `subject`.
    async fn subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> Result<MessageStream, BusError>;

    /// Publish `payload` to `subject`.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    /// Publish `payload` to `subject`, asking for responses on `reply`.
    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> Result<(), BusError>;

    /// Publish `payload` and wait for the first response.
    async fn request(&self, subject: &str, payload: Bytes) -> Result<RawMessage, BusError>;

    /// Stop accepting new messages, let in-flight ones finish, then close.
    async fn drain(&self) -> Result<(), BusError>;

    /// Close the connection immediately.
    async fn close(&self) -> Result<(), BusError>;
}

/// Produces a connected [`BusClient`].
///
/// Connection settings are owned by the connector; the dispatch layer never
/// inspects them.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to the bus.
    async fn connect(&self) -> Result<Arc<dyn BusClient>, BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_message_builders() {
        let msg = RawMessage::new("orders.create", &b"{}"[..])
            .with_reply("_INBOX.1")
            .with_header("trace", "abc")
            .with_header("trace", "def");
        assert_eq!(msg.reply.as_deref(), Some("_INBOX.1"));
        assert_eq!(msg.headers["trace"], vec!["abc", "def"]);
        assert_eq!(msg.len(), 2);
    }

    #[test]
    fn test_subscribe_options_builder() {
        let opts = SubscribeOptions::default().queue_group("workers").max_messages(5);
        assert_eq!(opts.queue_group.as_deref(), Some("workers"));
        assert_eq!(opts.max_messages, Some(5));
    }
}
