//! Message envelope.
//!
//! Wraps a [`RawMessage`] with its eagerly decoded payload and the ability to
//! respond to the sender.

use crate::bus::{BusClient, Headers, RawMessage};
use crate::codec;
use crate::error::{BusError, CodecError, HooklineError};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// A decoded, reply-capable wrapper around one inbound message.
///
/// Decoding never fails construction: a bad payload is kept as a
/// [`CodecError`] next to the raw bytes so hooks can still reach
/// [`reply`](Self::reply).
pub struct Envelope {
    message: RawMessage,
    decoded: Result<Value, CodecError>,
    client: Option<Arc<dyn BusClient>>,
}

impl Envelope {
    /// Wrap a message received through `client`.
    pub fn new(message: RawMessage, client: Arc<dyn BusClient>) -> Self {
        let decoded = codec::decode(&message.payload);
        Self {
            message,
            decoded,
            client: Some(client),
        }
    }

    /// Wrap a message that cannot be responded to (e.g. a request's reply).
    pub fn detached(message: RawMessage) -> Self {
        let decoded = codec::decode(&message.payload);
        Self {
            message,
            decoded,
            client: None,
        }
    }

    /// Subject the message arrived on.
    pub fn subject(&self) -> &str {
        &self.message.subject
    }

    /// Reply target, if the sender expects a response.
    pub fn reply(&self) -> Option<&str> {
        self.message.reply.as_deref()
    }

    /// Raw payload bytes.
    pub fn payload(&self) -> &Bytes {
        &self.message.payload
    }

    /// All headers.
    pub fn headers(&self) -> &Headers {
        &self.message.headers
    }

    /// First value of header `name`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.message
            .headers
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.message.len()
    }

    /// Whether the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.message.is_empty()
    }

    /// The decoded payload, or the error decoding produced.
    pub fn decoded(&self) -> Result<&Value, &CodecError> {
        self.decoded.as_ref()
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        match &self.decoded {
            Ok(value) => T::deserialize(value).map_err(CodecError::Decode),
            Err(_) => codec::decode_as(&self.message.payload),
        }
    }

    /// Consume the envelope, returning the raw message.
    pub fn into_message(self) -> RawMessage {
        self.message
    }

    /// Encode `value` as JSON and send it to the reply target.
    ///
    /// Returns `Ok(false)` when the message has no reply target.
    pub async fn respond<T>(&self, value: &T) -> Result<bool, HooklineError>
    where
        T: Serialize + ?Sized + Sync,
    {
        if self.reply().is_none() {
            return Ok(false);
        }
        let payload = codec::encode(value)?;
        Ok(self.respond_bytes(payload).await?)
    }

    /// Send pre-encoded bytes to the reply target.
    ///
    /// Returns `Ok(false)` when the message has no reply target.
    pub async fn respond_bytes(&self, payload: Bytes) -> Result<bool, BusError> {
        let Some(reply) = self.reply() else {
            return Ok(false);
        };
        let client = self.client.as_ref().ok_or(BusError::NotConnected)?;
        client.publish(reply, payload).await?;
        Ok(true)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("subject", &self.message.subject)
            .field("reply", &self.message.reply)
            .field("len", &self.message.len())
            .field("decoded", &self.decoded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MessageStream, SubscribeOptions};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CapturingClient {
        published: Mutex<Vec<(String, Bytes)>>,
    }

    #[async_trait]
    impl BusClient for CapturingClient {
        async fn subscribe(
            &self,
            _subject: &str,
            _options: &SubscribeOptions,
        ) -> Result<MessageStream, BusError> {
            Err(BusError::Closed)
        }

        async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
            self.published
                .lock()
                .unwrap()
                .push((subject.to_string(), payload));
            Ok(())
        }

        async fn publish_with_reply(
            &self,
            subject: &str,
            _reply: &str,
            payload: Bytes,
        ) -> Result<(), BusError> {
            self.publish(subject, payload).await
        }

        async fn request(&self, subject: &str, _payload: Bytes) -> Result<RawMessage, BusError> {
            Err(BusError::NoResponders(subject.to_string()))
        }

        async fn drain(&self) -> Result<(), BusError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), BusError> {
            Ok(())
        }
    }

    #[test]
    fn test_decode_failure_keeps_reply() {
        let msg = RawMessage::new("orders.create", &b"not-json"[..]).with_reply("_INBOX.7");
        let envelope = Envelope::detached(msg);
        assert!(envelope.decoded().is_err());
        assert_eq!(envelope.reply(), Some("_INBOX.7"));
        assert_eq!(envelope.payload().as_ref(), b"not-json");
    }

    #[test]
    fn test_typed_decode() {
        #[derive(serde::Deserialize)]
        struct Order {
            id: u64,
        }
        let msg = RawMessage::new("orders.create", &br#"{"id":9}"#[..]);
        let envelope = Envelope::detached(msg);
        let order: Order = envelope.decode().unwrap();
        assert_eq!(order.id, 9);
        assert_eq!(envelope.decoded().unwrap(), &json!({ "id": 9 }));
    }

    #[tokio::test]
    async fn test_respond_without_reply_is_noop() {
        let client = Arc::new(CapturingClient::default());
        let envelope = Envelope::new(RawMessage::new("a", &b"{}"[..]), client.clone());
        let sent = envelope.respond(&json!({ "ok": true })).await.unwrap();
        assert!(!sent);
        assert!(client.published.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_respond_publishes_to_reply_target() {
        let client = Arc::new(CapturingClient::default());
        let msg = RawMessage::new("a", &b"{}"[..]).with_reply("_INBOX.1");
        let envelope = Envelope::new(msg, client.clone());
        let sent = envelope.respond(&json!({ "ok": true })).await.unwrap();
        assert!(sent);

        let published = client.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "_INBOX.1");
        assert_eq!(codec::decode(&published[0].1).unwrap(), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_detached_respond_with_reply_fails() {
        let msg = RawMessage::new("a", &b"{}"[..]).with_reply("_INBOX.1");
        let envelope = Envelope::detached(msg);
        let err = envelope.respond_bytes(Bytes::from_static(b"1")).await.unwrap_err();
        assert!(matches!(err, BusError::NotConnected));
    }
}
