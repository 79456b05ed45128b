//! # Dispatch Context
//!
//! Everything a hook or handler receives for one message: the envelope, the
//! shared bus client, the name of the bound handler and the binding's
//! metadata.
//!
//! `Context` is cheap to clone; all fields are reference counted.

use crate::bus::BusClient;
use crate::envelope::Envelope;
use crate::error::{CodecError, HooklineError};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Per-message context handed to hooks and handlers.
#[derive(Clone)]
pub struct Context {
    envelope: Arc<Envelope>,
    client: Arc<dyn BusClient>,
    handler: Arc<str>,
    meta: Arc<Value>,
}

impl Context {
    /// Create a new context.
    pub fn new(
        envelope: Arc<Envelope>,
        client: Arc<dyn BusClient>,
        handler: impl Into<Arc<str>>,
        meta: Arc<Value>,
    ) -> Self {
        Self {
            envelope,
            client,
            handler: handler.into(),
            meta,
        }
    }

    /// The message being dispatched.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The shared bus client.
    pub fn client(&self) -> &Arc<dyn BusClient> {
        &self.client
    }

    /// Name of the handler bound to this subject.
    pub fn handler_name(&self) -> &str {
        &self.handler
    }

    /// Binding metadata.
    ///
    /// Lets a handler bound to several subjects tell which one fired.
    pub fn meta(&self) -> &Value {
        &self.meta
    }

    /// Subject the message arrived on.
    pub fn subject(&self) -> &str {
        self.envelope.subject()
    }

    /// Reply target of the message.
    pub fn reply(&self) -> Option<&str> {
        self.envelope.reply()
    }

    /// Decode the payload into a concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        self.envelope.decode()
    }

    /// Respond to the sender. See [`Envelope::respond`].
    pub async fn respond<T>(&self, value: &T) -> Result<bool, HooklineError>
    where
        T: Serialize + ?Sized + Sync,
    {
        self.envelope.respond(value).await
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("envelope", &self.envelope)
            .field("handler", &self.handler)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
