//! NATS adapter built on `async-nats`.

use crate::config::BusConfig;
use async_nats::{ConnectOptions, RequestErrorKind, ServerAddr};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use hookline_core::{BusClient, BusError, Connector, Headers, MessageStream, RawMessage, SubscribeOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Opens NATS connections from a [`BusConfig`].
#[derive(Debug, Clone, Default)]
pub struct NatsConnector {
    config: BusConfig,
}

impl NatsConnector {
    /// Create a connector for `config`.
    pub fn new(config: BusConfig) -> Self {
        Self { config }
    }

    fn options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new().request_timeout(self.config.request_timeout());
        if let Some(name) = &self.config.name {
            options = options.name(name);
        }
        if let (Some(user), Some(password)) = (&self.config.user, &self.config.password) {
            options = options.user_and_password(user.clone(), password.clone());
        }
        if let Some(token) = &self.config.token {
            options = options.token(token.clone());
        }
        options
    }
}

#[async_trait]
impl Connector for NatsConnector {
    async fn connect(&self) -> Result<Arc<dyn BusClient>, BusError> {
        let servers = self
            .config
            .servers
            .iter()
            .map(|server| server.parse::<ServerAddr>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BusError::Connect(e.into()))?;

        let client = self
            .options()
            .connect(servers.as_slice())
            .await
            .map_err(|e| BusError::Connect(e.into()))?;
        info!(servers = ?self.config.servers, "Connected to NATS");
        Ok(Arc::new(
            NatsBus::new(client).with_request_timeout(self.config.request_timeout()),
        ))
    }
}

/// A [`BusClient`] backed by an `async_nats::Client`.
///
/// `close` drops the held client. The socket stays open while other clones of
/// the client or live subscription streams still reference it.
pub struct NatsBus {
    client: RwLock<Option<async_nats::Client>>,
    request_timeout: Option<Duration>,
    draining: AtomicBool,
}

impl NatsBus {
    /// Wrap an established client.
    pub fn new(client: async_nats::Client) -> Self {
        Self {
            client: RwLock::new(Some(client)),
            request_timeout: None,
            draining: AtomicBool::new(false),
        }
    }

    /// Record the request timeout the client was configured with.
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The underlying client, until `close` is called.
    pub fn inner(&self) -> Option<async_nats::Client> {
        self.client.read().ok().and_then(|client| client.clone())
    }

    fn client(&self) -> Result<async_nats::Client, BusError> {
        self.inner().ok_or(BusError::Closed)
    }
}

fn convert(message: async_nats::Message) -> RawMessage {
    let mut headers = Headers::new();
    if let Some(map) = &message.headers {
        for (name, values) in map.iter() {
            headers.insert(
                name.to_string(),
                values.iter().map(|value| value.to_string()).collect(),
            );
        }
    }
    RawMessage {
        subject: message.subject.to_string(),
        reply: message.reply.map(|reply| reply.to_string()),
        payload: message.payload,
        headers,
    }
}

#[async_trait]
impl BusClient for NatsBus {
    async fn subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> Result<MessageStream, BusError> {
        if self.draining.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let client = self.client()?;
        let wrap = |e: async_nats::SubscribeError| BusError::Subscribe {
            subject: subject.to_string(),
            source: e.into(),
        };
        let mut subscriber = match &options.queue_group {
            Some(queue) => client
                .queue_subscribe(subject.to_string(), queue.clone())
                .await
                .map_err(wrap)?,
            None => client.subscribe(subject.to_string()).await.map_err(wrap)?,
        };
        if let Some(max) = options.max_messages {
            subscriber
                .unsubscribe_after(max)
                .await
                .map_err(|e| BusError::Subscribe {
                    subject: subject.to_string(),
                    source: e.into(),
                })?;
        }
        debug!(subject, queue = ?options.queue_group, "Subscribed");
        Ok(subscriber.map(convert).boxed())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client()?
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_string(),
                source: e.into(),
            })
    }

    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> Result<(), BusError> {
        self.client()?
            .publish_with_reply(subject.to_string(), reply.to_string(), payload)
            .await
            .map_err(|e| BusError::Publish {
                subject: subject.to_string(),
                source: e.into(),
            })
    }

    async fn request(&self, subject: &str, payload: Bytes) -> Result<RawMessage, BusError> {
        match self.client()?.request(subject.to_string(), payload).await {
            Ok(message) => Ok(convert(message)),
            Err(e) => Err(match e.kind() {
                RequestErrorKind::NoResponders => BusError::NoResponders(subject.to_string()),
                RequestErrorKind::TimedOut => BusError::Timeout {
                    subject: subject.to_string(),
                    timeout: self.request_timeout.unwrap_or_default(),
                },
                _ => BusError::Request {
                    subject: subject.to_string(),
                    source: e.into(),
                },
            }),
        }
    }

    /// Stop accepting subscriptions and drain the connection.
    ///
    /// Publishing keeps working so in-flight messages can still reply.
    async fn drain(&self) -> Result<(), BusError> {
        self.draining.store(true, Ordering::Release);
        self.client()?
            .drain()
            .await
            .map_err(|e| BusError::Drain(e.into()))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.draining.store(true, Ordering::Release);
        let released = self.client.write().ok().and_then(|mut client| client.take());
        if let Some(client) = released {
            drop(client);
            debug!("NATS client released");
        }
        Ok(())
    }
}
