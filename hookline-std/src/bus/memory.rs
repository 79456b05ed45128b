//! In-process bus.
//!
//! Delivers messages between subscribers of one process over unbounded tokio
//! channels. Subject wildcards, queue groups, request/reply and drain behave
//! like a broker would, which makes this the bus used throughout the tests.

use crate::trie::SubjectTrie;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;
use hookline_core::{BusClient, BusError, Connector, MessageStream, RawMessage, SubscribeOptions};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const OPEN: u8 = 0;
const DRAINING: u8 = 1;
const CLOSED: u8 = 2;

struct Subscriber {
    sid: u64,
    queue: Option<String>,
    sender: mpsc::UnboundedSender<RawMessage>,
}

/// Where a subscription lives in the trie.
struct Route {
    pattern: String,
    /// Reply inbox opened by `request`; survives a drain.
    inbox: bool,
}

struct Inner {
    subscribers: RwLock<SubjectTrie<Subscriber>>,
    routes: RwLock<HashMap<u64, Route>>,
    next_sid: AtomicU64,
    next_inbox: AtomicU64,
    cursor: AtomicU64,
    published: AtomicU64,
    state: AtomicU8,
    request_timeout: Duration,
}

impl Inner {
    fn unsubscribe(&self, sid: u64) {
        let route = match self.routes.write() {
            Ok(mut routes) => routes.remove(&sid),
            Err(_) => None,
        };
        if let (Some(route), Ok(mut subs)) = (route, self.subscribers.write()) {
            if subs.remove_where(&route.pattern, |sub| sub.sid == sid) > 0 {
                trace!(subject = %route.pattern, sid, "Unsubscribed");
            }
        }
    }
}

/// Removes its subscription from the bus when dropped.
struct Registration {
    inner: Arc<Inner>,
    sid: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.unsubscribe(self.sid);
    }
}

/// State threaded through a subscription stream.
struct Feed {
    receiver: mpsc::UnboundedReceiver<RawMessage>,
    remaining: Option<u64>,
    registration: Registration,
}

/// A bus that lives inside the current process.
///
/// Cloning yields another handle to the same bus.
#[derive(Clone)]
pub struct InMemoryBus {
    inner: Arc<Inner>,
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBus {
    /// Create a new bus with the default request timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_request_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new bus whose requests give up after `timeout`.
    #[must_use]
    pub fn with_request_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                subscribers: RwLock::new(SubjectTrie::new()),
                routes: RwLock::new(HashMap::new()),
                next_sid: AtomicU64::new(1),
                next_inbox: AtomicU64::new(1),
                cursor: AtomicU64::new(0),
                published: AtomicU64::new(0),
                state: AtomicU8::new(OPEN),
                request_timeout: timeout,
            }),
        }
    }

    /// This bus as a shared client handle.
    pub fn client(&self) -> Arc<dyn BusClient> {
        Arc::new(self.clone())
    }

    /// Total messages accepted by `publish`.
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Number of open subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .read()
            .map(|subs| subs.len())
            .unwrap_or_default()
    }

    /// Whether `drain` or `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.state() != OPEN
    }

    fn state(&self) -> u8 {
        self.inner.state.load(Ordering::Acquire)
    }

    /// Deliver `message`, returning how many subscribers received it.
    ///
    /// Publishing stays possible while draining so in-flight messages can
    /// still be answered.
    fn deliver(&self, message: RawMessage) -> Result<usize, BusError> {
        if self.state() == CLOSED {
            return Err(BusError::Closed);
        }
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        let mut dead = Vec::new();
        let mut delivered = 0;
        {
            let subs = self
                .inner
                .subscribers
                .read()
                .map_err(|_| BusError::Closed)?;
            let mut groups: HashMap<&str, Vec<&Subscriber>> = HashMap::new();
            let mut targets = Vec::new();
            for sub in subs.matches(&message.subject) {
                match &sub.queue {
                    Some(queue) => groups.entry(queue.as_str()).or_default().push(sub),
                    None => targets.push(sub),
                }
            }
            let turn = self.inner.cursor.fetch_add(1, Ordering::Relaxed) as usize;
            for members in groups.values() {
                targets.push(members[turn % members.len()]);
            }

            for sub in targets {
                if sub.sender.send(message.clone()).is_ok() {
                    delivered += 1;
                } else {
                    dead.push(sub.sid);
                }
            }
        }

        for sid in dead {
            self.inner.unsubscribe(sid);
        }
        trace!(subject = %message.subject, delivered, "Message delivered");
        Ok(delivered)
    }

    fn open_stream(
        &self,
        subject: &str,
        options: &SubscribeOptions,
        inbox: bool,
    ) -> Result<MessageStream, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let sid = self.inner.next_sid.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::unbounded_channel();

        self.inner
            .routes
            .write()
            .map_err(|_| poisoned(subject))?
            .insert(
                sid,
                Route {
                    pattern: subject.to_string(),
                    inbox,
                },
            );
        let registration = Registration {
            inner: self.inner.clone(),
            sid,
        };
        self.inner
            .subscribers
            .write()
            .map_err(|_| poisoned(subject))?
            .insert(
                subject,
                Subscriber {
                    sid,
                    queue: options.queue_group.clone(),
                    sender,
                },
            );
        debug!(subject, sid, queue = ?options.queue_group, "Subscribed");

        let feed = Feed {
            receiver,
            remaining: options.max_messages,
            registration,
        };
        // Returning `None` drops the feed, and with it the subscription.
        let messages = stream::unfold(feed, |mut feed| async move {
            if feed.remaining == Some(0)
                || feed.registration.inner.state.load(Ordering::Acquire) == CLOSED
            {
                return None;
            }
            let message = feed.receiver.recv().await?;
            if let Some(remaining) = feed.remaining.as_mut() {
                *remaining -= 1;
                if *remaining == 0 {
                    feed.registration.inner.unsubscribe(feed.registration.sid);
                }
            }
            Some((message, feed))
        });
        Ok(messages.boxed())
    }

    fn shut(&self, state: u8) {
        self.inner.state.store(state, Ordering::Release);
        // Dropping the senders ends every stream once its buffer is consumed.
        let sids: Vec<u64> = match self.inner.routes.read() {
            Ok(routes) => routes
                .iter()
                .filter(|(_, route)| state == CLOSED || !route.inbox)
                .map(|(sid, _)| *sid)
                .collect(),
            Err(_) => Vec::new(),
        };
        for sid in sids {
            self.inner.unsubscribe(sid);
        }
    }
}

fn poisoned(subject: &str) -> BusError {
    BusError::Subscribe {
        subject: subject.to_string(),
        source: "subscriber table poisoned".into(),
    }
}

#[async_trait]
impl BusClient for InMemoryBus {
    async fn subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> Result<MessageStream, BusError> {
        self.open_stream(subject, options, false)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.deliver(RawMessage::new(subject, payload)).map(|_| ())
    }

    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> Result<(), BusError> {
        self.deliver(RawMessage::new(subject, payload).with_reply(reply))
            .map(|_| ())
    }

    async fn request(&self, subject: &str, payload: Bytes) -> Result<RawMessage, BusError> {
        let inbox = format!(
            "_INBOX.{}",
            self.inner.next_inbox.fetch_add(1, Ordering::Relaxed)
        );
        let mut replies =
            self.open_stream(&inbox, &SubscribeOptions::default().max_messages(1), true)?;

        let delivered = self.deliver(RawMessage::new(subject, payload).with_reply(inbox.as_str()))?;
        if delivered == 0 {
            return Err(BusError::NoResponders(subject.to_string()));
        }

        let timeout = self.inner.request_timeout;
        match tokio::time::timeout(timeout, replies.next()).await {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(BusError::Closed),
            Err(_) => Err(BusError::Timeout {
                subject: subject.to_string(),
                timeout,
            }),
        }
    }

    /// Stop accepting subscriptions and end the open ones once their buffers
    /// are consumed. Publishing and pending requests keep working until
    /// `close`.
    async fn drain(&self) -> Result<(), BusError> {
        self.shut(DRAINING);
        debug!("In-memory bus drained");
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.shut(CLOSED);
        debug!("In-memory bus closed");
        Ok(())
    }
}

#[async_trait]
impl Connector for InMemoryBus {
    async fn connect(&self) -> Result<Arc<dyn BusClient>, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        Ok(self.client())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn recv(stream: &mut MessageStream) -> Option<RawMessage> {
        tokio::time::timeout(Duration::from_millis(200), stream.next())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn test_publish_reaches_matching_subscribers() {
        let bus = InMemoryBus::new();
        let mut exact = bus.subscribe("orders.create", &Default::default()).await.unwrap();
        let mut wildcard = bus.subscribe("orders.>", &Default::default()).await.unwrap();
        let mut other = bus.subscribe("users.*", &Default::default()).await.unwrap();

        bus.publish("orders.create", Bytes::from_static(b"{}")).await.unwrap();

        assert_eq!(recv(&mut exact).await.unwrap().subject, "orders.create");
        assert_eq!(recv(&mut wildcard).await.unwrap().payload.as_ref(), b"{}");
        assert!(recv(&mut other).await.is_none());
        assert_eq!(bus.published(), 1);
    }

    #[tokio::test]
    async fn test_queue_group_delivers_to_one_member() {
        let bus = InMemoryBus::new();
        let options = SubscribeOptions::default().queue_group("workers");
        let mut a = bus.subscribe("jobs", &options).await.unwrap();
        let mut b = bus.subscribe("jobs", &options).await.unwrap();

        for _ in 0..4 {
            bus.publish("jobs", Bytes::from_static(b"1")).await.unwrap();
        }
        bus.drain().await.unwrap();

        let mut count_a = 0;
        while recv(&mut a).await.is_some() {
            count_a += 1;
        }
        let mut count_b = 0;
        while recv(&mut b).await.is_some() {
            count_b += 1;
        }
        assert_eq!(count_a + count_b, 4);
        assert_eq!(count_a, 2);
    }

    #[tokio::test]
    async fn test_max_messages_ends_stream() {
        let bus = InMemoryBus::new();
        let mut sub = bus
            .subscribe("tick", &SubscribeOptions::default().max_messages(2))
            .await
            .unwrap();
        for _ in 0..3 {
            bus.publish("tick", Bytes::new()).await.unwrap();
        }
        assert!(recv(&mut sub).await.is_some());
        assert!(recv(&mut sub).await.is_some());
        assert_eq!(bus.subscriber_count(), 0);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_request_reply() {
        let bus = InMemoryBus::new();
        let mut service = bus.subscribe("echo", &Default::default()).await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            while let Some(message) = service.next().await {
                if let Some(reply) = message.reply {
                    let _ = responder.publish(&reply, message.payload).await;
                }
            }
        });

        let reply = bus.request("echo", Bytes::from_static(b"\"hi\"")).await.unwrap();
        assert_eq!(reply.payload.as_ref(), b"\"hi\"");
    }

    #[tokio::test]
    async fn test_requests_release_their_inboxes() {
        let bus = InMemoryBus::new();
        let mut service = bus.subscribe("echo", &Default::default()).await.unwrap();
        let responder = bus.clone();
        tokio::spawn(async move {
            while let Some(message) = service.next().await {
                if let Some(reply) = message.reply {
                    let _ = responder.publish(&reply, message.payload).await;
                }
            }
        });

        for _ in 0..50 {
            bus.request("echo", Bytes::from_static(b"1")).await.unwrap();
        }
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_request_without_responders() {
        let bus = InMemoryBus::new();
        let err = bus.request("nobody", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, BusError::NoResponders(subject) if subject == "nobody"));
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let bus = InMemoryBus::with_request_timeout(Duration::from_millis(20));
        let _silent = bus.subscribe("slow", &Default::default()).await.unwrap();
        let err = bus.request("slow", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, BusError::Timeout { .. }));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_drain_flushes_then_ends_streams() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("a", &Default::default()).await.unwrap();
        bus.publish("a", Bytes::from_static(b"1")).await.unwrap();
        bus.drain().await.unwrap();

        assert!(recv(&mut sub).await.is_some());
        assert!(sub.next().await.is_none());
        assert!(bus.publish("a", Bytes::new()).await.is_ok());
        assert!(matches!(
            bus.subscribe("b", &Default::default()).await,
            Err(BusError::Closed)
        ));
        assert!(bus.connect().await.is_err());

        bus.close().await.unwrap();
        assert!(matches!(
            bus.publish("a", Bytes::new()).await,
            Err(BusError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_reply_during_drain_reaches_requester() {
        let bus = InMemoryBus::new();
        let mut work = bus.subscribe("work", &Default::default()).await.unwrap();
        let requester = bus.clone();
        let pending = tokio::spawn(async move {
            requester.request("work", Bytes::from_static(b"1")).await
        });

        let message = recv(&mut work).await.unwrap();
        bus.drain().await.unwrap();
        bus.publish(&message.reply.unwrap(), Bytes::from_static(b"\"done\""))
            .await
            .unwrap();

        let reply = pending.await.unwrap().unwrap();
        assert_eq!(reply.payload.as_ref(), b"\"done\"");
        assert!(work.next().await.is_none());
    }

    #[tokio::test]
    async fn test_close_discards_pending() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("a", &Default::default()).await.unwrap();
        bus.publish("a", Bytes::from_static(b"1")).await.unwrap();
        bus.close().await.unwrap();
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_stream_is_unsubscribed() {
        let bus = InMemoryBus::new();
        let sub = bus.subscribe("a", &Default::default()).await.unwrap();
        assert_eq!(bus.subscriber_count(), 1);
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish("a", Bytes::new()).await.unwrap();
    }
}
