//! Testing utilities for hookline.
//!
//! # Features
//!
//! - [`RecordingHook`]: A hook that counts its invocations and passes or blocks
//! - [`StaticHook`]: A hook with a fixed outcome, including faults
//! - [`RecordingHandler`]: A handler that records every message it receives
//! - [`FailingHandler`]: A handler that always fails
//! - [`FailingConnector`]: A connector that never connects
//! - [`UndrainableBus`]: An in-memory bus whose drain always fails
//! - [`TestService`]: A service assembled from a method table and declarations
//! - [`detached_context`]: A context for calling hooks and handlers directly

use crate::bus::InMemoryBus;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use hookline_core::{
    BindingConfig, BoxError, BusClient, BusError, Connector, Context, Declaration, Envelope,
    Handler, Hook, HookOutcome, MessageStream, MethodTable, RawMessage, Service,
    SubscribeOptions,
};
use serde_json::Value;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

// ============================================================================
// Contexts
// ============================================================================

/// Build a context for `subject` carrying `payload`.
///
/// The context's client is a fresh [`InMemoryBus`], its handler name is
/// `"test"` and its metadata is `null`.
pub fn detached_context(subject: &str, payload: &[u8]) -> Context {
    let bus = InMemoryBus::new();
    let message = RawMessage::new(subject, payload.to_vec());
    Context::new(
        Arc::new(Envelope::new(message, bus.client())),
        bus.client(),
        "test",
        Arc::new(Value::Null),
    )
}

// ============================================================================
// Recording Hook
// ============================================================================

/// A hook that counts its invocations.
///
/// Clones share the counter.
///
/// # Example
///
/// ```rust,ignore
/// let auth = RecordingHook::passing();
/// let table = MethodTable::new().hook("auth", auth.clone());
///
/// // Dispatch a message...
///
/// assert_eq!(auth.count(), 1);
/// ```
#[derive(Clone)]
pub struct RecordingHook {
    calls: Arc<AtomicUsize>,
    outcome: HookOutcome,
}

impl RecordingHook {
    /// A recording hook that passes.
    pub fn passing() -> Self {
        Self::with_outcome(HookOutcome::Pass)
    }

    /// A recording hook that blocks.
    pub fn blocking() -> Self {
        Self::with_outcome(HookOutcome::Block)
    }

    /// A recording hook with a fixed outcome.
    pub fn with_outcome(outcome: HookOutcome) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            outcome,
        }
    }

    /// Number of times the hook ran.
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Hook for RecordingHook {
    async fn check(&self, _ctx: Context) -> Result<HookOutcome, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome)
    }
}

// ============================================================================
// Static Hook
// ============================================================================

/// A hook with a fixed result.
#[derive(Debug, Clone)]
pub enum StaticHook {
    /// Always pass.
    Pass,
    /// Always block.
    Block,
    /// Always fail with this message.
    Fault(String),
}

impl StaticHook {
    /// A hook that always fails with `message`.
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }
}

impl Hook for StaticHook {
    async fn check(&self, _ctx: Context) -> Result<HookOutcome, BoxError> {
        match self {
            Self::Pass => Ok(HookOutcome::Pass),
            Self::Block => Ok(HookOutcome::Block),
            Self::Fault(message) => Err(message.clone().into()),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// A handler that records the messages it receives.
///
/// Clones share the record.
#[derive(Clone, Default)]
pub struct RecordingHandler {
    messages: Arc<Mutex<Vec<RawMessage>>>,
}

impl RecordingHandler {
    /// Create an empty recording handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the message behind `ctx`.
    pub fn record(&self, ctx: &Context) {
        let envelope = ctx.envelope();
        let mut message = RawMessage::new(envelope.subject(), envelope.payload().clone());
        message.reply = envelope.reply().map(str::to_string);
        message.headers = envelope.headers().clone();
        self.messages.lock().unwrap().push(message);
    }

    /// Messages received so far.
    pub fn messages(&self) -> Vec<RawMessage> {
        self.messages.lock().unwrap().clone()
    }

    /// Number of messages received.
    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl Handler for RecordingHandler {
    type Output = ();

    async fn call(&self, ctx: Context) {
        self.record(&ctx);
    }
}

/// A handler that always fails.
#[derive(Debug, Clone)]
pub struct FailingHandler {
    message: String,
    calls: Arc<AtomicUsize>,
}

impl FailingHandler {
    /// A handler failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of times the handler ran.
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Handler for FailingHandler {
    type Output = Result<(), BoxError>;

    async fn call(&self, _ctx: Context) -> Result<(), BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(self.message.clone().into())
    }
}

// ============================================================================
// Connectors
// ============================================================================

/// A connector whose connection attempts always fail.
#[derive(Debug, Clone, Default)]
pub struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self) -> Result<Arc<dyn BusClient>, BusError> {
        Err(BusError::Connect("connection refused".into()))
    }
}

/// An [`InMemoryBus`] whose `drain` always fails.
///
/// Everything else is forwarded to the inner bus. Clones share the bus and
/// the close counter.
#[derive(Clone, Default)]
pub struct UndrainableBus {
    bus: InMemoryBus,
    closes: Arc<AtomicUsize>,
}

impl UndrainableBus {
    /// Create a bus around a fresh [`InMemoryBus`].
    pub fn new() -> Self {
        Self::default()
    }

    /// The wrapped bus.
    pub fn inner(&self) -> &InMemoryBus {
        &self.bus
    }

    /// How many times `close` was called.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BusClient for UndrainableBus {
    async fn subscribe(
        &self,
        subject: &str,
        options: &SubscribeOptions,
    ) -> Result<MessageStream, BusError> {
        self.bus.subscribe(subject, options).await
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.bus.publish(subject, payload).await
    }

    async fn publish_with_reply(
        &self,
        subject: &str,
        reply: &str,
        payload: Bytes,
    ) -> Result<(), BusError> {
        self.bus.publish_with_reply(subject, reply, payload).await
    }

    async fn request(&self, subject: &str, payload: Bytes) -> Result<RawMessage, BusError> {
        self.bus.request(subject, payload).await
    }

    async fn drain(&self) -> Result<(), BusError> {
        Err(BusError::Drain("drain refused".into()))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.bus.close().await
    }
}

#[async_trait]
impl Connector for UndrainableBus {
    async fn connect(&self) -> Result<Arc<dyn BusClient>, BusError> {
        Ok(Arc::new(self.clone()))
    }
}

// ============================================================================
// Test Service
// ============================================================================

/// A service assembled from a method table and declarations.
///
/// Every `on_connected` call appends the service's name to a connection log
/// that clones share, so tests can assert notification order across services.
///
/// # Example
///
/// ```rust,ignore
/// let log = TestService::connection_log();
/// let primary = TestService::new("primary", MethodTable::new()).with_log(log.clone());
/// let users = TestService::new("users", MethodTable::new()).with_log(log.clone());
///
/// // Start a coordinator...
///
/// assert_eq!(*log.lock().unwrap(), vec!["primary", "users"]);
/// ```
#[derive(Clone)]
pub struct TestService {
    name: String,
    methods: MethodTable,
    declarations: Vec<Declaration>,
    log: Arc<Mutex<Vec<String>>>,
}

impl TestService {
    /// Create a service named `name` exposing `methods`.
    pub fn new(name: impl Into<String>, methods: MethodTable) -> Self {
        Self {
            name: name.into(),
            methods,
            declarations: Vec::new(),
            log: Self::connection_log(),
        }
    }

    /// A fresh connection log.
    pub fn connection_log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    /// Share `log` with other services.
    pub fn with_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = log;
        self
    }

    /// Declare a binding from `subject` to `handler`.
    pub fn subscribe(
        mut self,
        subject: impl Into<String>,
        handler: impl Into<String>,
        config: BindingConfig,
    ) -> Self {
        self.declarations
            .push(Declaration::new(subject, handler, config));
        self
    }

    /// Names recorded in the connection log.
    pub fn connected(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl Service for TestService {
    fn methods(self: Arc<Self>) -> MethodTable {
        self.methods.clone()
    }

    fn bindings(&self) -> Vec<Declaration> {
        self.declarations.clone()
    }

    fn on_connected(&self, _client: Arc<dyn BusClient>) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.name.clone());
        })
    }
}
