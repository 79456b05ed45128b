//! # Lifecycle Coordinator
//!
//! Owns the services and the subject registry, connects to the bus and runs
//! one dispatch loop per bound subject.
//!
//! ```rust,ignore
//! let coordinator = Coordinator::builder()
//!     .primary(Orders::default())
//!     .sub_service("users", Users::default())
//!     .bind("orders.audit", BindingConfig::new().hook("auth"), ServiceRef::Primary, "audit")
//!     .config(&config)
//!     .build()?;
//!
//! coordinator.start(&NatsConnector::new(config.bus.clone())).await?;
//! // ...
//! coordinator.shutdown().await;
//! ```

use crate::config::HooklineConfig;
use crate::dispatch::{DispatchSettings, SubjectLoop};
use crate::registry::{Binding, SubjectRegistry};
use hookline_core::{
    BindingConfig, BusClient, BusError, Connector, Envelope, HooklineError, MethodTable,
    RegistryError, ResolveError, Service, ServiceRef, codec,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A service together with its method table.
#[derive(Clone)]
struct ServiceSlot {
    service: Arc<dyn Service>,
    methods: Arc<MethodTable>,
}

impl ServiceSlot {
    fn new(service: Arc<dyn Service>) -> Self {
        let methods = Arc::new(service.clone().methods());
        Self { service, methods }
    }
}

/// A running dispatch loop.
struct ActiveSubscription {
    subject: String,
    processed: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

/// Builder for [`Coordinator`].
#[derive(Default)]
pub struct CoordinatorBuilder {
    primary: Option<ServiceSlot>,
    subs: Vec<(String, ServiceSlot)>,
    registry: SubjectRegistry,
    settings: DispatchSettings,
    error: Option<RegistryError>,
}

impl CoordinatorBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the primary service and register its declared bindings.
    pub fn primary<S: Service>(self, service: S) -> Self {
        self.primary_shared(Arc::new(service))
    }

    /// Like [`primary`](Self::primary), for a service that is already shared.
    pub fn primary_shared(mut self, service: Arc<dyn Service>) -> Self {
        let slot = ServiceSlot::new(service);
        self.declare(&slot, ServiceRef::Primary);
        self.primary = Some(slot);
        self
    }

    /// Add a named sub-service and register its declared bindings.
    pub fn sub_service<S: Service>(self, name: impl Into<String>, service: S) -> Self {
        self.sub_service_shared(name, Arc::new(service))
    }

    /// Like [`sub_service`](Self::sub_service), for a service that is already shared.
    pub fn sub_service_shared(mut self, name: impl Into<String>, service: Arc<dyn Service>) -> Self {
        let name = name.into();
        let slot = ServiceSlot::new(service);
        self.declare(&slot, ServiceRef::Sub(name.clone()));
        match self.subs.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = slot,
            None => self.subs.push((name, slot)),
        }
        self
    }

    /// Bind `subject` to `handler` on `owner`.
    ///
    /// A later binding for the same subject replaces this one.
    pub fn bind(
        mut self,
        subject: impl Into<String>,
        config: BindingConfig,
        owner: ServiceRef,
        handler: impl Into<String>,
    ) -> Self {
        self.register(subject.into(), config, owner, handler.into());
        self
    }

    /// Set dispatch settings.
    pub fn settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Take dispatch settings from a loaded configuration.
    pub fn config(self, config: &HooklineConfig) -> Self {
        self.settings(DispatchSettings::from(&config.dispatch))
    }

    /// Build the coordinator.
    ///
    /// Fails with the first invalid binding.
    pub fn build(self) -> Result<Coordinator, RegistryError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Ok(Coordinator {
            primary: self.primary,
            subs: self.subs,
            registry: self.registry,
            settings: self.settings,
            client: Mutex::new(None),
            active: Mutex::new(Vec::new()),
            ready: AtomicBool::new(false),
        })
    }

    fn declare(&mut self, slot: &ServiceSlot, owner: ServiceRef) {
        for declaration in slot.service.bindings() {
            self.register(
                declaration.subject,
                declaration.config,
                owner.clone(),
                declaration.handler,
            );
        }
    }

    fn register(&mut self, subject: String, config: BindingConfig, owner: ServiceRef, handler: String) {
        match self.registry.register(subject, config, owner, handler) {
            Ok(Some(replaced)) => {
                debug!(subject = %replaced.subject, "Binding replaced");
            }
            Ok(None) => {}
            Err(err) => {
                self.error.get_or_insert(err);
            }
        }
    }
}

/// Connects services to the bus and supervises their dispatch loops.
pub struct Coordinator {
    primary: Option<ServiceSlot>,
    subs: Vec<(String, ServiceSlot)>,
    registry: SubjectRegistry,
    settings: DispatchSettings,
    client: Mutex<Option<Arc<dyn BusClient>>>,
    active: Mutex<Vec<ActiveSubscription>>,
    ready: AtomicBool,
}

impl Coordinator {
    /// Start building a coordinator.
    pub fn builder() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
    }

    /// The subject registry.
    pub fn registry(&self) -> &SubjectRegistry {
        &self.registry
    }

    /// Dispatch settings in effect.
    pub fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// The connected client, if any.
    pub fn client(&self) -> Option<Arc<dyn BusClient>> {
        self.client.lock().ok().and_then(|client| client.clone())
    }

    /// Whether `start` has completed.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Subjects with a running dispatch loop, in activation order.
    pub fn active_subjects(&self) -> Vec<String> {
        self.active
            .lock()
            .map(|active| active.iter().map(|sub| sub.subject.clone()).collect())
            .unwrap_or_default()
    }

    /// Bytes received so far on the subscription for `subject`.
    pub fn processed_bytes(&self, subject: &str) -> Option<u64> {
        let active = self.active.lock().ok()?;
        active
            .iter()
            .find(|sub| sub.subject == subject)
            .map(|sub| sub.processed.load(Ordering::Acquire))
    }

    /// Map an owner reference to the owning service and its fallback.
    ///
    /// A sub-service falls back to the primary service; the primary has no
    /// fallback.
    fn resolve_owner(
        &self,
        owner: &ServiceRef,
    ) -> Result<(&ServiceSlot, Option<&ServiceSlot>), ResolveError> {
        match owner {
            ServiceRef::Primary => self
                .primary
                .as_ref()
                .map(|primary| (primary, None))
                .ok_or_else(|| ResolveError::UnknownService(owner.to_string())),
            ServiceRef::Sub(name) => self
                .subs
                .iter()
                .find(|(sub, _)| sub == name)
                .map(|(_, slot)| (slot, self.primary.as_ref()))
                .ok_or_else(|| ResolveError::UnknownService(name.clone())),
        }
    }

    /// Connect, notify services, and activate every binding.
    ///
    /// Only a connection failure is returned; bindings that cannot be
    /// activated are logged and skipped.
    pub async fn start(&self, connector: &dyn Connector) -> Result<(), BusError> {
        let client = connector.connect().await.map_err(|err| {
            error!(error = %err, "Failed to connect to bus");
            err
        })?;
        info!("Connected to bus");

        if let Some(primary) = &self.primary {
            primary.service.on_connected(client.clone()).await;
        }
        for (name, sub) in &self.subs {
            debug!(service = %name, "Notifying sub-service");
            sub.service.on_connected(client.clone()).await;
        }

        let activated = self.activate(client).await;
        self.ready.store(true, Ordering::Release);
        info!(subjects = activated, "Coordinator ready");
        Ok(())
    }

    /// Subscribe every binding on `client` and spawn its dispatch loop.
    ///
    /// Subjects whose loop is still running are left alone, so a subject never
    /// has more than one active subscription. Returns the number of loops
    /// started.
    pub async fn activate(&self, client: Arc<dyn BusClient>) -> usize {
        if let Ok(mut slot) = self.client.lock() {
            *slot = Some(client.clone());
        }

        let running: HashSet<String> = match self.active.lock() {
            Ok(mut active) => {
                active.retain(|sub| !sub.task.is_finished());
                active.iter().map(|sub| sub.subject.clone()).collect()
            }
            Err(_) => HashSet::new(),
        };

        let mut started = Vec::new();
        for binding in self.registry.iter() {
            if running.contains(&binding.subject) {
                debug!(subject = %binding.subject, "Subject already active");
                continue;
            }
            match self.spawn_loop(binding, &client).await {
                Ok(subscription) => started.push(subscription),
                Err(err) => warn!(
                    subject = %binding.subject,
                    handler = %binding.handler,
                    owner = %binding.owner,
                    error = %err,
                    "Skipping binding"
                ),
            }
        }

        let count = started.len();
        if let Ok(mut active) = self.active.lock() {
            active.extend(started);
        }
        count
    }

    async fn spawn_loop(
        &self,
        binding: &Arc<Binding>,
        client: &Arc<dyn BusClient>,
    ) -> Result<ActiveSubscription, HooklineError> {
        let (owner, fallback) = self.resolve_owner(&binding.owner)?;
        let handler = owner.methods.lookup_handler(&binding.handler)?;
        let stream = client
            .subscribe(&binding.subject, &binding.config.options)
            .await?;

        let subject_loop = SubjectLoop::new(
            binding.clone(),
            handler,
            owner.methods.clone(),
            fallback.map(|slot| slot.methods.clone()),
            client.clone(),
            self.settings,
        );
        let processed = subject_loop.processed_counter();
        debug!(subject = %binding.subject, handler = %binding.handler, "Subject activated");

        Ok(ActiveSubscription {
            subject: binding.subject.clone(),
            processed,
            task: tokio::spawn(subject_loop.run(stream)),
        })
    }

    /// Drain the connection and wait for every dispatch loop to finish.
    ///
    /// Falls back to closing the connection when draining fails. Never fails.
    pub async fn shutdown(&self) {
        self.ready.store(false, Ordering::Release);
        let client = self.client.lock().ok().and_then(|mut client| client.take());
        let active = self
            .active
            .lock()
            .map(|mut active| std::mem::take(&mut *active))
            .unwrap_or_default();

        let mut abort = false;
        if let Some(client) = client {
            if let Err(err) = client.drain().await {
                warn!(error = %err, "Drain failed, closing connection");
                if let Err(err) = client.close().await {
                    warn!(error = %err, "Close failed");
                }
                abort = true;
            }
        }

        for subscription in active {
            if abort {
                subscription.task.abort();
            }
            if let Err(err) = subscription.task.await {
                if !err.is_cancelled() {
                    warn!(subject = %subscription.subject, error = %err, "Dispatch loop ended abnormally");
                }
            }
        }
        info!("Coordinator stopped");
    }

    fn connected(&self) -> Result<Arc<dyn BusClient>, BusError> {
        self.client().ok_or(BusError::NotConnected)
    }

    /// Encode `value` and publish it to `subject`.
    pub async fn publish<T>(&self, subject: &str, value: &T) -> Result<(), HooklineError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let client = self.connected()?;
        let payload = codec::encode(value)?;
        client.publish(subject, payload).await?;
        Ok(())
    }

    /// Encode `value`, send it as a request to `subject`, and wrap the reply.
    pub async fn request<T>(&self, subject: &str, value: &T) -> Result<Envelope, HooklineError>
    where
        T: Serialize + ?Sized + Sync,
    {
        let client = self.connected()?;
        let payload = codec::encode(value)?;
        let reply = client.request(subject, payload).await?;
        Ok(Envelope::new(reply, client))
    }
}
