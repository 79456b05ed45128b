//! # Services
//!
//! A service owns handlers and hooks and exposes them by name through a
//! [`MethodTable`]. Name lookup is an explicit table probe: a name resolves
//! only to a method registered with the matching [`MethodKind`].

use crate::binding::Declaration;
use crate::bus::BusClient;
use crate::error::ResolveError;
use crate::handler::{DynHandler, Handler};
use crate::hook::{DynHook, Hook};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The kind of a named method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// A gating hook.
    Hook,
    /// A subject handler.
    Handler,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodKind::Hook => f.write_str("hook"),
            MethodKind::Handler => f.write_str("handler"),
        }
    }
}

/// A callable registered on a service.
#[derive(Clone)]
pub enum Method {
    /// A gating hook.
    Hook(Arc<dyn DynHook>),
    /// A subject handler.
    Handler(Arc<dyn DynHandler>),
}

impl Method {
    /// The kind of this method.
    pub fn kind(&self) -> MethodKind {
        match self {
            Method::Hook(_) => MethodKind::Hook,
            Method::Handler(_) => MethodKind::Handler,
        }
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method::{:?}", self.kind())
    }
}

/// Name → callable mapping exposed by a service.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
}

impl MethodTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook.
    pub fn hook<H: Hook>(mut self, name: impl Into<String>, hook: H) -> Self {
        self.methods
            .insert(name.into(), Method::Hook(Arc::new(hook)));
        self
    }

    /// Register a handler.
    pub fn handler<H: Handler>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.methods
            .insert(name.into(), Method::Handler(Arc::new(handler)));
        self
    }

    /// Insert a method, returning the one it replaced.
    pub fn insert(&mut self, name: impl Into<String>, method: Method) -> Option<Method> {
        self.methods.insert(name.into(), method)
    }

    /// Get a method by name, whatever its kind.
    pub fn get(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    /// Whether a method of any kind is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Look up a hook.
    pub fn lookup_hook(&self, name: &str) -> Result<Arc<dyn DynHook>, ResolveError> {
        match self.methods.get(name) {
            Some(Method::Hook(hook)) => Ok(hook.clone()),
            Some(_) => Err(ResolveError::NotCallable {
                name: name.to_string(),
                expected: MethodKind::Hook,
            }),
            None => Err(ResolveError::Missing(name.to_string())),
        }
    }

    /// Look up a handler.
    pub fn lookup_handler(&self, name: &str) -> Result<Arc<dyn DynHandler>, ResolveError> {
        match self.methods.get(name) {
            Some(Method::Handler(handler)) => Ok(handler.clone()),
            Some(_) => Err(ResolveError::NotCallable {
                name: name.to_string(),
                expected: MethodKind::Handler,
            }),
            None => Err(ResolveError::Missing(name.to_string())),
        }
    }

    /// Registered names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.methods.iter()).finish()
    }
}

/// A unit that owns handlers and hooks.
///
/// Implemented by hand or generated with `#[hookline::service]`.
pub trait Service: Send + Sync + 'static {
    /// Build the method table. Called once, when the coordinator is built.
    fn methods(self: Arc<Self>) -> MethodTable;

    /// Bindings this service declares.
    fn bindings(&self) -> Vec<Declaration> {
        Vec::new()
    }

    /// Called once the bus connection is established.
    fn on_connected(&self, client: Arc<dyn BusClient>) -> BoxFuture<'_, ()> {
        let _ = client;
        Box::pin(async {})
    }
}
