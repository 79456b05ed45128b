//! Binding declarations.
//!
//! A binding ties a subject to a handler method on a service, together with
//! the hooks to run first, a data quota, subscription options and free-form
//! metadata.

use crate::bus::SubscribeOptions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default cumulative byte quota per subscription.
pub const DEFAULT_DATA_QUOTA: u64 = 102_400;

/// Identifies which service owns a binding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceRef {
    /// The primary service.
    Primary,
    /// A sub-service, by registration name.
    Sub(String),
}

impl ServiceRef {
    /// Reference a sub-service by name.
    pub fn sub(name: impl Into<String>) -> Self {
        ServiceRef::Sub(name.into())
    }
}

impl fmt::Display for ServiceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceRef::Primary => f.write_str("primary"),
            ServiceRef::Sub(name) => f.write_str(name),
        }
    }
}

/// Per-binding settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Hook names, evaluated in order.
    pub hooks: Vec<String>,
    /// Cumulative byte quota; falls back to the dispatch default when unset.
    pub data_quota: Option<u64>,
    /// Passed through to the bus on subscribe.
    pub options: SubscribeOptions,
    /// Handed to the handler untouched.
    pub meta: Value,
}

impl BindingConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the hook chain.
    pub fn hooks<I, S>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hooks = hooks.into_iter().map(Into::into).collect();
        self
    }

    /// Append one hook to the chain.
    pub fn hook(mut self, hook: impl Into<String>) -> Self {
        self.hooks.push(hook.into());
        self
    }

    /// Set the data quota in bytes.
    pub fn data_quota(mut self, bytes: u64) -> Self {
        self.data_quota = Some(bytes);
        self
    }

    /// Set the subscription options.
    pub fn options(mut self, options: SubscribeOptions) -> Self {
        self.options = options;
        self
    }

    /// Join a queue group.
    pub fn queue_group(mut self, group: impl Into<String>) -> Self {
        self.options.queue_group = Some(group.into());
        self
    }

    /// Unsubscribe after `max` messages.
    pub fn max_messages(mut self, max: u64) -> Self {
        self.options.max_messages = Some(max);
        self
    }

    /// Set the metadata value.
    pub fn meta(mut self, meta: impl Into<Value>) -> Self {
        self.meta = meta.into();
        self
    }
}

/// A binding as declared by a service, before the owner is known.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Subject to subscribe to.
    pub subject: String,
    /// Handler method name on the declaring service.
    pub handler: String,
    /// Binding settings.
    pub config: BindingConfig,
}

impl Declaration {
    /// Declare a binding.
    pub fn new(
        subject: impl Into<String>,
        handler: impl Into<String>,
        config: BindingConfig,
    ) -> Self {
        Self {
            subject: subject.into(),
            handler: handler.into(),
            config,
        }
    }
}
