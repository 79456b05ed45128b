//! Error types for hookline.
//!
//! This module provides a structured error hierarchy using `thiserror`:
//!
//! - [`HooklineError`] - Top-level error type
//! - [`BusError`] - Errors from the bus client
//! - [`CodecError`] - Payload encode/decode failures
//! - [`ResolveError`] - Hook / handler name resolution failures
//! - [`RegistryError`] - Binding registration failures
//! - [`DispatchError`] - Per-message pipeline failures

use crate::reply::{ErrorReply, HOOK_UNHANDLED, QUOTA_EXCEEDED, UNKNOWN_ERROR};
use crate::service::MethodKind;
use std::time::Duration;
use thiserror::Error;

/// A boxed error type for dynamic error handling.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for all hookline operations.
#[derive(Error, Debug)]
pub enum HooklineError {
    /// The bus client failed.
    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    /// A payload could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A binding could not be registered.
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    /// A method could not be resolved.
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// A custom error occurred.
    #[error(transparent)]
    Custom(BoxError),
}

/// Errors raised by a bus client.
#[derive(Error, Debug)]
pub enum BusError {
    /// An outbound call was attempted before a connection exists.
    #[error("bus client is not connected")]
    NotConnected,

    /// The connection could not be established.
    #[error("failed to connect to bus: {0}")]
    Connect(#[source] BoxError),

    /// A subscription could not be opened.
    #[error("failed to subscribe to `{subject}`: {source}")]
    Subscribe {
        /// Subject that was being subscribed.
        subject: String,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// A publish failed.
    #[error("failed to publish to `{subject}`: {source}")]
    Publish {
        /// Destination subject.
        subject: String,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// A request failed.
    #[error("request to `{subject}` failed: {source}")]
    Request {
        /// Destination subject.
        subject: String,
        /// Underlying transport error.
        #[source]
        source: BoxError,
    },

    /// Nobody is subscribed to the requested subject.
    #[error("no responders for `{0}`")]
    NoResponders(String),

    /// A request did not receive a reply in time.
    #[error("request to `{subject}` timed out after {timeout:?}")]
    Timeout {
        /// Destination subject.
        subject: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Draining the connection failed.
    #[error("drain failed: {0}")]
    Drain(#[source] BoxError),

    /// The connection has been closed.
    #[error("bus connection closed")]
    Closed,
}

/// Errors from the JSON payload codec.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// The bytes are not valid JSON for the requested type.
    #[error("failed to decode payload: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Errors from resolving a method name on a service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No method with this name exists.
    #[error("method `{0}` not found")]
    Missing(String),

    /// A method with this name exists but has the wrong kind.
    #[error("method `{name}` is not callable as a {expected}")]
    NotCallable {
        /// Method name.
        name: String,
        /// Kind that was asked for.
        expected: MethodKind,
    },

    /// The owning service is not registered with the coordinator.
    #[error("service `{0}` is not registered")]
    UnknownService(String),
}

/// Errors from registering a binding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Subjects must be non-empty.
    #[error("subject must not be empty")]
    EmptySubject,

    /// Handler names must be non-empty.
    #[error("handler name for `{0}` must not be empty")]
    EmptyHandler(String),
}

/// Per-message failures of the dispatch pipeline.
///
/// None of these terminate the subscription; they only stop processing of
/// the current message.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The subscription already processed more bytes than its quota.
    #[error("data quota exceeded: {processed} bytes processed, quota is {quota}")]
    QuotaExceeded {
        /// Bytes received on the subscription before this message.
        processed: u64,
        /// Configured quota.
        quota: u64,
    },

    /// A hook name did not resolve on either owner.
    #[error("hook `{hook}` could not be resolved: {source}")]
    HookUnresolved {
        /// Hook name.
        hook: String,
        /// Why resolution failed.
        #[source]
        source: ResolveError,
    },

    /// A hook returned [`HookOutcome::Block`](crate::HookOutcome::Block).
    #[error("blocked by hook: {hook}")]
    HookBlocked {
        /// Hook name.
        hook: String,
    },

    /// A hook returned an error.
    #[error("hook `{hook}` failed: {source}")]
    HookFaulted {
        /// Hook name.
        hook: String,
        /// Error returned by the hook.
        #[source]
        source: BoxError,
    },

    /// The handler returned an error.
    #[error("handler `{handler}` failed: {source}")]
    HandlerFaulted {
        /// Handler name.
        handler: String,
        /// Error returned by the handler.
        #[source]
        source: BoxError,
    },
}

impl DispatchError {
    /// Message sent back to the requester for this failure.
    ///
    /// Internal error details are never leaked to the wire.
    pub fn reply_message(&self) -> String {
        match self {
            DispatchError::QuotaExceeded { .. } => QUOTA_EXCEEDED.to_string(),
            DispatchError::HookUnresolved { .. } | DispatchError::HookFaulted { .. } => {
                HOOK_UNHANDLED.to_string()
            }
            DispatchError::HookBlocked { hook } => format!("blocked by hook: {hook}"),
            DispatchError::HandlerFaulted { .. } => UNKNOWN_ERROR.to_string(),
        }
    }

    /// The wire payload for this failure.
    pub fn to_reply(&self) -> ErrorReply {
        ErrorReply::new(self.reply_message())
    }
}

// Convenience conversions
impl From<BoxError> for HooklineError {
    fn from(err: BoxError) -> Self {
        HooklineError::Custom(err)
    }
}
