//! # hookline-core
//!
//! Core traits for the hookline subject dispatch framework.
//!
//! This crate has minimal dependencies and is designed to be imported by
//! services and bus adapters that don't need the `hookline-std` runtime.
//!
//! # Pipeline Layers
//!
//! A message travels through three layers once the bus delivers it:
//!
//! ## Envelope ([`Envelope`])
//!
//! Wraps the [`RawMessage`] with its decoded JSON payload and the ability to
//! respond to the sender. Decode failures are carried, never raised.
//!
//! ## Gating ([`Hook`])
//!
//! Named hooks run in declared order and answer pass, block, or fault.
//! The first non-pass stops the message.
//!
//! ## Terminal ([`Handler`])
//!
//! The method bound to the subject. Its output may be sent back as a reply.
//!
//! Hooks and handlers are owned by a [`Service`] and exposed by name through
//! its [`MethodTable`].
//!
//! # Error Types
//!
//! - [`HooklineError`] - Top-level error type
//! - [`BusError`] - Bus client errors
//! - [`DispatchError`] - Per-message pipeline failures

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

mod binding;
mod bus;
pub mod codec;
mod context;
mod envelope;
mod error;
mod handler;
mod hook;
pub mod reply;
mod response;
mod service;

// Re-exports
pub use binding::{BindingConfig, DEFAULT_DATA_QUOTA, Declaration, ServiceRef};
pub use bus::{BusClient, Connector, Headers, MessageStream, RawMessage, SubscribeOptions};
pub use context::Context;
pub use envelope::Envelope;
pub use error::{
    BoxError, BusError, CodecError, DispatchError, HooklineError, RegistryError, ResolveError,
};
pub use handler::{DynHandler, Handler, HandlerOutcome};
pub use hook::{DynHook, Hook, HookOutcome};
pub use reply::ErrorReply;
pub use response::{IntoHandlerOutput, IntoHookOutcome, Reply};
pub use service::{Method, MethodKind, MethodTable, Service};
