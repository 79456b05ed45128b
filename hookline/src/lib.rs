//! # hookline - Subject Dispatch for Pub/Sub Buses
//!
//! `hookline` binds bus subjects to handler methods on services. Every message
//! passes a per-subscription data quota and an ordered chain of named hooks
//! before its handler runs; failures are answered on the reply subject with
//! `{"error":{"message":"..."}}` and never stop the subscription.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hookline::prelude::*;
//!
//! #[derive(Default)]
//! struct Orders;
//!
//! #[hookline::service]
//! impl Orders {
//!     #[hook]
//!     async fn auth(&self, ctx: Context) -> bool {
//!         ctx.envelope().header("token").is_some()
//!     }
//!
//!     #[subscribe("orders.create", hooks = ["auth"], data_quota = 1_048_576)]
//!     async fn create(&self, ctx: Context) -> Result<Reply<u64>, BoxError> {
//!         let order: Order = ctx.decode()?;
//!         Ok(Reply(order.id))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     hookline::telemetry::init("info")?;
//!     let config = HooklineConfig::from_file("hookline.toml")?;
//!
//!     let coordinator = Coordinator::builder()
//!         .primary(Orders)
//!         .config(&config)
//!         .build()?;
//!     coordinator.start(&NatsConnector::new(config.bus.clone())).await?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Sub-services
//!
//! A sub-service registered with [`CoordinatorBuilder::sub_service`] resolves
//! hooks on itself first and on the primary service second. A hook defined
//! on both is taken from the sub-service only.

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

pub mod telemetry;

pub use hookline_core::{
    // Binding
    BindingConfig,
    // Error types
    BoxError,
    // Bus
    BusClient,
    BusError,
    CodecError,
    Connector,
    // Context
    Context,
    DEFAULT_DATA_QUOTA,
    Declaration,
    DispatchError,
    DynHandler,
    DynHook,
    // Envelope
    Envelope,
    ErrorReply,
    // Handler
    Handler,
    HandlerOutcome,
    Headers,
    // Hook
    Hook,
    HookOutcome,
    HooklineError,
    IntoHandlerOutput,
    IntoHookOutcome,
    MessageStream,
    // Service
    Method,
    MethodKind,
    MethodTable,
    RawMessage,
    RegistryError,
    // Response
    Reply,
    ResolveError,
    Service,
    ServiceRef,
    SubscribeOptions,
    codec,
    reply,
};

// Runtime
pub use hookline_std::{
    chain::HookChain,
    config::{BusConfig, ConfigError, DispatchConfig, HooklineConfig},
    coordinator::{Coordinator, CoordinatorBuilder},
    dispatch::{DispatchSettings, SubjectLoop},
    registry::{Binding, SubjectRegistry},
};

/// Bus client implementations.
pub mod bus {
    pub use hookline_std::bus::InMemoryBus;
    #[cfg(feature = "nats")]
    pub use hookline_std::bus::{NatsBus, NatsConnector};
}

pub use bus::InMemoryBus;
#[cfg(feature = "nats")]
pub use bus::{NatsBus, NatsConnector};

/// Standard hook implementations.
pub mod hooks {
    #![allow(clippy::wildcard_imports)]
    pub use hookline_std::hooks::*;
}

/// Testing utilities.
pub mod testing {
    #![allow(clippy::wildcard_imports)]
    pub use hookline_std::testing::*;
}

#[doc(hidden)]
pub use futures::future::BoxFuture;
/// `serde_json`, for payloads and binding metadata such as
/// `meta = serde_json::json!({ "kind": "create" })`.
pub use serde_json;

/// Prelude module - common imports for hookline.
///
/// # Usage
///
/// ```rust,ignore
/// use hookline::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        BindingConfig,
        // Errors
        BoxError,
        BusClient,
        Context,
        // Runtime
        Coordinator,
        DispatchError,
        Envelope,
        // Core traits
        Handler,
        Hook,
        HookOutcome,
        HooklineConfig,
        HooklineError,
        InMemoryBus,
        MethodTable,
        Reply,
        Service,
        ServiceRef,
    };

    #[cfg(feature = "nats")]
    pub use crate::NatsConnector;
}

#[cfg(feature = "macros")]
pub use hookline_macros::service;
