//! # Terminal Layer (Handler)
//!
//! The bound method that runs once every hook has passed.
//!
//! # Usage Patterns
//!
//! 1. **Direct closure**: `|ctx: Context| async move { ... }`
//! 2. **Struct implementation**: `impl Handler for MyHandler`
//! 3. **Service method**: generated by `#[hookline::service]`

use crate::context::Context;
use crate::error::BoxError;
use crate::response::IntoHandlerOutput;
use bytes::Bytes;
use std::{future::Future, pin::Pin};

/// What a handler produced: optional reply bytes, or the error it failed with.
pub type HandlerOutcome = Result<Option<Bytes>, BoxError>;

/// The endpoint bound to a subject.
#[diagnostic::on_unimplemented(
    message = "`{Self}` is not a `Handler`",
    label = "missing `Handler` implementation",
    note = "Handlers must implement `call` or be a closure `Fn(Context) -> impl Future`."
)]
pub trait Handler: Send + Sync + 'static {
    /// The output type of the handler, usually `()`, `Result`, or `Reply`.
    type Output: IntoHandlerOutput;

    /// Executes the handler logic.
    fn call(&self, ctx: Context) -> impl Future<Output = Self::Output> + Send;
}

/// Dynamic object-safe version of [`Handler`].
pub trait DynHandler: Send + Sync + 'static {
    /// Executes the handler and converts its output.
    fn call_dyn(&self, ctx: Context) -> Pin<Box<dyn Future<Output = HandlerOutcome> + Send + '_>>;
}

impl<T: Handler> DynHandler for T {
    fn call_dyn(&self, ctx: Context) -> Pin<Box<dyn Future<Output = HandlerOutcome> + Send + '_>> {
        Box::pin(async move { self.call(ctx).await.into_handler_output() })
    }
}

// Blanket impl for closures
impl<F, Fut, Out> Handler for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Out> + Send + 'static,
    Out: IntoHandlerOutput,
{
    type Output = Out;

    fn call(&self, ctx: Context) -> impl Future<Output = Self::Output> + Send {
        (self)(ctx)
    }
}
