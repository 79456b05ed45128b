//! # Gating Layer (Hook)
//!
//! A hook runs before a handler and decides whether the message may go on.
//! Every hook has exactly three outcomes:
//!
//! - `Ok(HookOutcome::Pass)` - continue with the next hook (or the handler)
//! - `Ok(HookOutcome::Block)` - stop; the handler never runs
//! - `Err(_)` - the hook faulted; treated like a block but logged as an error
//!
//! # Static vs Dynamic Dispatch
//!
//! [`Hook`] uses a native `impl Future` return for zero-cost static dispatch.
//! Service method tables store hooks as [`DynHook`] trait objects; every
//! `Hook` is a `DynHook` through a blanket implementation.

use crate::context::Context;
use crate::error::BoxError;
use crate::response::IntoHookOutcome;
use std::{future::Future, pin::Pin};

/// Result of a hook that did not fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookOutcome {
    /// The message may continue.
    Pass,
    /// The message is rejected.
    Block,
}

/// A named gating function run before a handler.
///
/// Closures `Fn(Context) -> impl Future<Output = R>` implement `Hook` when
/// `R: IntoHookOutcome` (`bool`, [`HookOutcome`], or a `Result` of either).
#[diagnostic::on_unimplemented(
    message = "`{Self}` does not implement `Hook`",
    label = "missing `Hook` implementation",
    note = "Hooks must implement `check` or be a closure `Fn(Context) -> impl Future`."
)]
pub trait Hook: Send + Sync + 'static {
    /// Decide whether the message may continue.
    fn check(&self, ctx: Context)
    -> impl Future<Output = Result<HookOutcome, BoxError>> + Send;
}

/// Dynamic object-safe version of [`Hook`].
pub trait DynHook: Send + Sync + 'static {
    /// Decide whether the message may continue (dynamic dispatch version).
    fn check_dyn(
        &self,
        ctx: Context,
    ) -> Pin<Box<dyn Future<Output = Result<HookOutcome, BoxError>> + Send + '_>>;
}

// Blanket implementation: Any type implementing Hook implements DynHook automatically.
impl<T: Hook> DynHook for T {
    fn check_dyn(
        &self,
        ctx: Context,
    ) -> Pin<Box<dyn Future<Output = Result<HookOutcome, BoxError>> + Send + '_>> {
        Box::pin(self.check(ctx))
    }
}

// Blanket impl for closures
impl<F, Fut, R> Hook for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoHookOutcome,
{
    fn check(
        &self,
        ctx: Context,
    ) -> impl Future<Output = Result<HookOutcome, BoxError>> + Send {
        let fut = (self)(ctx);
        async move { fut.await.into_outcome() }
    }
}
