//! Logging hook for message observation.

use hookline_core::{BoxError, Context, Hook, HookOutcome};

/// A hook that logs the message and always passes.
///
/// Useful as the first entry of a chain while debugging a binding.
pub struct LoggingHook {
    name: &'static str,
}

impl LoggingHook {
    /// Create a new `LoggingHook` with a default name.
    pub fn new() -> Self {
        Self { name: "message" }
    }

    /// Create a new `LoggingHook` with a custom name.
    pub fn named(name: &'static str) -> Self {
        Self { name }
    }
}

impl Default for LoggingHook {
    fn default() -> Self {
        Self::new()
    }
}

impl Hook for LoggingHook {
    async fn check(&self, ctx: Context) -> Result<HookOutcome, BoxError> {
        tracing::debug!(
            name = %self.name,
            subject = %ctx.subject(),
            handler = %ctx.handler_name(),
            reply = ?ctx.reply(),
            bytes = ctx.envelope().len(),
            "Observed message"
        );
        Ok(HookOutcome::Pass)
    }
}
