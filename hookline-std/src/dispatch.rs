//! # Subject Dispatch Loop
//!
//! One [`SubjectLoop`] consumes the message stream of one subscription,
//! strictly one message at a time:
//!
//! ```text
//! RECEIVED ─▶ QUOTA_CHECK ─▶ HOOKS ─▶ HANDLER ─▶ DONE
//!                  │            │                  ▲
//!                  └────────────┴──── rejected ────┘
//! ```
//!
//! A rejected message is answered with an [`ErrorReply`](hookline_core::ErrorReply)
//! when it carries a reply target, logged, and dropped. The loop itself keeps
//! running until the stream ends.

use crate::chain::HookChain;
use crate::config::DispatchConfig;
use crate::guard::guarded;
use crate::registry::Binding;
use futures::StreamExt;
use hookline_core::{
    BusClient, Context, DEFAULT_DATA_QUOTA, DispatchError, DynHandler, Envelope, MessageStream,
    MethodTable, RawMessage,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{Instrument, error, info, info_span, warn};

/// Settings shared by every dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Quota for bindings that do not set one.
    pub default_data_quota: u64,
    /// Per-hook time limit.
    pub hook_timeout: Option<Duration>,
    /// Per-handler time limit.
    pub handler_timeout: Option<Duration>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            default_data_quota: DEFAULT_DATA_QUOTA,
            hook_timeout: None,
            handler_timeout: None,
        }
    }
}

impl From<&DispatchConfig> for DispatchSettings {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            default_data_quota: config.default_data_quota,
            hook_timeout: config.hook_timeout(),
            handler_timeout: config.handler_timeout(),
        }
    }
}

/// The per-subject message pipeline.
pub struct SubjectLoop {
    binding: Arc<Binding>,
    handler: Arc<dyn DynHandler>,
    handler_name: Arc<str>,
    local: Arc<MethodTable>,
    fallback: Option<Arc<MethodTable>>,
    client: Arc<dyn BusClient>,
    settings: DispatchSettings,
    meta: Arc<Value>,
    processed: Arc<AtomicU64>,
}

impl SubjectLoop {
    /// Create a loop for `binding`.
    ///
    /// `local` is the owning service's method table; `fallback` is the
    /// primary service's table when the owner is a sub-service.
    pub fn new(
        binding: Arc<Binding>,
        handler: Arc<dyn DynHandler>,
        local: Arc<MethodTable>,
        fallback: Option<Arc<MethodTable>>,
        client: Arc<dyn BusClient>,
        settings: DispatchSettings,
    ) -> Self {
        let handler_name = Arc::from(binding.handler.as_str());
        let meta = Arc::new(binding.config.meta.clone());
        Self {
            binding,
            handler,
            handler_name,
            local,
            fallback,
            client,
            settings,
            meta,
            processed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Running byte counter of this subscription.
    pub fn processed_counter(&self) -> Arc<AtomicU64> {
        self.processed.clone()
    }

    /// Effective data quota in bytes.
    pub fn quota(&self) -> u64 {
        self.binding
            .config
            .data_quota
            .unwrap_or(self.settings.default_data_quota)
    }

    /// Consume `stream` until it ends.
    pub async fn run(self, mut stream: MessageStream) {
        while let Some(message) = stream.next().await {
            // Failures were already answered and logged.
            let _ = self.dispatch(message).await;
        }
        info!(subject = %self.binding.subject, "Subscription closed");
    }

    /// Run one message through the pipeline.
    pub async fn dispatch(&self, message: RawMessage) -> Result<(), DispatchError> {
        let span = info_span!(
            "dispatch",
            subject = %self.binding.subject,
            handler = %self.binding.handler,
        );
        async move {
            info!("Subject called");
            let envelope = Arc::new(Envelope::new(message, self.client.clone()));
            let result = self.process(&envelope).await;
            match &result {
                Ok(()) => info!("Subject ended"),
                Err(err) => self.reject(&envelope, err).await,
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn process(&self, envelope: &Arc<Envelope>) -> Result<(), DispatchError> {
        let processed = self
            .processed
            .fetch_add(envelope.len() as u64, Ordering::AcqRel);
        let quota = self.quota();
        if processed > quota {
            return Err(DispatchError::QuotaExceeded { processed, quota });
        }

        let ctx = Context::new(
            envelope.clone(),
            self.client.clone(),
            self.handler_name.clone(),
            self.meta.clone(),
        );

        HookChain::new(&self.local)
            .with_fallback(self.fallback.as_deref())
            .with_timeout(self.settings.hook_timeout)
            .run(&self.binding.config.hooks, &ctx)
            .await?;

        let output = guarded(self.settings.handler_timeout, self.handler.call_dyn(ctx))
            .await
            .map_err(|source| DispatchError::HandlerFaulted {
                handler: self.binding.handler.clone(),
                source,
            })?;

        if let Some(payload) = output {
            if let Err(err) = envelope.respond_bytes(payload).await {
                warn!(error = %err, "Failed to send handler reply");
            }
        }
        Ok(())
    }

    async fn reject(&self, envelope: &Envelope, err: &DispatchError) {
        match err {
            DispatchError::QuotaExceeded { processed, quota } => {
                warn!(processed, quota, "Data quota exceeded");
            }
            DispatchError::HookUnresolved { hook, source } => {
                warn!(hook = %hook, error = %source, "Hook unhandled");
            }
            DispatchError::HookBlocked { hook } => {
                info!(hook = %hook, "Blocked by hook");
            }
            DispatchError::HookFaulted { hook, source } => {
                error!(hook = %hook, error = %source, "Hook failed");
            }
            DispatchError::HandlerFaulted { handler, source } => {
                error!(
                    subject = %self.binding.subject,
                    handler = %handler,
                    error = %source,
                    "Handler failed"
                );
            }
        }

        if let Err(send_err) = envelope.respond(&err.to_reply()).await {
            warn!(error = %send_err, "Failed to send error reply");
        }
    }
}
