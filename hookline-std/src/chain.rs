//! Hook chain evaluation.
//!
//! Hooks are looked up by name on the binding's own service first and on the
//! primary service second. The first service that has a hook of that name
//! wins outright; the two are never merged.

use crate::guard::guarded;
use hookline_core::{
    Context, DispatchError, DynHook, HookOutcome, MethodTable, ResolveError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// An ordered hook evaluator over a local and an optional fallback service.
pub struct HookChain<'a> {
    local: &'a MethodTable,
    fallback: Option<&'a MethodTable>,
    timeout: Option<Duration>,
}

impl<'a> HookChain<'a> {
    /// Create a chain resolving hooks on `local` only.
    pub fn new(local: &'a MethodTable) -> Self {
        Self {
            local,
            fallback: None,
            timeout: None,
        }
    }

    /// Also resolve hooks on `fallback` when `local` lacks them.
    pub fn with_fallback(mut self, fallback: Option<&'a MethodTable>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Bound each hook invocation.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve `name` to a hook.
    ///
    /// When neither service has a usable hook, a wrong-kind method on either
    /// side is reported in preference to a plain miss.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DynHook>, ResolveError> {
        let local_err = match self.local.lookup_hook(name) {
            Ok(hook) => return Ok(hook),
            Err(err) => err,
        };
        let Some(fallback) = self.fallback else {
            return Err(local_err);
        };
        fallback.lookup_hook(name).map_err(|fallback_err| match local_err {
            ResolveError::Missing(_) => fallback_err,
            not_callable => not_callable,
        })
    }

    /// Run `hooks` in order, stopping at the first one that does not pass.
    pub async fn run(&self, hooks: &[String], ctx: &Context) -> Result<(), DispatchError> {
        for name in hooks {
            let hook = self
                .resolve(name)
                .map_err(|source| DispatchError::HookUnresolved {
                    hook: name.clone(),
                    source,
                })?;

            match guarded(self.timeout, hook.check_dyn(ctx.clone())).await {
                Ok(HookOutcome::Pass) => debug!(hook = %name, "Hook passed"),
                Ok(HookOutcome::Block) => {
                    return Err(DispatchError::HookBlocked { hook: name.clone() });
                }
                Err(source) => {
                    return Err(DispatchError::HookFaulted {
                        hook: name.clone(),
                        source,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingHook, StaticHook, detached_context};
    use hookline_core::MethodKind;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_chain_passes() {
        let table = MethodTable::new();
        let chain = HookChain::new(&table);
        chain.run(&[], &detached_context("a", b"{}")).await.unwrap();
    }

    #[tokio::test]
    async fn test_short_circuit_on_block() {
        let h1 = RecordingHook::passing();
        let h2 = RecordingHook::blocking();
        let h3 = RecordingHook::passing();
        let table = MethodTable::new()
            .hook("h1", h1.clone())
            .hook("h2", h2.clone())
            .hook("h3", h3.clone());

        let err = HookChain::new(&table)
            .run(&names(&["h1", "h2", "h3"]), &detached_context("a", b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::HookBlocked { ref hook } if hook == "h2"));
        assert_eq!(h1.count(), 1);
        assert_eq!(h2.count(), 1);
        assert_eq!(h3.count(), 0);
    }

    #[tokio::test]
    async fn test_local_hook_shadows_fallback() {
        let local_validate = RecordingHook::passing();
        let primary_validate = RecordingHook::passing();
        let local = MethodTable::new().hook("validate", local_validate.clone());
        let primary = MethodTable::new().hook("validate", primary_validate.clone());

        HookChain::new(&local)
            .with_fallback(Some(&primary))
            .run(&names(&["validate"]), &detached_context("a", b"{}"))
            .await
            .unwrap();

        assert_eq!(local_validate.count(), 1);
        assert_eq!(primary_validate.count(), 0);
    }

    #[tokio::test]
    async fn test_fallback_used_when_local_missing() {
        let primary_auth = RecordingHook::passing();
        let local = MethodTable::new();
        let primary = MethodTable::new().hook("auth", primary_auth.clone());

        HookChain::new(&local)
            .with_fallback(Some(&primary))
            .run(&names(&["auth"]), &detached_context("a", b"{}"))
            .await
            .unwrap();

        assert_eq!(primary_auth.count(), 1);
    }

    #[tokio::test]
    async fn test_local_non_hook_falls_through_to_fallback() {
        let primary_auth = RecordingHook::passing();
        let local = MethodTable::new().handler("auth", |_ctx: Context| async {});
        let primary = MethodTable::new().hook("auth", primary_auth.clone());

        let chain = HookChain::new(&local).with_fallback(Some(&primary));
        assert!(chain.resolve("auth").is_ok());
    }

    #[tokio::test]
    async fn test_unresolved_hook_stops_chain() {
        let after = RecordingHook::passing();
        let table = MethodTable::new().hook("after", after.clone());

        let err = HookChain::new(&table)
            .run(&names(&["missing", "after"]), &detached_context("a", b"{}"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::HookUnresolved { source: ResolveError::Missing(_), .. }
        ));
        assert_eq!(after.count(), 0);
    }

    #[test]
    fn test_not_callable_preferred_over_missing() {
        let local = MethodTable::new();
        let primary = MethodTable::new().handler("validate", |_ctx: Context| async {});
        let err = HookChain::new(&local)
            .with_fallback(Some(&primary))
            .resolve("validate")
            .err()
            .unwrap();
        assert_eq!(
            err,
            ResolveError::NotCallable {
                name: "validate".into(),
                expected: MethodKind::Hook,
            }
        );
    }

    #[tokio::test]
    async fn test_faulting_hook() {
        let table = MethodTable::new().hook("boom", StaticHook::fault("exploded"));
        let err = HookChain::new(&table)
            .run(&names(&["boom"]), &detached_context("a", b"{}"))
            .await
            .unwrap_err();
        match err {
            DispatchError::HookFaulted { hook, source } => {
                assert_eq!(hook, "boom");
                assert_eq!(source.to_string(), "exploded");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hook_timeout_is_fault() {
        let slow = |_ctx: Context| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            true
        };
        let table = MethodTable::new().hook("slow", slow);
        let err = HookChain::new(&table)
            .with_timeout(Some(Duration::from_millis(10)))
            .run(&names(&["slow"]), &detached_context("a", b"{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::HookFaulted { .. }));
    }
}
