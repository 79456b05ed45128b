//! Subject registry.
//!
//! Maps each subject to exactly one [`Binding`]. Registering a subject again
//! replaces the earlier binding in place, so iteration order is the order in
//! which subjects were first seen.

use hookline_core::{BindingConfig, RegistryError, ServiceRef};
use std::collections::HashMap;
use std::sync::Arc;

/// A subject bound to a handler on a service.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Subject to subscribe to.
    pub subject: String,
    /// Owning service.
    pub owner: ServiceRef,
    /// Handler method name on the owner.
    pub handler: String,
    /// Hooks, quota, options and metadata.
    pub config: BindingConfig,
}

/// Table of bindings keyed by subject.
#[derive(Debug, Clone, Default)]
pub struct SubjectRegistry {
    bindings: Vec<Arc<Binding>>,
    index: HashMap<String, usize>,
}

impl SubjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the binding for `subject`, replacing any earlier one.
    ///
    /// Returns the replaced binding.
    pub fn register(
        &mut self,
        subject: impl Into<String>,
        config: BindingConfig,
        owner: ServiceRef,
        handler: impl Into<String>,
    ) -> Result<Option<Arc<Binding>>, RegistryError> {
        let subject = subject.into();
        let handler = handler.into();
        if subject.trim().is_empty() {
            return Err(RegistryError::EmptySubject);
        }
        if handler.trim().is_empty() {
            return Err(RegistryError::EmptyHandler(subject));
        }

        let binding = Arc::new(Binding {
            subject: subject.clone(),
            owner,
            handler,
            config,
        });

        match self.index.get(&subject) {
            Some(&slot) => Ok(Some(std::mem::replace(&mut self.bindings[slot], binding))),
            None => {
                self.index.insert(subject, self.bindings.len());
                self.bindings.push(binding);
                Ok(None)
            }
        }
    }

    /// Get the binding for `subject`.
    pub fn get(&self, subject: &str) -> Option<&Arc<Binding>> {
        self.index.get(subject).map(|&slot| &self.bindings[slot])
    }

    /// Iterate over bindings in first-registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Binding>> {
        self.bindings.iter()
    }

    /// Number of bound subjects.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether nothing is bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let mut registry = SubjectRegistry::new();
        registry
            .register("orders.create", BindingConfig::new(), ServiceRef::Primary, "create")
            .unwrap();
        let binding = registry.get("orders.create").unwrap();
        assert_eq!(binding.handler, "create");
        assert_eq!(binding.owner, ServiceRef::Primary);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = SubjectRegistry::new();
        registry
            .register("a", BindingConfig::new(), ServiceRef::Primary, "first")
            .unwrap();
        registry
            .register("b", BindingConfig::new(), ServiceRef::Primary, "other")
            .unwrap();
        let replaced = registry
            .register("a", BindingConfig::new(), ServiceRef::sub("billing"), "second")
            .unwrap();

        assert_eq!(replaced.unwrap().handler, "first");
        assert_eq!(registry.len(), 2);
        let subjects: Vec<_> = registry.iter().map(|b| b.handler.as_str()).collect();
        assert_eq!(subjects, vec!["second", "other"]);
        assert_eq!(registry.get("a").unwrap().owner, ServiceRef::sub("billing"));
    }

    #[test]
    fn test_empty_subject_rejected() {
        let mut registry = SubjectRegistry::new();
        let err = registry
            .register("  ", BindingConfig::new(), ServiceRef::Primary, "create")
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptySubject);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_empty_handler_rejected() {
        let mut registry = SubjectRegistry::new();
        let err = registry
            .register("a", BindingConfig::new(), ServiceRef::Primary, "")
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyHandler("a".into()));
    }
}
