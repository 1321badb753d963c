use std::sync::{
    Arc,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};

use crate::{AdaptedValue, Adaptable, AdapterFactory, TypeDescriptor};

/// Value produced by [`MockAdapterFactory`].
#[derive(Clone, Debug, PartialEq)]
pub struct MockAdapter {
    /// Label of the factory that produced this adapter
    pub factory: String,
    pub adaptable_type: String,
    pub target_type: String,
}

/// Mock adapter factory for testing
#[derive(Debug)]
pub struct MockAdapterFactory {
    label: Option<String>,
    should_decline: AtomicBool,
    calls: AtomicUsize,
}

impl MockAdapterFactory {
    /// Factory that answers every lookup with a [`MockAdapter`] carrying `label`
    pub fn returning(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            should_decline: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Factory that is consulted but never adapts
    pub fn declining() -> Self {
        Self {
            label: None,
            should_decline: AtomicBool::new(true),
            calls: AtomicUsize::new(0),
        }
    }

    /// Set whether lookups should be declined
    pub fn set_should_decline(&self, should_decline: bool) {
        self.should_decline.store(should_decline, Ordering::SeqCst);
    }

    /// Number of times the manager invoked this factory
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AdapterFactory for MockAdapterFactory {
    fn get_adapter(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Option<AdaptedValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.should_decline.load(Ordering::SeqCst) {
            return None;
        }
        let label = self.label.as_ref()?;
        Some(Arc::new(MockAdapter {
            factory: label.clone(),
            adaptable_type: adaptable.type_descriptor().name().to_string(),
            target_type: target.name().to_string(),
        }))
    }
}
