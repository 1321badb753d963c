use std::{
    fmt,
    sync::{Arc, OnceLock},
};

use sling_mock_common::{
    AdapterFactory, CapabilityRegistration, ExecutionContext, RegistrationId, WeakExecutionContext,
};

/// Produces the factory behind a registration on demand.
pub trait FactoryLocator: Send + Sync {
    fn locate(&self) -> Option<Arc<dyn AdapterFactory>>;
}

impl FactoryLocator for Arc<dyn AdapterFactory> {
    fn locate(&self) -> Option<Arc<dyn AdapterFactory>> {
        Some(self.clone())
    }
}

/// Looks the factory up in the service registry of the context it was
/// registered in. Yields nothing once the service or the context is gone.
#[derive(Clone, Debug)]
pub struct ServiceFactoryLocator {
    context: WeakExecutionContext,
    id: RegistrationId,
}

impl ServiceFactoryLocator {
    pub fn new(context: &ExecutionContext, id: RegistrationId) -> Self {
        Self {
            context: context.downgrade(),
            id,
        }
    }
}

impl FactoryLocator for ServiceFactoryLocator {
    fn locate(&self) -> Option<Arc<dyn AdapterFactory>> {
        self.context.upgrade()?.locate_adapter_factory(self.id)
    }
}

/// Registry record for one adapter factory.
///
/// A single descriptor is shared by every adaptable type the factory was
/// registered for. The factory itself is located on first use and kept for
/// the lifetime of the registration; a failed lookup is retried next time.
pub struct FactoryDescriptor {
    id: RegistrationId,
    adapters: Vec<String>,
    locator: Box<dyn FactoryLocator>,
    factory: OnceLock<Arc<dyn AdapterFactory>>,
    adaption: OnceLock<CapabilityRegistration>,
}

impl FactoryDescriptor {
    pub fn new(
        id: RegistrationId,
        adapters: Vec<String>,
        locator: Box<dyn FactoryLocator>,
    ) -> Self {
        Self {
            id,
            adapters,
            locator,
            factory: OnceLock::new(),
            adaption: OnceLock::new(),
        }
    }

    pub fn id(&self) -> RegistrationId {
        self.id
    }

    /// Target type names this factory adapts to.
    pub fn adapters(&self) -> &[String] {
        &self.adapters
    }

    pub fn factory(&self) -> Option<Arc<dyn AdapterFactory>> {
        if let Some(factory) = self.factory.get() {
            return Some(factory.clone());
        }
        let located = self.locator.locate()?;
        Some(self.factory.get_or_init(|| located).clone())
    }

    pub fn is_resolved(&self) -> bool {
        self.factory.get().is_some()
    }

    pub(crate) fn set_adaption(&self, registration: CapabilityRegistration) {
        if let Err(duplicate) = self.adaption.set(registration) {
            duplicate.unregister();
        }
    }

    pub fn adaption(&self) -> Option<&CapabilityRegistration> {
        self.adaption.get()
    }
}

impl fmt::Debug for FactoryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FactoryDescriptor")
            .field("id", &self.id)
            .field("adapters", &self.adapters)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}
