use std::{any::Any, sync::Arc};

use parking_lot::{Mutex, RwLock};
use sling_mock_common::{
    AdaptedValue, Adaptable, ExecutionContext, RegistrationId, ServiceListener, ServiceReference,
    TypeDescriptor,
    execution_context::{ADAPTABLE_CLASSES, ADAPTER_CLASSES},
};
use tracing::{debug, info};

use crate::{
    descriptor::{FactoryLocator, ServiceFactoryLocator},
    registry::FactoryRegistry,
};

/// Interface name the adapter manager is registered under in its context.
pub const ADAPTER_MANAGER_SERVICE: &str = "org.apache.sling.api.adapter.AdapterManager";

/// Adapter manager backed by a [`FactoryRegistry`].
///
/// Adapter factory services bound before [`activate`](Self::activate) are
/// queued and registered once the manager has a context to publish
/// capabilities on.
#[derive(Debug, Default)]
pub struct MockAdapterManager {
    context: RwLock<Option<ExecutionContext>>,
    bound_adapter_factories: Mutex<Vec<ServiceReference>>,
    /// Held from the duplicate check until the registry insert is done.
    binding: Mutex<()>,
    registry: FactoryRegistry,
}

impl MockAdapterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the adapted `adaptable`, or `None` if no registered factory
    /// could adapt it to `target`.
    pub fn get_adapter(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Option<AdaptedValue> {
        let adaptable_type = adaptable.type_descriptor();
        let factories = self.registry.resolve(&adaptable_type);

        if let Some(candidates) = factories.get(target.name()) {
            for descriptor in candidates {
                let Some(factory) = descriptor.factory() else {
                    debug!(
                        factory = %descriptor.id(),
                        adaptable = %adaptable_type,
                        "Adapter factory not available, skipping"
                    );
                    continue;
                };

                debug!(
                    factory = %descriptor.id(),
                    adaptable = %adaptable_type,
                    target = %target,
                    "Trying adapter factory"
                );
                if let Some(adapted) = factory.get_adapter(adaptable, target) {
                    debug!(
                        factory = %descriptor.id(),
                        adaptable = %adaptable_type,
                        target = %target,
                        "Using adapter factory"
                    );
                    return Some(adapted);
                }
            }
        }

        debug!(
            adaptable = %adaptable_type,
            target = %target,
            "No adapter factory found"
        );
        None
    }

    /// Typed variant of [`get_adapter`](Self::get_adapter). An adapter of a
    /// different concrete type than `T` counts as no adapter.
    pub fn adapt<T: Any + Send + Sync>(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Option<Arc<T>> {
        self.get_adapter(adaptable, target)?.downcast::<T>().ok()
    }

    /// Attaches the context and registers every factory bound so far.
    pub fn activate(&self, context: &ExecutionContext) {
        let _binding = self.binding.lock();
        let pending = {
            let mut bound = self.bound_adapter_factories.lock();
            *self.context.write() = Some(context.clone());
            std::mem::take(&mut *bound)
        };
        info!(
            context = %context.id(),
            pending = pending.len(),
            "Activating adapter manager"
        );

        for reference in &pending {
            self.register_adapter_factory(context, reference);
        }
    }

    /// Detaches the context. Every factory is unbound along with it, which
    /// releases the capabilities published on the context.
    pub fn deactivate(&self) {
        let _binding = self.binding.lock();
        let context = {
            let mut bound = self.bound_adapter_factories.lock();
            bound.clear();
            self.context.write().take()
        };
        let released = self.registry.unregister_all();
        if let Some(context) = context {
            info!(
                context = %context.id(),
                released,
                "Deactivated adapter manager"
            );
        }
    }

    pub fn is_active(&self) -> bool {
        self.context.read().is_some()
    }

    pub fn context(&self) -> Option<ExecutionContext> {
        self.context.read().clone()
    }

    /// Registers the factory behind `reference`, or queues it while the
    /// manager is inactive. A reference that is already queued or registered
    /// is ignored.
    pub fn bind_adapter_factory(&self, reference: &ServiceReference) {
        let _binding = self.binding.lock();
        let context = {
            let mut bound = self.bound_adapter_factories.lock();
            let id = reference.id();
            if bound.iter().any(|r| r.id() == id) || self.registry.is_registered(id) {
                debug!(registration = %id, "Adapter factory already bound");
                return;
            }
            match self.context.read().clone() {
                Some(context) => context,
                None => {
                    bound.push(reference.clone());
                    return;
                }
            }
        };
        self.register_adapter_factory(&context, reference);
    }

    pub fn unbind_adapter_factory(&self, id: RegistrationId) -> bool {
        let _binding = self.binding.lock();
        let was_pending = {
            let mut bound = self.bound_adapter_factories.lock();
            let before = bound.len();
            bound.retain(|r| r.id() != id);
            bound.len() != before
        };
        self.registry.unregister(id) || was_pending
    }

    fn register_adapter_factory(&self, context: &ExecutionContext, reference: &ServiceReference) {
        let adaptables = reference.string_list(ADAPTABLE_CLASSES);
        let adapters = reference.string_list(ADAPTER_CLASSES);
        let locator: Box<dyn FactoryLocator> =
            Box::new(ServiceFactoryLocator::new(context, reference.id()));
        self.registry.register(
            Some(context),
            reference.id(),
            &adaptables,
            &adapters,
            locator,
        );
    }

    pub fn registry(&self) -> &FactoryRegistry {
        &self.registry
    }
}

impl ServiceListener for MockAdapterManager {
    fn service_registered(&self, reference: &ServiceReference) {
        self.bind_adapter_factory(reference);
    }

    fn service_unregistered(&self, reference: &ServiceReference) {
        self.unbind_adapter_factory(reference.id());
    }
}
