use std::{any::Any, sync::Arc};

use parking_lot::Mutex;
use sling_mock_common::{
    AdaptedValue, Adaptable, ExecutionContext, RegistrationId, ServiceListener, TypeDescriptor,
    execution_context::{ADAPTER_FACTORY_SERVICE, ServiceProperties},
};
use tracing::{debug, info, warn};

use crate::{
    error::IsolationError,
    manager::{ADAPTER_MANAGER_SERVICE, MockAdapterManager},
};

#[derive(Debug, Default)]
struct HandleState {
    context: Option<ExecutionContext>,
    manager: Option<Arc<MockAdapterManager>>,
    registration: Option<RegistrationId>,
}

/// Adapter manager scoped to one test run.
///
/// Every test run creates its own handle and binds it to the execution
/// context it sets up. Clones share the bound manager, so a clone handed to a
/// worker thread sees the same registrations as the thread that created it.
/// A fresh handle never sees another handle's registrations.
#[derive(Clone, Debug, Default)]
pub struct AdapterManagerHandle {
    state: Arc<Mutex<HandleState>>,
}

impl AdapterManagerHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds a fresh adapter manager to `context`, replacing whatever was
    /// bound before.
    pub fn bind(&self, context: &ExecutionContext) -> Arc<MockAdapterManager> {
        let mut state = self.state.lock();
        Self::bind_locked(&mut state, context)
    }

    fn bind_locked(
        state: &mut HandleState,
        context: &ExecutionContext,
    ) -> Arc<MockAdapterManager> {
        Self::release(state);

        let manager = Arc::new(MockAdapterManager::new());
        let listener: Arc<dyn ServiceListener> = manager.clone();
        context.add_service_listener(ADAPTER_FACTORY_SERVICE, Arc::downgrade(&listener));
        for reference in context.service_references(ADAPTER_FACTORY_SERVICE) {
            manager.bind_adapter_factory(&reference);
        }
        manager.activate(context);

        let registration = context.register_service(
            ADAPTER_MANAGER_SERVICE,
            0,
            ServiceProperties::new(),
            manager.clone(),
        );
        info!(
            context = %context.id(),
            registration = %registration.id(),
            "Bound adapter manager"
        );

        state.context = Some(context.clone());
        state.manager = Some(manager.clone());
        state.registration = Some(registration.id());
        manager
    }

    /// Detaches the bound context. The next lookup falls back to a default
    /// context.
    pub fn unbind(&self) {
        let mut state = self.state.lock();
        Self::release(&mut state);
    }

    fn release(state: &mut HandleState) {
        if let Some(manager) = state.manager.take() {
            manager.deactivate();
        }
        let (Some(context), Some(registration)) =
            (state.context.take(), state.registration.take())
        else {
            return;
        };
        match context.unregister_service(registration) {
            Ok(_) => info!(context = %context.id(), "Unbound adapter manager"),
            Err(e) => debug!(
                context = %context.id(),
                error = %e,
                "Adapter manager service already gone"
            ),
        }
    }

    pub fn context(&self) -> Option<ExecutionContext> {
        self.state.lock().context.clone()
    }

    pub fn is_bound(&self) -> bool {
        self.state.lock().context.is_some()
    }

    /// Adapter manager registered in the bound context.
    ///
    /// Without a bound context a default one is created first. Lookups made
    /// before test setup therefore still work, but they run against a
    /// context nobody else can see.
    pub fn adapter_manager(&self) -> Result<Arc<MockAdapterManager>, IsolationError> {
        let context = {
            let mut state = self.state.lock();
            match state.context.clone() {
                Some(context) => context,
                None => {
                    let context = ExecutionContext::new();
                    warn!(
                        context = %context.id(),
                        "No execution context bound, using a default one"
                    );
                    Self::bind_locked(&mut state, &context);
                    context
                }
            }
        };

        context
            .get_service::<MockAdapterManager>(ADAPTER_MANAGER_SERVICE)
            .ok_or(IsolationError::AdapterManagerNotRegistered {
                context: context.id(),
            })
    }

    pub fn get_adapter(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Result<Option<AdaptedValue>, IsolationError> {
        Ok(self.adapter_manager()?.get_adapter(adaptable, target))
    }

    pub fn adapt<T: Any + Send + Sync>(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Result<Option<Arc<T>>, IsolationError> {
        Ok(self.adapter_manager()?.adapt::<T>(adaptable, target))
    }
}
