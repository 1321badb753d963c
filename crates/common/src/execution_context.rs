//! Per-test-run service registry.
//!
//! An [`ExecutionContext`] plays the role of the bundle context a test run
//! operates under: it hands out service ids, stores registered services and
//! their properties, notifies listeners about registrations, and keeps the
//! adaption capability records published by the adapter manager.

use std::{
    any::Any,
    cmp::Ordering,
    collections::BTreeMap,
    fmt::{self, Display},
    sync::{
        Arc, Weak,
        atomic::{self, AtomicBool, AtomicU64},
    },
};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::{adaptable::AdapterFactory, error::ServiceError};

/// Interface name adapter factory services are registered under.
pub const ADAPTER_FACTORY_SERVICE: &str = "org.apache.sling.api.adapter.AdapterFactory";
/// Service property listing the adaptable type names of a factory.
pub const ADAPTABLE_CLASSES: &str = "adaptables";
/// Service property listing the adapter (target) type names of a factory.
pub const ADAPTER_CLASSES: &str = "adapters";

pub type ServiceObject = Arc<dyn Any + Send + Sync>;
pub type ServiceProperties = serde_json::Map<String, Value>;

/// Identity of a service registration.
///
/// Ordering puts higher rankings first and, for equal rankings, earlier
/// registrations (lower service ids) first. The first element in this order
/// is the preferred service.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationId {
    ranking: i32,
    service_id: u64,
}

impl RegistrationId {
    pub fn new(ranking: i32, service_id: u64) -> Self {
        Self {
            ranking,
            service_id,
        }
    }

    pub fn ranking(&self) -> i32 {
        self.ranking
    }

    pub fn service_id(&self) -> u64 {
        self.service_id
    }
}

impl Ord for RegistrationId {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .ranking
            .cmp(&self.ranking)
            .then_with(|| self.service_id.cmp(&other.service_id))
    }
}

impl PartialOrd for RegistrationId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "service#{} (ranking {})", self.service_id, self.ranking)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceReference {
    id: RegistrationId,
    interface: String,
    properties: ServiceProperties,
}

impl ServiceReference {
    pub fn id(&self) -> RegistrationId {
        self.id
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn properties(&self) -> &ServiceProperties {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Reads a property as a list of strings. A single string becomes a
    /// one-element list; non-string array members are skipped.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.properties.get(key) {
            Some(Value::String(value)) => vec![value.clone()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Receives registration events for one service interface.
pub trait ServiceListener: Send + Sync {
    fn service_registered(&self, reference: &ServiceReference);
    fn service_unregistered(&self, reference: &ServiceReference);
}

/// The (adaptables, adapters) pairing advertised for one adapter factory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityRecord {
    pub adaptables: Vec<String>,
    pub adapters: Vec<String>,
}

/// Handle to a published [`CapabilityRecord`].
#[derive(Debug)]
pub struct CapabilityRegistration {
    id: u64,
    record: CapabilityRecord,
    context: Weak<ContextInner>,
    released: AtomicBool,
}

impl CapabilityRegistration {
    pub fn record(&self) -> &CapabilityRecord {
        &self.record
    }

    /// Removes the record from its context. Only the first call has an
    /// effect; returns whether this call removed the record.
    pub fn unregister(&self) -> bool {
        if self.released.swap(true, atomic::Ordering::SeqCst) {
            return false;
        }
        match self.context.upgrade() {
            Some(inner) => inner.capabilities.lock().remove(&self.id).is_some(),
            None => false,
        }
    }

    pub fn is_unregistered(&self) -> bool {
        self.released.load(atomic::Ordering::SeqCst)
    }
}

struct ServiceEntry {
    reference: ServiceReference,
    service: ServiceObject,
}

struct ListenerEntry {
    interface: String,
    listener: Weak<dyn ServiceListener>,
}

struct ContextInner {
    id: Uuid,
    next_service_id: AtomicU64,
    next_capability_id: AtomicU64,
    services: RwLock<BTreeMap<RegistrationId, ServiceEntry>>,
    listeners: Mutex<Vec<ListenerEntry>>,
    capabilities: Mutex<BTreeMap<u64, CapabilityRecord>>,
}

#[derive(Clone)]
pub struct ExecutionContext {
    inner: Arc<ContextInner>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        let id = Uuid::new_v4();
        debug!(context = %id, "Created execution context");
        Self {
            inner: Arc::new(ContextInner {
                id,
                next_service_id: AtomicU64::new(1),
                next_capability_id: AtomicU64::new(1),
                services: RwLock::new(BTreeMap::new()),
                listeners: Mutex::new(Vec::new()),
                capabilities: Mutex::new(BTreeMap::new()),
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn downgrade(&self) -> WeakExecutionContext {
        WeakExecutionContext {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_same(&self, other: &ExecutionContext) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn register_service<T: Any + Send + Sync>(
        &self,
        interface: &str,
        ranking: i32,
        properties: ServiceProperties,
        service: Arc<T>,
    ) -> ServiceReference {
        self.register_service_object(interface, ranking, properties, service)
    }

    pub fn register_service_object(
        &self,
        interface: &str,
        ranking: i32,
        properties: ServiceProperties,
        service: ServiceObject,
    ) -> ServiceReference {
        let service_id = self
            .inner
            .next_service_id
            .fetch_add(1, atomic::Ordering::SeqCst);
        let reference = ServiceReference {
            id: RegistrationId::new(ranking, service_id),
            interface: interface.to_string(),
            properties,
        };
        self.inner.services.write().insert(
            reference.id,
            ServiceEntry {
                reference: reference.clone(),
                service,
            },
        );
        debug!(
            context = %self.inner.id,
            service = %reference.id,
            interface,
            "Registered service"
        );

        for listener in self.listeners_for(interface) {
            listener.service_registered(&reference);
        }
        reference
    }

    /// Registers `factory` as an adapter factory service with the
    /// adaptable/adapter type names as service properties.
    pub fn register_adapter_factory(
        &self,
        adaptables: &[&str],
        adapters: &[&str],
        ranking: i32,
        factory: Arc<dyn AdapterFactory>,
    ) -> ServiceReference {
        let mut properties = ServiceProperties::new();
        properties.insert(ADAPTABLE_CLASSES.to_string(), Value::from(adaptables.to_vec()));
        properties.insert(ADAPTER_CLASSES.to_string(), Value::from(adapters.to_vec()));
        self.register_service(ADAPTER_FACTORY_SERVICE, ranking, properties, Arc::new(factory))
    }

    pub fn unregister_service(&self, id: RegistrationId) -> Result<ServiceReference, ServiceError> {
        let entry = self
            .inner
            .services
            .write()
            .remove(&id)
            .ok_or(ServiceError::ServiceNotFound(id))?;
        debug!(
            context = %self.inner.id,
            service = %id,
            interface = entry.reference.interface,
            "Unregistered service"
        );

        for listener in self.listeners_for(&entry.reference.interface) {
            listener.service_unregistered(&entry.reference);
        }
        Ok(entry.reference)
    }

    /// References registered under `interface`, preferred service first.
    pub fn service_references(&self, interface: &str) -> Vec<ServiceReference> {
        self.inner
            .services
            .read()
            .values()
            .filter(|entry| entry.reference.interface == interface)
            .map(|entry| entry.reference.clone())
            .collect()
    }

    pub fn locate_service(&self, id: RegistrationId) -> Option<ServiceObject> {
        self.inner
            .services
            .read()
            .get(&id)
            .map(|entry| entry.service.clone())
    }

    /// Preferred service registered under `interface` whose concrete type is `T`.
    pub fn get_service<T: Any + Send + Sync>(&self, interface: &str) -> Option<Arc<T>> {
        self.inner
            .services
            .read()
            .values()
            .filter(|entry| entry.reference.interface == interface)
            .find_map(|entry| entry.service.clone().downcast::<T>().ok())
    }

    pub fn locate_adapter_factory(&self, id: RegistrationId) -> Option<Arc<dyn AdapterFactory>> {
        let service = self.locate_service(id)?;
        service
            .downcast::<Arc<dyn AdapterFactory>>()
            .ok()
            .map(|factory| (*factory).clone())
    }

    /// Listeners are held weakly and dropped once their owner is gone.
    pub fn add_service_listener(&self, interface: &str, listener: Weak<dyn ServiceListener>) {
        self.inner.listeners.lock().push(ListenerEntry {
            interface: interface.to_string(),
            listener,
        });
    }

    fn listeners_for(&self, interface: &str) -> Vec<Arc<dyn ServiceListener>> {
        let mut listeners = self.inner.listeners.lock();
        listeners.retain(|entry| entry.listener.strong_count() > 0);
        listeners
            .iter()
            .filter(|entry| entry.interface == interface)
            .filter_map(|entry| entry.listener.upgrade())
            .collect()
    }

    pub fn publish_capability(
        &self,
        adaptables: &[String],
        adapters: &[String],
    ) -> CapabilityRegistration {
        let id = self
            .inner
            .next_capability_id
            .fetch_add(1, atomic::Ordering::SeqCst);
        let record = CapabilityRecord {
            adaptables: adaptables.to_vec(),
            adapters: adapters.to_vec(),
        };
        self.inner.capabilities.lock().insert(id, record.clone());
        debug!(
            context = %self.inner.id,
            adaptables = ?record.adaptables,
            adapters = ?record.adapters,
            "Published adaption capability"
        );
        CapabilityRegistration {
            id,
            record,
            context: Arc::downgrade(&self.inner),
            released: AtomicBool::new(false),
        }
    }

    pub fn capabilities(&self) -> Vec<CapabilityRecord> {
        self.inner.capabilities.lock().values().cloned().collect()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("id", &self.inner.id)
            .field("services", &self.inner.services.read().len())
            .finish()
    }
}

/// Non-owning handle to an [`ExecutionContext`].
#[derive(Clone, Debug)]
pub struct WeakExecutionContext {
    inner: Weak<ContextInner>,
}

impl WeakExecutionContext {
    pub fn upgrade(&self) -> Option<ExecutionContext> {
        self.inner.upgrade().map(|inner| ExecutionContext { inner })
    }
}
