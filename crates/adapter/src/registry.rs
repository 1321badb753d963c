use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    sync::Arc,
};

use parking_lot::Mutex;
use sling_mock_common::{ExecutionContext, RegistrationId, TypeDescriptor};
use tracing::{debug, warn};

use crate::{
    cache::{FactoryMap, ResolutionCache},
    descriptor::{FactoryDescriptor, FactoryLocator},
};

/// Descriptors registered for one adaptable type, preferred registration first.
type DescriptorMap = BTreeMap<RegistrationId, Arc<FactoryDescriptor>>;

/// Adapter factory registrations indexed by adaptable type name.
///
/// The name → collection map and every per-type collection are locked
/// separately, so registrations for unrelated adaptable types only contend on
/// the short map lookup.
#[derive(Debug, Default)]
pub struct FactoryRegistry {
    descriptors: Mutex<HashMap<String, Arc<Mutex<DescriptorMap>>>>,
    cache: ResolutionCache,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one factory for every name in `adaptables`.
    ///
    /// Does nothing and returns `None` when either list is empty. When a
    /// context is given, the (adaptables, adapters) pairing is published on it
    /// as a capability record owned by the returned descriptor.
    pub fn register(
        &self,
        context: Option<&ExecutionContext>,
        id: RegistrationId,
        adaptables: &[String],
        adapters: &[String],
        locator: Box<dyn FactoryLocator>,
    ) -> Option<Arc<FactoryDescriptor>> {
        if adaptables.is_empty() || adapters.is_empty() {
            debug!(
                registration = %id,
                ?adaptables,
                ?adapters,
                "Ignoring adapter factory without adaptable or adapter types"
            );
            return None;
        }

        let descriptor = Arc::new(FactoryDescriptor::new(id, adapters.to_vec(), locator));

        for adaptable in adaptables {
            let entry = self.entry_for(adaptable);
            entry.lock().insert(id, descriptor.clone());
        }

        // force a rebuild on next lookup
        self.cache.clear();

        if let Some(context) = context {
            descriptor.set_adaption(context.publish_capability(adaptables, adapters));
        }
        debug!(
            registration = %id,
            ?adaptables,
            ?adapters,
            "Registered adapter factory"
        );

        Some(descriptor)
    }

    /// Removes the registration `id` from every adaptable type it was
    /// registered for. Returns whether anything was removed.
    pub fn unregister(&self, id: RegistrationId) -> bool {
        let entries: Vec<(String, Arc<Mutex<DescriptorMap>>)> = self
            .descriptors
            .lock()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.clone()))
            .collect();

        let mut removed_descriptor: Option<Arc<FactoryDescriptor>> = None;
        let mut removed_from = Vec::new();
        for (adaptable, entry) in entries {
            let Some(descriptor) = entry.lock().remove(&id) else {
                continue;
            };
            if let Some(previous) = &removed_descriptor {
                if !Arc::ptr_eq(previous, &descriptor) {
                    warn!(
                        registration = %id,
                        adaptable,
                        first = ?previous,
                        second = ?descriptor,
                        "Duplicate descriptors on unregister, capabilities may remain"
                    );
                }
            }
            removed_descriptor = Some(descriptor);
            removed_from.push(adaptable);
        }

        let Some(descriptor) = removed_descriptor else {
            return false;
        };

        self.cache.clear();

        if let Some(adaption) = descriptor.adaption() {
            adaption.unregister();
        }
        debug!(
            registration = %id,
            adaptables = ?removed_from,
            adapters = ?descriptor.adapters(),
            "Unregistered adapter factory"
        );
        true
    }

    /// Unregisters every registration. Returns how many were removed.
    pub fn unregister_all(&self) -> usize {
        let entries: Vec<Arc<Mutex<DescriptorMap>>> =
            self.descriptors.lock().values().cloned().collect();
        let ids: BTreeSet<RegistrationId> = entries
            .iter()
            .flat_map(|entry| entry.lock().keys().copied().collect::<Vec<_>>())
            .collect();
        ids.into_iter().filter(|id| self.unregister(*id)).count()
    }

    fn entry_for(&self, adaptable: &str) -> Arc<Mutex<DescriptorMap>> {
        self.descriptors
            .lock()
            .entry(adaptable.to_string())
            .or_default()
            .clone()
    }

    /// Descriptors registered directly for `adaptable`, preferred first.
    pub fn direct_factories(&self, adaptable: &str) -> Vec<Arc<FactoryDescriptor>> {
        let entry = self.descriptors.lock().get(adaptable).cloned();
        match entry {
            Some(entry) => entry.lock().values().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub fn registered_ids(&self, adaptable: &str) -> Vec<RegistrationId> {
        self.direct_factories(adaptable)
            .iter()
            .map(|descriptor| descriptor.id())
            .collect()
    }

    pub fn is_registered(&self, id: RegistrationId) -> bool {
        let entries: Vec<Arc<Mutex<DescriptorMap>>> =
            self.descriptors.lock().values().cloned().collect();
        entries.iter().any(|entry| entry.lock().contains_key(&id))
    }

    /// Every adaptable type name that ever had a registration.
    pub fn adaptable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.descriptors.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn resolve(&self, adaptable_type: &TypeDescriptor) -> Arc<FactoryMap> {
        self.cache.resolve(adaptable_type, self)
    }

    pub fn cache(&self) -> &ResolutionCache {
        &self.cache
    }
}
