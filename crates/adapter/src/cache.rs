use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use sling_mock_common::TypeDescriptor;
use tracing::trace;

use crate::{descriptor::FactoryDescriptor, registry::FactoryRegistry};

/// Candidate factories for one adaptable type, indexed by target type name.
pub type FactoryMap = HashMap<String, Vec<Arc<FactoryDescriptor>>>;

/// Memoized [`FactoryMap`] per concrete adaptable type name.
///
/// Entries are built on demand from the registry and dropped wholesale by
/// [`ResolutionCache::clear`] whenever the registry changes. A map computed
/// concurrently with a `clear` is handed to its caller but not kept.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<String, Arc<FactoryMap>>,
    generation: AtomicU64,
}

impl ResolutionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &self,
        adaptable_type: &TypeDescriptor,
        registry: &FactoryRegistry,
    ) -> Arc<FactoryMap> {
        if let Some(entry) = self.entries.get(adaptable_type.name()) {
            return entry.value().clone();
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let factories = Arc::new(self.create_factory_map(adaptable_type, registry));
        self.entries
            .insert(adaptable_type.name().to_string(), factories.clone());
        if self.generation.load(Ordering::SeqCst) != generation {
            self.entries.remove(adaptable_type.name());
        }
        factories
    }

    /// Direct registrations first, then everything inherited through the
    /// interfaces in declaration order, then through the superclass.
    fn create_factory_map(
        &self,
        adaptable_type: &TypeDescriptor,
        registry: &FactoryRegistry,
    ) -> FactoryMap {
        let mut factories = FactoryMap::new();

        for descriptor in registry.direct_factories(adaptable_type.name()) {
            for adapter in descriptor.adapters() {
                factories
                    .entry(adapter.clone())
                    .or_default()
                    .push(descriptor.clone());
            }
        }

        for interface in adaptable_type.interfaces() {
            self.copy_inherited(&mut factories, interface, registry);
        }

        if let Some(superclass) = adaptable_type.superclass() {
            self.copy_inherited(&mut factories, superclass, registry);
        }

        trace!(
            adaptable = adaptable_type.name(),
            targets = factories.len(),
            "Built adapter factory map"
        );
        factories
    }

    /// Target types already present in `dest` are left untouched.
    fn copy_inherited(
        &self,
        dest: &mut FactoryMap,
        supertype: &TypeDescriptor,
        registry: &FactoryRegistry,
    ) {
        let inherited = self.resolve(supertype, registry);
        for (target, descriptors) in inherited.iter() {
            dest.entry(target.clone())
                .or_insert_with(|| descriptors.clone());
        }
    }

    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.clear();
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use sling_mock_common::{
        AdapterFactory, RegistrationId, TypeRef, ROOT_TYPE_NAME, testing::MockAdapterFactory,
    };

    use super::*;

    const BAR: &str = "com.example.Bar";

    struct Hierarchy {
        marker: TypeRef,
        base: TypeRef,
        child: TypeRef,
    }

    fn hierarchy() -> Hierarchy {
        let marker = TypeDescriptor::interface("com.example.Marker").build();
        let base = TypeDescriptor::class("com.example.Base").build();
        let child = TypeDescriptor::class("com.example.Child")
            .implements(&marker)
            .extends(&base)
            .build();
        Hierarchy {
            marker,
            base,
            child,
        }
    }

    fn register(
        registry: &FactoryRegistry,
        service_id: u64,
        adaptable: &str,
        adapter: &str,
    ) -> RegistrationId {
        let id = RegistrationId::new(0, service_id);
        let factory: Arc<dyn AdapterFactory> = Arc::new(MockAdapterFactory::returning(adaptable));
        registry.register(
            None,
            id,
            &[adaptable.to_string()],
            &[adapter.to_string()],
            Box::new(factory),
        );
        id
    }

    fn ids_for(factories: &FactoryMap, target: &str) -> Vec<RegistrationId> {
        factories
            .get(target)
            .map(|descriptors| descriptors.iter().map(|d| d.id()).collect())
            .unwrap_or_default()
    }

    fn snapshot(factories: &FactoryMap) -> BTreeMap<String, Vec<RegistrationId>> {
        factories
            .keys()
            .map(|target| (target.clone(), ids_for(factories, target)))
            .collect()
    }

    #[test]
    fn test_direct_registration_wins_over_inherited() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let direct = register(&registry, 1, types.child.name(), BAR);
        register(&registry, 2, types.marker.name(), BAR);
        register(&registry, 3, types.base.name(), BAR);

        let factories = registry.resolve(&types.child);

        assert_eq!(ids_for(&factories, BAR), vec![direct]);
    }

    #[test]
    fn test_interface_wins_over_superclass() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let via_interface = register(&registry, 1, types.marker.name(), BAR);
        register(&registry, 2, types.base.name(), BAR);

        let factories = registry.resolve(&types.child);

        assert_eq!(ids_for(&factories, BAR), vec![via_interface]);
    }

    #[test]
    fn test_superclass_used_when_nothing_closer() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let via_superclass = register(&registry, 1, types.base.name(), BAR);
        let other_target = register(&registry, 2, types.marker.name(), "com.example.Other");

        let factories = registry.resolve(&types.child);

        assert_eq!(ids_for(&factories, BAR), vec![via_superclass]);
        assert_eq!(ids_for(&factories, "com.example.Other"), vec![other_target]);
    }

    #[test]
    fn test_root_registration_applies_to_every_class() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let via_root = register(&registry, 1, ROOT_TYPE_NAME, BAR);

        assert_eq!(ids_for(&registry.resolve(&types.child), BAR), vec![via_root]);
        // Interfaces have no superclass, so the root does not apply to them.
        assert!(ids_for(&registry.resolve(&types.marker), BAR).is_empty());
    }

    #[test]
    fn test_resolve_memoizes_supertypes() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        register(&registry, 1, types.base.name(), BAR);

        let first = registry.resolve(&types.child);
        let cache = registry.cache();
        assert!(cache.contains(types.child.name()));
        assert!(cache.contains(types.marker.name()));
        assert!(cache.contains(types.base.name()));
        assert!(cache.contains(ROOT_TYPE_NAME));

        let second = registry.resolve(&types.child);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_mutations_clear_cache() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let id = register(&registry, 1, types.base.name(), BAR);
        registry.resolve(&types.child);
        assert!(!registry.cache().is_empty());

        register(&registry, 2, types.marker.name(), BAR);
        assert!(registry.cache().is_empty());

        registry.resolve(&types.child);
        assert!(registry.unregister(id));
        assert!(registry.cache().is_empty());
    }

    #[test]
    fn test_cache_matches_fresh_computation_after_mutations() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let targets = [BAR, "com.example.Other"];
        let owners = [&types.child, &types.marker, &types.base];
        let mut registered = Vec::new();

        for step in 0..12u64 {
            let owner = owners[(step % 3) as usize];
            let target = targets[(step % 2) as usize];
            registered.push(register(&registry, step + 1, owner.name(), target));
            if step % 4 == 3 {
                let removed = registered.remove(0);
                assert!(registry.unregister(removed));
            }

            let cached = registry.resolve(&types.child);
            let fresh = ResolutionCache::new().resolve(&types.child, &registry);
            assert_eq!(snapshot(&cached), snapshot(&fresh), "diverged at step {step}");
        }
    }

    #[test]
    fn test_direct_candidates_keep_registration_order() {
        let types = hierarchy();
        let registry = FactoryRegistry::new();
        let late = register(&registry, 7, types.child.name(), BAR);
        let early = register(&registry, 3, types.child.name(), BAR);

        let factories = registry.resolve(&types.child);

        assert_eq!(ids_for(&factories, BAR), vec![early, late]);
    }
}
