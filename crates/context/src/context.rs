use std::{
    any::Any,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use parking_lot::RwLock;
use sling_mock_adapter::AdapterManagerHandle;
use sling_mock_common::{
    AdaptedValue, Adaptable, AdapterFactory, ExecutionContext, RegistrationId, ServiceReference,
    TypeDescriptor,
    execution_context::ServiceProperties,
};
use tracing::info;

use crate::{
    error::ContextError,
    lifecycle::{ContextPlugins, LifecyclePhase},
    resolver_type::ResourceResolverType,
    resource::{InMemoryResourceStore, ResourceStore},
    settings::{MockSettingService, SETTINGS_SERVICE},
    unique_root::UniqueRoot,
};

/// Interface name the resource store is registered under.
pub const RESOURCE_RESOLVER_FACTORY_SERVICE: &str =
    "org.apache.sling.api.resource.ResourceResolverFactory";

/// State of one test run, between `set_up` and `tear_down`.
#[derive(Debug)]
struct RunState {
    context: ExecutionContext,
    resource_store: Option<Arc<InMemoryResourceStore>>,
    unique_root: Option<Arc<UniqueRoot>>,
    settings: Arc<MockSettingService>,
}

/// Test context for one test run.
///
/// Created through [`ContextBuilder`](crate::ContextBuilder). Each
/// [`set_up`](MockContext::set_up) starts from a fresh execution context
/// with its own adapter manager; [`tear_down`](MockContext::tear_down)
/// removes everything the run created.
#[derive(Debug)]
pub struct MockContext {
    plugins: ContextPlugins,
    resource_resolver_type: ResourceResolverType,
    resource_resolver_factory_activator_props: ServiceProperties,
    default_run_modes: Vec<String>,
    adapter_managers: AdapterManagerHandle,
    /// Claimed for the whole of `set_up`.
    setting_up: AtomicBool,
    state: RwLock<Option<RunState>>,
}

impl MockContext {
    pub(crate) fn new(
        plugins: ContextPlugins,
        resource_resolver_type: ResourceResolverType,
        resource_resolver_factory_activator_props: ServiceProperties,
        default_run_modes: Vec<String>,
    ) -> Self {
        Self {
            plugins,
            resource_resolver_type,
            resource_resolver_factory_activator_props,
            default_run_modes,
            adapter_managers: AdapterManagerHandle::new(),
            setting_up: AtomicBool::new(false),
            state: RwLock::new(None),
        }
    }

    pub fn set_up(&self) -> Result<(), ContextError> {
        if self
            .setting_up
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ContextError::InvalidState(
                "Context is already being set up".to_string(),
            ));
        }
        let result = self.set_up_claimed();
        self.setting_up.store(false, Ordering::Release);
        result
    }

    fn set_up_claimed(&self) -> Result<(), ContextError> {
        if self.is_set_up() {
            return Err(ContextError::InvalidState("Context is already set up".to_string()));
        }

        self.plugins.execute(LifecyclePhase::BeforeSetUp, self)?;

        let context = ExecutionContext::new();
        self.adapter_managers.bind(&context);

        let settings = Arc::new(MockSettingService::with_run_modes(
            self.default_run_modes.iter().cloned(),
        ));
        context.register_service(SETTINGS_SERVICE, 0, ServiceProperties::new(), settings.clone());

        let resource_store = self
            .resource_resolver_type
            .has_resource_store()
            .then(|| Arc::new(InMemoryResourceStore::new()));
        let unique_root = resource_store.as_ref().map(|store| {
            context.register_service(
                RESOURCE_RESOLVER_FACTORY_SERVICE,
                0,
                self.resource_resolver_factory_activator_props.clone(),
                store.clone(),
            );
            Arc::new(UniqueRoot::new(store.clone()))
        });

        *self.state.write() = Some(RunState {
            context: context.clone(),
            resource_store,
            unique_root,
            settings,
        });
        info!(
            context = %context.id(),
            resource_resolver_type = %self.resource_resolver_type,
            "Set up mock context"
        );

        self.plugins.execute(LifecyclePhase::AfterSetUp, self)
    }

    /// Tears the run down even if a before-tear-down callback fails; the
    /// first failure is returned afterwards.
    pub fn tear_down(&self) -> Result<(), ContextError> {
        if !self.is_set_up() {
            return Err(ContextError::InvalidState("Context is not set up".to_string()));
        }

        let before = self.plugins.execute(LifecyclePhase::BeforeTearDown, self);

        let Some(state) = self.state.write().take() else {
            return Err(ContextError::InvalidState("Context is not set up".to_string()));
        };
        if let Some(unique_root) = &state.unique_root {
            unique_root.clean_up();
        }
        self.adapter_managers.unbind();
        info!(context = %state.context.id(), "Tore down mock context");
        drop(state);

        let after = self.plugins.execute(LifecyclePhase::AfterTearDown, self);
        before.and(after)
    }

    pub fn is_set_up(&self) -> bool {
        self.state.read().is_some()
    }

    fn with_state<T>(&self, f: impl FnOnce(&RunState) -> T) -> Result<T, ContextError> {
        self.state
            .read()
            .as_ref()
            .map(f)
            .ok_or_else(|| ContextError::InvalidState("Context is not set up".to_string()))
    }

    pub fn execution_context(&self) -> Result<ExecutionContext, ContextError> {
        self.with_state(|state| state.context.clone())
    }

    pub fn adapter_managers(&self) -> &AdapterManagerHandle {
        &self.adapter_managers
    }

    pub fn resource_resolver_type(&self) -> ResourceResolverType {
        self.resource_resolver_type
    }

    pub fn resource_store(&self) -> Result<Arc<dyn ResourceStore>, ContextError> {
        let store = self.with_state(|state| state.resource_store.clone())?;
        match store {
            Some(store) => {
                let store: Arc<dyn ResourceStore> = store;
                Ok(store)
            }
            None => Err(ContextError::NoResourceStore(self.resource_resolver_type)),
        }
    }

    pub fn unique_root(&self) -> Result<Arc<UniqueRoot>, ContextError> {
        self.with_state(|state| state.unique_root.clone())?
            .ok_or(ContextError::NoResourceStore(self.resource_resolver_type))
    }

    pub fn settings(&self) -> Result<Arc<MockSettingService>, ContextError> {
        self.with_state(|state| state.settings.clone())
    }

    pub fn run_modes<I, S>(&self, run_modes: I) -> Result<(), ContextError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.settings()?.set_run_modes(run_modes);
        Ok(())
    }

    pub fn register_service<T: Any + Send + Sync>(
        &self,
        interface: &str,
        service: Arc<T>,
    ) -> Result<ServiceReference, ContextError> {
        Ok(self
            .execution_context()?
            .register_service(interface, 0, ServiceProperties::new(), service))
    }

    pub fn unregister_service(&self, id: RegistrationId) -> Result<ServiceReference, ContextError> {
        Ok(self.execution_context()?.unregister_service(id)?)
    }

    pub fn register_adapter_factory(
        &self,
        adaptables: &[&str],
        adapters: &[&str],
        factory: Arc<dyn AdapterFactory>,
    ) -> Result<ServiceReference, ContextError> {
        Ok(self
            .execution_context()?
            .register_adapter_factory(adaptables, adapters, 0, factory))
    }

    pub fn get_adapter(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Result<Option<AdaptedValue>, ContextError> {
        Ok(self.adapter_managers.get_adapter(adaptable, target)?)
    }

    pub fn adapt<T: Any + Send + Sync>(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Result<Option<Arc<T>>, ContextError> {
        Ok(self.adapter_managers.adapt::<T>(adaptable, target)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use parking_lot::Mutex;
    use sling_mock_adapter::ADAPTER_MANAGER_SERVICE;
    use sling_mock_common::{
        TypeRef,
        logging::init_test_tracing,
        testing::{MockAdapter, MockAdapterFactory, TestAdaptable},
    };

    use super::*;
    use crate::{ContextBuilder, ContextConfig, ContextPlugin};

    fn foo() -> TypeRef {
        TypeDescriptor::class("com.example.Foo").build()
    }

    fn bar() -> TypeRef {
        TypeDescriptor::class("com.example.Bar").build()
    }

    #[derive(Default)]
    struct RecordingPlugin {
        events: Mutex<Vec<String>>,
    }

    impl RecordingPlugin {
        fn record(&self, event: &str, context: &MockContext) {
            self.events
                .lock()
                .push(format!("{event}:{}", context.is_set_up()));
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().clone()
        }
    }

    impl ContextPlugin for RecordingPlugin {
        fn before_set_up(&self, context: &MockContext) -> anyhow::Result<()> {
            self.record("before_set_up", context);
            Ok(())
        }

        fn after_set_up(&self, context: &MockContext) -> anyhow::Result<()> {
            self.record("after_set_up", context);
            Ok(())
        }

        fn before_tear_down(&self, context: &MockContext) -> anyhow::Result<()> {
            self.record("before_tear_down", context);
            Ok(())
        }

        fn after_tear_down(&self, context: &MockContext) -> anyhow::Result<()> {
            self.record("after_tear_down", context);
            Ok(())
        }
    }

    #[test]
    fn test_lifecycle_runs_plugins_in_order() {
        init_test_tracing();
        let plugin = Arc::new(RecordingPlugin::default());
        let context = ContextBuilder::new().plugin(plugin.clone()).build();

        context.set_up().expect("set up");
        context.tear_down().expect("tear down");

        assert_eq!(
            plugin.events(),
            vec![
                "before_set_up:false",
                "after_set_up:true",
                "before_tear_down:true",
                "after_tear_down:false",
            ]
        );
    }

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let (first, second) = (order.clone(), order.clone());
        let context = ContextBuilder::new()
            .after_set_up(move |_| {
                first.lock().push("first");
                Ok(())
            })
            .after_set_up(move |_| {
                second.lock().push("second");
                Ok(())
            })
            .build();

        context.set_up().expect("set up");

        assert_eq!(*order.lock(), vec!["first", "second"]);
    }

    #[test]
    fn test_after_set_up_callback_can_use_context() {
        let context = ContextBuilder::new()
            .after_set_up(|context| {
                context.register_adapter_factory(
                    &["com.example.Foo"],
                    &["com.example.Bar"],
                    Arc::new(MockAdapterFactory::returning("callback")),
                )?;
                Ok(())
            })
            .build();

        context.set_up().expect("set up");

        let adapted = context
            .adapt::<MockAdapter>(&TestAdaptable::new(&foo()), &bar())
            .expect("adapter manager available")
            .expect("adapted");
        assert_eq!(adapted.factory, "callback");
    }

    #[test]
    fn test_failing_callback_surfaces_phase() {
        let context = ContextBuilder::new()
            .before_set_up(|_| anyhow::bail!("not today"))
            .build();

        let result = context.set_up();

        assert!(matches!(
            result,
            Err(ContextError::Callback {
                phase: LifecyclePhase::BeforeSetUp,
                ..
            })
        ));
        assert!(!context.is_set_up());
    }

    #[test]
    fn test_tear_down_completes_despite_failing_callback() {
        let context = ContextBuilder::new()
            .before_tear_down(|_| anyhow::bail!("cleanup hiccup"))
            .build();
        context.set_up().expect("set up");
        let execution_context = context.execution_context().expect("set up");

        let result = context.tear_down();

        assert!(matches!(
            result,
            Err(ContextError::Callback {
                phase: LifecyclePhase::BeforeTearDown,
                ..
            })
        ));
        assert!(!context.is_set_up());
        assert!(execution_context
            .service_references(ADAPTER_MANAGER_SERVICE)
            .is_empty());
    }

    #[test]
    fn test_lifecycle_misuse_is_invalid_state() {
        let context = ContextBuilder::new().build();

        assert!(matches!(context.tear_down(), Err(ContextError::InvalidState(_))));
        assert!(matches!(
            context.execution_context(),
            Err(ContextError::InvalidState(_))
        ));

        context.set_up().expect("set up");
        assert!(matches!(context.set_up(), Err(ContextError::InvalidState(_))));
    }

    #[test]
    fn test_each_run_gets_fresh_execution_context() {
        let context = ContextBuilder::new().build();
        context.set_up().expect("set up");
        let first = context.execution_context().expect("set up");
        context
            .register_adapter_factory(
                &["com.example.Foo"],
                &["com.example.Bar"],
                Arc::new(MockAdapterFactory::returning("first run")),
            )
            .expect("set up");
        context.tear_down().expect("tear down");

        context.set_up().expect("set up again");
        let second = context.execution_context().expect("set up");

        assert!(!first.is_same(&second));
        assert!(context
            .get_adapter(&TestAdaptable::new(&foo()), &bar())
            .expect("adapter manager available")
            .is_none());
    }

    #[test]
    fn test_services_registered_on_set_up() {
        let mut props = ServiceProperties::new();
        props.insert("resource.resolver.mapping".to_string(), "/-/".into());
        let context = ContextBuilder::new()
            .resource_resolver_factory_activator_props(props)
            .build();
        context.set_up().expect("set up");
        let execution_context = context.execution_context().expect("set up");

        assert!(execution_context
            .get_service::<MockSettingService>(SETTINGS_SERVICE)
            .is_some());
        assert_eq!(
            execution_context
                .service_references(ADAPTER_MANAGER_SERVICE)
                .len(),
            1
        );
        let factory = execution_context.service_references(RESOURCE_RESOLVER_FACTORY_SERVICE);
        assert_eq!(
            factory[0].property("resource.resolver.mapping"),
            Some(&"/-/".into())
        );
    }

    #[test]
    fn test_unique_root_cleaned_up_on_tear_down() {
        let context = ContextBuilder::new().build();
        context.set_up().expect("set up");
        let store = context.resource_store().expect("resource store");
        let content = context
            .unique_root()
            .expect("unique root")
            .content()
            .expect("content root");
        assert!(store.exists(&content));

        context.tear_down().expect("tear down");

        assert!(!store.exists(&content));
    }

    #[test]
    fn test_no_resource_store_for_none_type() {
        let context = ContextBuilder::new()
            .resource_resolver_type(ResourceResolverType::None)
            .build();
        context.set_up().expect("set up");

        assert!(matches!(
            context.resource_store(),
            Err(ContextError::NoResourceStore(ResourceResolverType::None))
        ));
        assert!(context.unique_root().is_err());
        context.tear_down().expect("tear down");
    }

    #[test]
    fn test_run_modes_from_config() {
        let config = ContextConfig {
            run_modes: vec!["author".to_string()],
            ..ContextConfig::default()
        };
        let context = ContextBuilder::from_config(&config).build();
        context.set_up().expect("set up");

        let settings = context.settings().expect("settings");
        assert_eq!(settings.run_modes(), BTreeSet::from(["author".to_string()]));

        context.run_modes(["publish"]).expect("set up");
        assert_eq!(settings.run_modes(), BTreeSet::from(["publish".to_string()]));
    }

    #[test]
    fn test_contexts_do_not_share_adapters() {
        let first = ContextBuilder::new().build();
        let second = ContextBuilder::new().build();
        first.set_up().expect("set up");
        second.set_up().expect("set up");

        first
            .register_adapter_factory(
                &["com.example.Foo"],
                &["com.example.Bar"],
                Arc::new(MockAdapterFactory::returning("first")),
            )
            .expect("set up");

        let adaptable = TestAdaptable::new(&foo());
        assert!(first
            .get_adapter(&adaptable, &bar())
            .expect("adapter manager available")
            .is_some());
        assert!(matches!(
            second.unregister_service(RegistrationId::new(0, 999)),
            Err(ContextError::Service(_))
        ));
        assert!(second
            .get_adapter(&adaptable, &bar())
            .expect("adapter manager available")
            .is_none());
    }

    #[test]
    fn test_concurrent_set_up_has_single_winner() {
        const THREADS: usize = 8;
        let context = ContextBuilder::new().build();
        let barrier = std::sync::Barrier::new(THREADS);

        let results: Vec<_> = std::thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        context.set_up()
                    })
                })
                .collect();
            workers
                .into_iter()
                .map(|worker| worker.join().expect("set up thread panicked"))
                .collect()
        });

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|result| result.as_ref().err())
            .all(|e| matches!(e, ContextError::InvalidState(_))));

        let execution_context = context.execution_context().expect("set up");
        assert_eq!(
            execution_context
                .service_references(ADAPTER_MANAGER_SERVICE)
                .len(),
            1
        );
        context
            .register_adapter_factory(
                &["com.example.Foo"],
                &["com.example.Bar"],
                Arc::new(MockAdapterFactory::returning("winner")),
            )
            .expect("set up");
        let adapter = context
            .adapt::<MockAdapter>(&TestAdaptable::new(&foo()), &bar())
            .expect("adapter manager available")
            .expect("adapter registered");
        assert_eq!(adapter.factory, "winner");

        context.tear_down().expect("tear down");
        assert!(execution_context
            .service_references(ADAPTER_MANAGER_SERVICE)
            .is_empty());
    }
}
