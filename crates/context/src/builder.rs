use std::sync::Arc;

use sling_mock_common::execution_context::ServiceProperties;

use crate::{
    config::ContextConfig,
    context::MockContext,
    lifecycle::{ContextPlugin, ContextPlugins, LifecyclePhase},
    resolver_type::ResourceResolverType,
};

/// Builds a [`MockContext`].
#[derive(Debug, Default)]
pub struct ContextBuilder {
    plugins: ContextPlugins,
    resource_resolver_type: ResourceResolverType,
    resource_resolver_factory_activator_props: ServiceProperties,
    run_modes: Vec<String>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new()
            .resource_resolver_type(config.resource_resolver_type)
            .run_modes(config.run_modes.iter().cloned())
            .resource_resolver_factory_activator_props(
                config.resource_resolver_factory_activator_props.clone(),
            )
    }

    pub fn resource_resolver_type(mut self, resource_resolver_type: ResourceResolverType) -> Self {
        self.resource_resolver_type = resource_resolver_type;
        self
    }

    pub fn plugin(mut self, plugin: Arc<dyn ContextPlugin>) -> Self {
        self.plugins.add_plugin(plugin);
        self
    }

    pub fn before_set_up<F>(self, callback: F) -> Self
    where
        F: Fn(&MockContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback(LifecyclePhase::BeforeSetUp, callback)
    }

    pub fn after_set_up<F>(self, callback: F) -> Self
    where
        F: Fn(&MockContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback(LifecyclePhase::AfterSetUp, callback)
    }

    pub fn before_tear_down<F>(self, callback: F) -> Self
    where
        F: Fn(&MockContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback(LifecyclePhase::BeforeTearDown, callback)
    }

    pub fn after_tear_down<F>(self, callback: F) -> Self
    where
        F: Fn(&MockContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.callback(LifecyclePhase::AfterTearDown, callback)
    }

    fn callback<F>(mut self, phase: LifecyclePhase, callback: F) -> Self
    where
        F: Fn(&MockContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.plugins.add_callback(phase, Arc::new(callback));
        self
    }

    /// Service properties of the resource resolver factory registered on set-up.
    pub fn resource_resolver_factory_activator_props(mut self, props: ServiceProperties) -> Self {
        self.resource_resolver_factory_activator_props = props;
        self
    }

    pub fn run_modes<I, S>(mut self, run_modes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run_modes = run_modes.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(self) -> MockContext {
        MockContext::new(
            self.plugins,
            self.resource_resolver_type,
            self.resource_resolver_factory_activator_props,
            self.run_modes,
        )
    }
}
