use std::{
    fmt::{self, Display},
    sync::Arc,
};

use crate::{context::MockContext, error::ContextError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    BeforeSetUp,
    AfterSetUp,
    BeforeTearDown,
    AfterTearDown,
}

impl Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecyclePhase::BeforeSetUp => "before-set-up",
            LifecyclePhase::AfterSetUp => "after-set-up",
            LifecyclePhase::BeforeTearDown => "before-tear-down",
            LifecyclePhase::AfterTearDown => "after-tear-down",
        };
        f.write_str(name)
    }
}

/// Hooks into the set-up and tear-down of a [`MockContext`].
///
/// All hooks default to doing nothing.
pub trait ContextPlugin: Send + Sync {
    fn before_set_up(&self, _context: &MockContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_set_up(&self, _context: &MockContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn before_tear_down(&self, _context: &MockContext) -> anyhow::Result<()> {
        Ok(())
    }

    fn after_tear_down(&self, _context: &MockContext) -> anyhow::Result<()> {
        Ok(())
    }
}

pub type ContextCallback = Arc<dyn Fn(&MockContext) -> anyhow::Result<()> + Send + Sync>;

/// A single callback bound to one phase.
struct CallbackPlugin {
    phase: LifecyclePhase,
    callback: ContextCallback,
}

impl CallbackPlugin {
    fn run_in(&self, phase: LifecyclePhase, context: &MockContext) -> anyhow::Result<()> {
        if self.phase == phase {
            (self.callback)(context)
        } else {
            Ok(())
        }
    }
}

impl ContextPlugin for CallbackPlugin {
    fn before_set_up(&self, context: &MockContext) -> anyhow::Result<()> {
        self.run_in(LifecyclePhase::BeforeSetUp, context)
    }

    fn after_set_up(&self, context: &MockContext) -> anyhow::Result<()> {
        self.run_in(LifecyclePhase::AfterSetUp, context)
    }

    fn before_tear_down(&self, context: &MockContext) -> anyhow::Result<()> {
        self.run_in(LifecyclePhase::BeforeTearDown, context)
    }

    fn after_tear_down(&self, context: &MockContext) -> anyhow::Result<()> {
        self.run_in(LifecyclePhase::AfterTearDown, context)
    }
}

/// Plugins and callbacks in the order they were added.
#[derive(Clone, Default)]
pub struct ContextPlugins {
    plugins: Vec<Arc<dyn ContextPlugin>>,
}

impl ContextPlugins {
    pub fn add_plugin(&mut self, plugin: Arc<dyn ContextPlugin>) {
        self.plugins.push(plugin);
    }

    pub fn add_callback(&mut self, phase: LifecyclePhase, callback: ContextCallback) {
        self.plugins.push(Arc::new(CallbackPlugin { phase, callback }));
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs `phase` on every plugin, stopping at the first failure.
    pub fn execute(
        &self,
        phase: LifecyclePhase,
        context: &MockContext,
    ) -> Result<(), ContextError> {
        for plugin in &self.plugins {
            let result = match phase {
                LifecyclePhase::BeforeSetUp => plugin.before_set_up(context),
                LifecyclePhase::AfterSetUp => plugin.after_set_up(context),
                LifecyclePhase::BeforeTearDown => plugin.before_tear_down(context),
                LifecyclePhase::AfterTearDown => plugin.after_tear_down(context),
            };
            result.map_err(|error| ContextError::Callback { phase, error })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ContextPlugins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextPlugins")
            .field("plugins", &self.plugins.len())
            .finish()
    }
}
