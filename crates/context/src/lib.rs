mod builder;
mod config;
mod context;
mod error;
mod lifecycle;
mod resolver_type;
mod resource;
mod settings;
mod unique_root;

pub use builder::ContextBuilder;
pub use config::ContextConfig;
pub use context::{MockContext, RESOURCE_RESOLVER_FACTORY_SERVICE};
pub use error::{ContextError, ResourceError, SettingsError};
pub use lifecycle::{ContextCallback, ContextPlugin, ContextPlugins, LifecyclePhase};
pub use resolver_type::ResourceResolverType;
pub use resource::{InMemoryResourceStore, Resource, ResourceStore};
pub use settings::{MockSettingService, SETTINGS_SERVICE};
pub use unique_root::{ORDERED_FOLDER, UniqueRoot};
