mod cache;
mod descriptor;
mod error;
mod isolation;
mod manager;
mod registry;

pub use cache::{FactoryMap, ResolutionCache};
pub use descriptor::{FactoryDescriptor, FactoryLocator, ServiceFactoryLocator};
pub use error::IsolationError;
pub use isolation::AdapterManagerHandle;
pub use manager::{ADAPTER_MANAGER_SERVICE, MockAdapterManager};
pub use registry::FactoryRegistry;
