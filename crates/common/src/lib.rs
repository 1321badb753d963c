mod adaptable;
mod error;
pub mod execution_context;
pub mod logging;
pub mod testing;
mod types;

pub use adaptable::{AdaptedValue, Adaptable, AdapterFactory, AsAny};
pub use error::ServiceError;
pub use execution_context::{
    CapabilityRecord, CapabilityRegistration, ExecutionContext, RegistrationId, ServiceListener,
    ServiceReference, WeakExecutionContext,
};
pub use types::{ROOT_TYPE_NAME, TypeBuilder, TypeDescriptor, TypeKind, TypeRef};
