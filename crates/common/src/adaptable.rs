use std::{any::Any, sync::Arc};

use crate::types::{TypeDescriptor, TypeRef};

/// Result of a successful adaption. Callers downcast to the concrete adapter type.
pub type AdaptedValue = Arc<dyn Any + Send + Sync>;

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// An object that can be handed to the adapter manager.
pub trait Adaptable: AsAny + Send + Sync {
    /// Runtime type used to look up adapter factories.
    fn type_descriptor(&self) -> TypeRef;
}

impl<'a> dyn Adaptable + 'a {
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }
}

/// Converts adaptables into instances of a target type.
///
/// Returning `None` means "not this factory"; the manager then tries the next
/// registered candidate.
pub trait AdapterFactory: Send + Sync {
    fn get_adapter(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Option<AdaptedValue>;
}

impl<F> AdapterFactory for F
where
    F: Fn(&dyn Adaptable, &TypeDescriptor) -> Option<AdaptedValue> + Send + Sync,
{
    fn get_adapter(
        &self,
        adaptable: &dyn Adaptable,
        target: &TypeDescriptor,
    ) -> Option<AdaptedValue> {
        self(adaptable, target)
    }
}
