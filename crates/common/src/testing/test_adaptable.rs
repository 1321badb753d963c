use crate::{Adaptable, TypeRef};

/// Adaptable fixture with a configurable runtime type
#[derive(Clone, Debug)]
pub struct TestAdaptable {
    type_ref: TypeRef,
    pub name: String,
}

impl TestAdaptable {
    pub fn new(type_ref: &TypeRef) -> Self {
        Self::named(type_ref, type_ref.name())
    }

    pub fn named(type_ref: &TypeRef, name: impl Into<String>) -> Self {
        Self {
            type_ref: type_ref.clone(),
            name: name.into(),
        }
    }
}

impl Adaptable for TestAdaptable {
    fn type_descriptor(&self) -> TypeRef {
        self.type_ref.clone()
    }
}
