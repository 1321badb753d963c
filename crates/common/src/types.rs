use std::{
    fmt::{self, Display},
    hash::{Hash, Hasher},
    sync::{Arc, LazyLock},
};

use serde::{Deserialize, Serialize};

/// Name of the type every class ultimately extends.
pub const ROOT_TYPE_NAME: &str = "java.lang.Object";

static ROOT_TYPE: LazyLock<TypeRef> = LazyLock::new(|| {
    Arc::new(TypeDescriptor {
        name: ROOT_TYPE_NAME.to_string(),
        kind: TypeKind::Class,
        interfaces: Vec::new(),
        superclass: None,
    })
});

pub type TypeRef = Arc<TypeDescriptor>;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
}

/// Runtime description of an adaptable or adapter type.
///
/// Adapter lookups walk this structure the way a reflective runtime walks
/// `getInterfaces()` and `getSuperclass()`: directly implemented interfaces
/// first, in declaration order, then the superclass chain. Two descriptors
/// are equal when their fully qualified names are equal.
#[derive(Debug)]
pub struct TypeDescriptor {
    name: String,
    kind: TypeKind,
    interfaces: Vec<TypeRef>,
    superclass: Option<TypeRef>,
}

impl TypeDescriptor {
    /// The root class. Classes built without an explicit superclass extend it.
    pub fn root() -> TypeRef {
        ROOT_TYPE.clone()
    }

    pub fn class(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> TypeBuilder {
        TypeBuilder::new(name.into(), TypeKind::Interface)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    /// Directly implemented (or, for interfaces, directly extended) interfaces.
    pub fn interfaces(&self) -> &[TypeRef] {
        &self.interfaces
    }

    /// Always `None` for interfaces and for the root class.
    pub fn superclass(&self) -> Option<&TypeRef> {
        self.superclass.as_ref()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Builder returned by [`TypeDescriptor::class`] and [`TypeDescriptor::interface`].
#[derive(Debug)]
pub struct TypeBuilder {
    name: String,
    kind: TypeKind,
    interfaces: Vec<TypeRef>,
    superclass: Option<TypeRef>,
}

impl TypeBuilder {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            interfaces: Vec::new(),
            superclass: None,
        }
    }

    pub fn implements(mut self, interface: &TypeRef) -> Self {
        self.interfaces.push(interface.clone());
        self
    }

    /// Sets the superclass of a class. On an interface builder this records
    /// a super-interface instead, since interfaces have no superclass.
    pub fn extends(mut self, parent: &TypeRef) -> Self {
        match self.kind {
            TypeKind::Class => self.superclass = Some(parent.clone()),
            TypeKind::Interface => self.interfaces.push(parent.clone()),
        }
        self
    }

    pub fn build(self) -> TypeRef {
        let superclass = match self.kind {
            TypeKind::Interface => None,
            TypeKind::Class if self.name == ROOT_TYPE_NAME => None,
            TypeKind::Class => Some(self.superclass.unwrap_or_else(TypeDescriptor::root)),
        };
        Arc::new(TypeDescriptor {
            name: self.name,
            kind: self.kind,
            interfaces: self.interfaces,
            superclass,
        })
    }
}
