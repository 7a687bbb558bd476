use alloc::vec::Vec;
use core::{
    cmp::Ordering,
    fmt::{self, Debug, Formatter},
};

use crate::{any::TypeInfo, Registry, Value};

/// A type the registry knows how to construct.
///
/// `superclass` describes the type this one is registered "under" when
/// [`crate::Config::register_in_superclasses`] is set. Rust has no inheritance, so the chain is
/// declared explicitly and usually mirrors a trait or wrapper relationship.
///
/// ```rust
/// use ioctx::{Class, Component, Registry};
///
/// struct Storage;
///
/// impl Component for Storage {
///     fn construct(_: &Registry) -> Self {
///         Self
///     }
/// }
///
/// struct DiskStorage;
///
/// impl Component for DiskStorage {
///     fn construct(_: &Registry) -> Self {
///         Self
///     }
///
///     fn superclass() -> Option<Class> {
///         Some(Class::of::<Storage>())
///     }
/// }
/// ```
pub trait Component: Send + Sync + Sized + 'static {
    fn construct(registry: &Registry) -> Self;

    #[inline]
    #[must_use]
    fn superclass() -> Option<Class> {
        None
    }
}

/// Descriptor of a [`Component`] type: its identity, erased constructor and direct ancestor.
#[derive(Clone, Copy)]
pub struct Class {
    type_info: TypeInfo,
    construct: fn(&Registry) -> Value,
    superclass: fn() -> Option<Class>,
}

impl Class {
    #[inline]
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self {
            type_info: TypeInfo::of::<T>(),
            construct: |registry: &Registry| Value::new(T::construct(registry)),
            superclass: T::superclass,
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.type_info.name
    }

    #[inline]
    #[must_use]
    pub fn superclass(&self) -> Option<Class> {
        (self.superclass)()
    }

    /// Ancestor chain, nearest first. The root type isn't included.
    #[must_use]
    pub fn ancestors(&self) -> Vec<Class> {
        let mut ancestors = Vec::new();
        let mut current = self.superclass();
        while let Some(class) = current {
            // A chain that loops back would never terminate
            if class == *self || ancestors.contains(&class) {
                break;
            }
            current = class.superclass();
            ancestors.push(class);
        }
        ancestors
    }

    #[inline]
    #[must_use]
    pub(crate) fn construct(&self, registry: &Registry) -> Value {
        (self.construct)(registry)
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.type_info == other.type_info
    }
}

impl Eq for Class {}

impl PartialOrd for Class {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Class {
    fn cmp(&self, other: &Self) -> Ordering {
        self.type_info.cmp(&other.type_info)
    }
}

impl Debug for Class {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Class").field(&self.type_info.name).finish()
    }
}
