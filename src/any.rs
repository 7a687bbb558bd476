use alloc::sync::Arc;
use core::{
    any::{type_name, Any, TypeId},
    cmp::Ordering,
    fmt::{self, Debug, Formatter},
};

#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    pub name: &'static str,
    pub id: TypeId,
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl TypeInfo {
    #[inline]
    #[must_use]
    pub fn of<T>() -> Self
    where
        T: ?Sized + 'static,
    {
        Self {
            name: type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn short_name(&self) -> &'static str {
        self.name.rsplit_once("::").map_or(self.name, |(_, name)| name)
    }
}

/// A resolved, type-erased value shared between the registry and its callers.
///
/// Cloning is cheap and keeps the identity: two clones are [`Value::ptr_eq`].
#[derive(Clone)]
pub struct Value {
    inner: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
}

impl Value {
    #[inline]
    #[must_use]
    pub fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    #[inline]
    #[must_use]
    pub fn from_arc<T: Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            inner: value,
            type_info: TypeInfo::of::<T>(),
        }
    }

    #[inline]
    #[must_use]
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    #[inline]
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Returns the shared value if it holds a `T`.
    #[inline]
    #[must_use]
    pub fn downcast<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.inner.clone().downcast().ok()
    }

    #[inline]
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Identity comparison, not value equality.
    #[inline]
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value").field("type", &self.type_info.name).finish_non_exhaustive()
    }
}
