use alloc::{sync::Arc, vec::Vec};
use core::fmt::{self, Debug, Formatter};
use parking_lot::Mutex;
use tracing::debug;

use crate::{key::Key, Component, Registry, Value};

/// Called with the normalized key when a field's key isn't registered.
pub type Fallback = Arc<dyn Fn(&str) -> Option<Value> + Send + Sync>;

/// Registry (and optional fallback) an injected field resolves from.
#[derive(Clone)]
pub struct Binding {
    registry: Registry,
    fallback: Option<Fallback>,
}

impl Binding {
    #[inline]
    #[must_use]
    pub fn new(registry: Registry) -> Self {
        Self { registry, fallback: None }
    }

    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn resolve(&self, key: &Key, fallback: Option<&Fallback>) -> Option<Value> {
        if let Some(value) = self.registry.get(key) {
            return Some(value);
        }

        let fallback = fallback.or(self.fallback.as_ref())?;
        let value = fallback(&key.normalized());
        debug!(%key, found = value.is_some(), "Fallback called");
        value
    }
}

impl Debug for Binding {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("registry", &self.registry)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

/// A type with injected fields.
///
/// Implementors forward the binding to each of their [`Inject`] and [`InjectAll`] fields:
///
/// ```rust
/// use ioctx::{Binding, Inject, Injectable};
///
/// struct Handler {
///     greeting: Inject<String>,
/// }
///
/// impl Injectable for Handler {
///     fn bind(&self, binding: &Binding) {
///         self.greeting.bind(binding);
///     }
/// }
/// ```
pub trait Injectable {
    fn bind(&self, binding: &Binding);
}

enum Slot<V> {
    Empty,
    Resolved(V),
    Assigned(V),
}

/// Resolution state shared by [`Inject`] and [`InjectAll`].
struct Field<V> {
    key: Key,
    always: bool,
    default: Option<V>,
    binding: Mutex<Option<Binding>>,
    slot: Mutex<Slot<V>>,
}

impl<V: Clone> Field<V> {
    fn new(key: Key) -> Self {
        Self {
            key,
            always: false,
            default: None,
            binding: Mutex::new(None),
            slot: Mutex::new(Slot::Empty),
        }
    }

    fn binding(&self) -> Option<Binding> {
        let binding = self.binding.lock().clone();
        binding.or_else(default_binding)
    }

    fn get(&self, resolve: impl FnOnce(&Binding, &Key) -> Option<V>) -> Option<V> {
        match &*self.slot.lock() {
            Slot::Assigned(value) => return Some(value.clone()),
            Slot::Resolved(value) if !self.always => return Some(value.clone()),
            _ => {}
        }

        // Resolved without the slot lock held, the producer may read other fields
        let value = match self.binding() {
            Some(binding) => resolve(&binding, &self.key),
            None => {
                debug!(key = %self.key, "No registry bound");
                None
            }
        };
        let Some(value) = value else {
            return self.default.clone();
        };

        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Assigned(current) => return Some(current.clone()),
            // A concurrent first access cached its value already
            Slot::Resolved(current) if !self.always => return Some(current.clone()),
            _ => {}
        }
        if !self.always {
            *slot = Slot::Resolved(value.clone());
        }
        Some(value)
    }

    fn set(&self, value: V) {
        *self.slot.lock() = Slot::Assigned(value);
    }

    fn reset(&self) {
        *self.slot.lock() = Slot::Empty;
    }

    fn is_assigned(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Assigned(_))
    }
}

#[cfg(feature = "std")]
fn default_binding() -> Option<Binding> {
    Some(Binding::new(crate::global().clone()))
}

#[cfg(not(feature = "std"))]
fn default_binding() -> Option<Binding> {
    None
}

/// A field resolving a single `T` from a registry on access.
///
/// The value is resolved on first [`Inject::get`] and cached, or resolved on every access with [`Inject::always`].
/// Until bound with [`Injectable::bind`] or [`Inject::with_registry`], the field resolves from [`crate::global`].
///
/// A value assigned with [`Inject::set`] wins over resolution until [`Inject::reset`].
/// A default set with [`Inject::with_default`] is returned while nothing resolves, it is never cached.
pub struct Inject<T> {
    field: Field<Arc<T>>,
    fallback: Option<Fallback>,
}

impl<T: Send + Sync + 'static> Inject<T> {
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            field: Field::new(key.into()),
            fallback: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn always(mut self) -> Self {
        self.field.always = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_registry(self, registry: Registry) -> Self {
        self.bind(&Binding::new(registry));
        self
    }

    #[inline]
    #[must_use]
    pub fn with_default(mut self, value: impl Into<Arc<T>>) -> Self {
        self.field.default = Some(value.into());
        self
    }

    /// Sets a fallback for this field only. It takes precedence over the fallback of the binding.
    #[inline]
    #[must_use]
    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.field.key
    }

    pub fn bind(&self, binding: &Binding) {
        *self.field.binding.lock() = Some(binding.clone());
    }

    /// Returns the assigned or resolved value.
    ///
    /// The default, or `None` without one, if nothing is registered under the key,
    /// no fallback supplies a value, or the value isn't a `T`. Nothing is cached in that case.
    #[must_use]
    pub fn get(&self) -> Option<Arc<T>> {
        self.field.get(|binding, key| {
            let value = binding.resolve(key, self.fallback.as_ref())?;
            let dependency = value.downcast();
            if dependency.is_none() {
                debug!(%key, actual = value.type_info().name, "Injected value has another type");
            }
            dependency
        })
    }

    /// Assigns the field directly. Automatic resolution stops until [`Self::reset`].
    #[inline]
    pub fn set(&self, value: impl Into<Arc<T>>) {
        self.field.set(value.into());
    }

    /// Forgets an assigned or cached value, the next access resolves again.
    #[inline]
    pub fn reset(&self) {
        self.field.reset();
    }

    #[inline]
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.field.is_assigned()
    }
}

impl<T: Component> Inject<T> {
    #[inline]
    #[must_use]
    pub fn of() -> Self {
        Self::new(Key::of::<T>())
    }
}

impl<T> Debug for Inject<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("key", &self.field.key)
            .field("always", &self.field.always)
            .finish_non_exhaustive()
    }
}

/// A field resolving every sub-registration of a key, see [`Registry::get_sub_classes`].
///
/// Caching and assignment follow the same rules as [`Inject`].
pub struct InjectAll {
    field: Field<Vec<Value>>,
}

impl InjectAll {
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<Key>) -> Self {
        Self {
            field: Field::new(key.into()),
        }
    }

    #[inline]
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::new(Key::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn always(mut self) -> Self {
        self.field.always = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_registry(self, registry: Registry) -> Self {
        self.bind(&Binding::new(registry));
        self
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> &Key {
        &self.field.key
    }

    pub fn bind(&self, binding: &Binding) {
        *self.field.binding.lock() = Some(binding.clone());
    }

    #[must_use]
    pub fn get(&self) -> Option<Vec<Value>> {
        self.field.get(|binding, key| binding.registry().get_sub_classes(key))
    }

    #[inline]
    pub fn set(&self, values: Vec<Value>) {
        self.field.set(values);
    }

    #[inline]
    pub fn reset(&self) {
        self.field.reset();
    }

    #[inline]
    #[must_use]
    pub fn is_assigned(&self) -> bool {
        self.field.is_assigned()
    }
}

impl Debug for InjectAll {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectAll")
            .field("key", &self.field.key)
            .field("always", &self.field.always)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::{Binding, Fallback, Inject, InjectAll, Injectable};
    use crate::{normalize, Class, Component, Config, Datum, Key, Registry, Value};

    use alloc::{
        format,
        string::{String, ToString as _},
        sync::Arc,
    };
    use core::sync::atomic::{AtomicU8, Ordering};
    use std::{sync::Barrier, thread};
    use tracing_test::traced_test;

    struct Service;

    impl Component for Service {
        fn construct(_: &Registry) -> Self {
            Self
        }
    }

    struct Plugin;

    impl Component for Plugin {
        fn construct(_: &Registry) -> Self {
            Self
        }

        fn superclass() -> Option<Class> {
            Some(Class::of::<Service>())
        }
    }

    struct Handler {
        service: Inject<Service>,
        service_always: Inject<Service>,
        plugins: InjectAll,
    }

    impl Handler {
        fn new() -> Self {
            Self {
                service: Inject::of(),
                service_always: Inject::<Service>::of().always(),
                plugins: InjectAll::of::<Service>(),
            }
        }
    }

    impl Injectable for Handler {
        fn bind(&self, binding: &Binding) {
            self.service.bind(binding);
            self.service_always.bind(binding);
            self.plugins.bind(binding);
        }
    }

    #[test]
    #[traced_test]
    fn test_inject_resolve_once() {
        let registry = Registry::new();
        registry.register_component_with_config::<Service>(Config::transient()).unwrap();

        let handler = Handler::new();
        registry.inject(&handler);

        let service_1 = handler.service.get().unwrap();
        let service_2 = handler.service.get().unwrap();
        let service_3 = handler.service_always.get().unwrap();
        let service_4 = handler.service_always.get().unwrap();

        assert!(Arc::ptr_eq(&service_1, &service_2));
        assert!(!Arc::ptr_eq(&service_3, &service_4));
    }

    #[test]
    #[traced_test]
    fn test_inject_resolve_once_concurrent() {
        let barrier = Arc::new(Barrier::new(2));
        let registry = Registry::new();
        registry
            .register(
                Datum::factory({
                    let barrier = barrier.clone();
                    move |_: &Registry| {
                        barrier.wait();
                        Service
                    }
                }),
                Some(Key::of::<Service>()),
                Config::transient(),
            )
            .unwrap();
        let service = Inject::<Service>::of().with_registry(registry);

        let (service_1, service_2) = thread::scope(|scope| {
            let handle_1 = scope.spawn(|| service.get());
            let handle_2 = scope.spawn(|| service.get());
            (handle_1.join().unwrap().unwrap(), handle_2.join().unwrap().unwrap())
        });

        assert!(Arc::ptr_eq(&service_1, &service_2));
        assert!(Arc::ptr_eq(&service_1, &service.get().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_inject_once_after_remove() {
        let registry = Registry::new();
        registry.register_component::<Service>().unwrap();
        let service = Inject::<Service>::of().with_registry(registry.clone());

        let resolved = service.get().unwrap();
        assert!(registry.remove(Key::of::<Service>()));

        assert!(Arc::ptr_eq(&service.get().unwrap(), &resolved));
    }

    #[test]
    #[traced_test]
    fn test_inject_always_after_remove() {
        let registry = Registry::new();
        registry.register_component::<Service>().unwrap();
        let service = Inject::<Service>::of().always().with_registry(registry.clone());

        assert!(service.get().is_some());
        assert!(registry.remove(Key::of::<Service>()));

        assert!(service.get().is_none());
    }

    #[test]
    #[traced_test]
    fn test_inject_default() {
        let registry = Registry::new();
        let default = Arc::new(Service);
        let service = Inject::<Service>::of()
            .with_default(default.clone())
            .with_registry(registry.clone());

        assert!(Arc::ptr_eq(&service.get().unwrap(), &default));
        assert!(!service.is_assigned());

        registry.register_component::<Service>().unwrap();
        let resolved = service.get().unwrap();

        assert!(!Arc::ptr_eq(&resolved, &default));
        assert!(Arc::ptr_eq(&resolved, &registry.resolve::<Service>().unwrap()));

        let assigned = Arc::new(Service);
        service.set(assigned.clone());

        assert!(Arc::ptr_eq(&service.get().unwrap(), &assigned));
    }

    #[test]
    #[traced_test]
    fn test_inject_missing_then_registered() {
        let registry = Registry::new();
        let service = Inject::<Service>::of().with_registry(registry.clone());

        assert!(service.get().is_none());
        assert!(!service.is_assigned());

        registry.register_component::<Service>().unwrap();

        assert!(service.get().is_some());
    }

    #[test]
    #[traced_test]
    fn test_inject_set_and_reset() {
        let registry = Registry::new();
        registry.register_component::<Service>().unwrap();
        let service = Inject::<Service>::of().always().with_registry(registry.clone());

        let assigned = Arc::new(Service);
        service.set(assigned.clone());

        assert!(service.is_assigned());
        assert!(Arc::ptr_eq(&service.get().unwrap(), &assigned));
        assert!(Arc::ptr_eq(&service.get().unwrap(), &assigned));

        service.reset();

        let resolved = service.get().unwrap();
        assert!(!Arc::ptr_eq(&resolved, &assigned));
        assert!(Arc::ptr_eq(&resolved, &registry.resolve::<Service>().unwrap()));
    }

    #[test]
    #[traced_test]
    fn test_inject_fallback() {
        let call_count = Arc::new(AtomicU8::new(0));
        let registry = Registry::new();
        let fallback: Fallback = Arc::new({
            let call_count = call_count.clone();
            move |key: &str| {
                call_count.fetch_add(1, Ordering::SeqCst);
                (key == normalize(Key::of::<Service>())).then(|| Value::new(Service))
            }
        });

        let handler = Handler::new();
        registry.inject_with_fallback(&handler, fallback);

        let service_1 = handler.service.get().unwrap();
        let service_2 = handler.service.get().unwrap();

        assert!(Arc::ptr_eq(&service_1, &service_2));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert!(handler.plugins.get().is_none());

        registry.register_component::<Service>().unwrap();
        let service = handler.service_always.get().unwrap();

        assert!(Arc::ptr_eq(&service, &registry.resolve::<Service>().unwrap()));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[traced_test]
    fn test_field_fallback_precedence() {
        let registry = Registry::new();
        let binding = Binding::new(registry).with_fallback(Arc::new(|_: &str| Some(Value::new(String::from("binding")))));

        let label = Inject::<String>::new("label").with_fallback(Arc::new(|_: &str| Some(Value::new(String::from("field")))));
        label.bind(&binding);
        let other = Inject::<String>::new("other");
        other.bind(&binding);

        assert_eq!(label.get().as_deref().map(String::as_str), Some("field"));
        assert_eq!(other.get().as_deref().map(String::as_str), Some("binding"));
    }

    #[test]
    #[traced_test]
    fn test_inject_other_type() {
        let registry = Registry::new();
        registry.register(Datum::class::<Plugin>(), Some(Key::of::<Service>()), Config::default()).unwrap();

        let service = Inject::<Service>::of().with_registry(registry.clone());
        let plugin = Inject::<Plugin>::new(Key::of::<Service>()).with_registry(registry);

        assert!(service.get().is_none());
        assert!(plugin.get().is_some());
    }

    #[test]
    #[traced_test]
    fn test_inject_all() {
        let registry = Registry::new();
        registry
            .register_component_with_config::<Plugin>(Config::default().with_register_in_superclasses(true))
            .unwrap();

        let handler = Handler::new();
        registry.inject(&handler);

        let plugins = handler.plugins.get().unwrap();
        assert_eq!(plugins.len(), 1);
        assert!(plugins[0].is::<Plugin>());

        handler.plugins.set(alloc::vec![]);
        assert!(handler.plugins.get().unwrap().is_empty());
    }
}
