use alloc::{collections::BTreeMap, sync::Arc, vec::Vec};
use core::fmt::{self, Debug, Formatter};
use parking_lot::RwLock;
use tracing::{debug, error, info_span};

use crate::{
    config::Config,
    errors::RegistryErrorKind,
    inject::{Binding, Fallback, Injectable},
    instantiator::Datum,
    key::Key,
    store::{Store, StoreRef},
    Component, Value,
};

type Components = BTreeMap<Key, StoreRef>;

/// Maps keys to their registrations and resolves them on demand.
///
/// The registry is a cheap handle: clones share the same registrations.
/// Producers are called with the registry they are resolved from, so a component can resolve
/// its own dependencies in [`Component::construct`].
///
/// Dependency cycles aren't detected. A singleton that resolves itself while being produced deadlocks.
#[derive(Clone, Default)]
pub struct Registry {
    pub(crate) inner: Arc<RegistryInner>,
}

#[derive(Default)]
pub(crate) struct RegistryInner {
    components: RwLock<Components>,
    auto_register: bool,
}

impl Registry {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry that registers a component with default options
    /// the first time its type key is resolved with [`Self::get`].
    #[inline]
    #[must_use]
    pub fn new_with_auto_register() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                components: RwLock::new(BTreeMap::new()),
                auto_register: true,
            }),
        }
    }

    /// Registers `datum` under `key`, or under the datum itself if it's a class or a text.
    ///
    /// With [`Config::register_in_superclasses`] the registration is also appended to the sub-registrations
    /// of every ancestor of the class. Missing ancestors are registered on the way with the same options,
    /// except the flag itself.
    ///
    /// # Errors
    /// - Returns [`RegistryErrorKind::InvalidKey`] if `key` is an empty label,
    ///   or if `key` is omitted and the datum can't key itself.
    /// - Returns [`RegistryErrorKind::DuplicateKey`] if the key is already registered.
    /// - Returns [`RegistryErrorKind::InvalidOperation`] if registration in superclasses is requested for a datum that isn't a class.
    ///
    /// The registry is left untouched on error.
    pub fn register(&self, datum: impl Into<Datum>, key: Option<Key>, config: Config) -> Result<(), RegistryErrorKind> {
        let datum = datum.into();
        let span = info_span!("register", datum = datum.kind());
        let _guard = span.enter();

        let mut components = self.inner.components.write();
        register(&mut components, datum, key, config).map(drop).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Registers the component `T` under its own type with default options.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::DuplicateKey`] if `T` is already registered.
    #[inline]
    pub fn register_component<T: Component>(&self) -> Result<(), RegistryErrorKind> {
        self.register(Datum::class::<T>(), None, Config::default())
    }

    /// Registers the component `T` under its own type.
    ///
    /// # Errors
    /// See [`Self::register`].
    #[inline]
    pub fn register_component_with_config<T: Component>(&self, config: Config) -> Result<(), RegistryErrorKind> {
        self.register(Datum::class::<T>(), None, config)
    }

    /// Appends `sub_datum` to the sub-registrations of `key`, retrievable with [`Self::get_sub_classes`].
    ///
    /// A class is registered under its own type first, or its existing registration is reused.
    /// Any other datum gets a store that isn't reachable by a key of its own.
    /// If `key` isn't registered yet, it is registered as a datum with the same options.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::InvalidKey`] if `key` is an empty label.
    pub fn append(&self, key: impl Into<Key>, sub_datum: impl Into<Datum>, config: Config) -> Result<(), RegistryErrorKind> {
        let key = key.into();
        let sub_datum = sub_datum.into();
        let span = info_span!("append", %key, datum = sub_datum.kind());
        let _guard = span.enter();

        let mut components = self.inner.components.write();
        append(&mut components, key, sub_datum, config).map_err(|err| {
            error!("{}", err);
            err
        })
    }

    /// Resolves the value registered under `key`.
    ///
    /// Returns `None` if the key isn't registered, it's a valid outcome and not an error.
    #[must_use]
    pub fn get(&self, key: impl Into<Key>) -> Option<Value> {
        let key = key.into();
        let span = info_span!("get", %key);
        let _guard = span.enter();

        let store = self.store_or_auto_register(&key)?;
        Some(store.resolve(self))
    }

    /// Resolves the value registered under `key` as `T`.
    ///
    /// Returns `None` if the key isn't registered or the value isn't a `T`.
    #[must_use]
    pub fn get_as<T: Send + Sync + 'static>(&self, key: impl Into<Key>) -> Option<Arc<T>> {
        let value = self.get(key)?;
        let dependency = value.downcast();
        if dependency.is_none() {
            debug!(actual = value.type_info().name, "Resolved value has another type");
        }
        dependency
    }

    /// Resolves the component `T` registered under its own type.
    #[inline]
    #[must_use]
    pub fn resolve<T: Component>(&self) -> Option<Arc<T>> {
        self.get_as(Key::of::<T>())
    }

    /// Resolves every sub-registration of `key` in the order they were added.
    ///
    /// Singleton entries yield the same values on every call, transient ones fresh values.
    /// Returns `None` if the key isn't registered or nothing was ever appended to it.
    #[must_use]
    pub fn get_sub_classes(&self, key: impl Into<Key>) -> Option<Vec<Value>> {
        let key = key.into();
        let span = info_span!("get_sub_classes", %key);
        let _guard = span.enter();

        let values = self.store(&key)?.resolve_sub_entries(self);
        if values.is_empty() {
            debug!("No sub-registrations");
            return None;
        }

        debug!(len = values.len(), "Resolved sub-registrations");
        Some(values)
    }

    /// Replaces the datum of an existing registration, keeping its options unless new ones are passed.
    ///
    /// The cached value is dropped. The registration stays linked wherever it was appended,
    /// so sub-registration lists now yield the new value in the same position.
    ///
    /// # Errors
    /// Returns [`RegistryErrorKind::NotRegistered`] if the key isn't registered.
    pub fn replace(&self, key: impl Into<Key>, datum: impl Into<Datum>, config: Option<Config>) -> Result<(), RegistryErrorKind> {
        let key = key.into();
        let span = info_span!("replace", %key);
        let _guard = span.enter();

        let Some(store) = self.store(&key) else {
            let err = RegistryErrorKind::NotRegistered {
                key: key.normalized().into_owned(),
            };
            error!("{}", err);
            return Err(err);
        };
        store.replace(datum.into(), config);

        debug!("Replaced");
        Ok(())
    }

    /// Removes the registration of `key` and returns whether there was one.
    ///
    /// Sub-registration lists holding it keep resolving it.
    pub fn remove(&self, key: impl Into<Key>) -> bool {
        let key = key.into();
        let removed = self.inner.components.write().remove(&key).is_some();

        debug!(%key, removed, "Remove");
        removed
    }

    /// Removes every registration. Values resolved before stay valid.
    pub fn clear(&self) {
        self.inner.components.write().clear();

        debug!("Cleared");
    }

    #[inline]
    #[must_use]
    pub fn has(&self, key: impl Into<Key>) -> bool {
        self.inner.components.read().contains_key(&key.into())
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.components.read().len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.components.read().is_empty()
    }

    /// Binds every injected field of `target` to this registry.
    #[inline]
    pub fn inject<T: Injectable + ?Sized>(&self, target: &T) {
        target.bind(&Binding::new(self.clone()));
    }

    /// Binds every injected field of `target` to this registry.
    /// `fallback` is consulted with the normalized key when a field's key isn't registered.
    #[inline]
    pub fn inject_with_fallback<T: Injectable + ?Sized>(&self, target: &T, fallback: Fallback) {
        target.bind(&Binding::new(self.clone()).with_fallback(fallback));
    }
}

impl Registry {
    #[inline]
    fn store(&self, key: &Key) -> Option<StoreRef> {
        let store = self.inner.components.read().get(key).cloned();
        if store.is_none() {
            debug!("Not registered");
        }
        store
    }

    fn store_or_auto_register(&self, key: &Key) -> Option<StoreRef> {
        if let Some(store) = self.store(key) {
            return Some(store);
        }

        let Key::Type(class) = key else {
            return None;
        };
        if !self.inner.auto_register {
            return None;
        }

        let mut components = self.inner.components.write();
        // Someone could register it between the locks
        if let Some(store) = components.get(key) {
            return Some(store.clone());
        }

        debug!("Auto registration");
        register(&mut components, Datum::Class(*class), None, Config::default()).ok()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("keys", &self.inner.components.read().keys().collect::<Vec<_>>())
            .field("auto_register", &self.inner.auto_register)
            .finish()
    }
}

fn register(components: &mut Components, datum: Datum, key: Option<Key>, config: Config) -> Result<StoreRef, RegistryErrorKind> {
    let key = match key.or_else(|| datum.self_key()) {
        Some(key) if key.is_valid() => key,
        _ => return Err(RegistryErrorKind::InvalidKey),
    };
    if components.contains_key(&key) {
        return Err(RegistryErrorKind::DuplicateKey {
            key: key.normalized().into_owned(),
        });
    }

    let class = if config.register_in_superclasses {
        let Some(class) = datum.as_class() else {
            return Err(RegistryErrorKind::InvalidOperation { datum: datum.kind() });
        };
        Some(class)
    } else {
        None
    };

    let store = Store::new(datum, config);
    components.insert(key.clone(), store.clone());
    debug!(%key, "Registered");

    if let Some(class) = class {
        let config = config.propagated();
        for ancestor in class.ancestors() {
            link(components, Key::Type(ancestor), config, store.clone())?;
        }
    }

    Ok(store)
}

fn append(components: &mut Components, key: Key, sub_datum: Datum, config: Config) -> Result<(), RegistryErrorKind> {
    if !key.is_valid() {
        return Err(RegistryErrorKind::InvalidKey);
    }

    let store = match sub_datum.as_class() {
        Some(class) => match components.get(&Key::Type(class)) {
            Some(store) => store.clone(),
            None => register(components, sub_datum, None, config)?,
        },
        None => Store::new(sub_datum, config),
    };

    link(components, key, config.propagated(), store)
}

/// Appends `store` to the sub-registrations of `key`, registering `key` as a datum if it's missing.
fn link(components: &mut Components, key: Key, config: Config, store: StoreRef) -> Result<(), RegistryErrorKind> {
    let parent = match components.get(&key) {
        Some(parent) => parent.clone(),
        None => register(components, Datum::from(key.clone()), Some(key.clone()), config)?,
    };
    parent.push_sub_entry(store);

    debug!(%key, "Linked sub-registration");
    Ok(())
}
