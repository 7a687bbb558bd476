use alloc::{borrow::Cow, string::String, sync::Arc};
use core::fmt::{self, Debug, Formatter};
use tracing::debug;

use crate::{component::Class, config::Config, key::Key, Component, Registry, Value};

type BoxedFactory = Arc<dyn Fn(&Registry) -> Value + Send + Sync>;

/// A user function producing a value from the registry.
#[derive(Clone)]
pub struct Factory(BoxedFactory);

impl Factory {
    #[inline]
    #[must_use]
    pub fn new<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        Self(Arc::new(move |registry: &Registry| Value::new(factory(registry))))
    }

    #[inline]
    #[must_use]
    pub fn call(&self, registry: &Registry) -> Value {
        (self.0)(registry)
    }
}

impl Debug for Factory {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("Factory")
    }
}

/// What is registered and how it turns into a value.
///
/// The variant is the producer kind: construct, invoke or return as-is.
#[derive(Debug, Clone)]
pub enum Datum {
    /// Constructed with the registry when [`Config::auto_new`] is set, otherwise the [`Class`] itself is the value.
    Class(Class),
    /// Invoked with the registry when [`Config::auto_new`] is set, otherwise the [`Factory`] itself is the value.
    Factory(Factory),
    /// Returned as-is.
    Literal(Value),
    /// A string returned as-is. It can also key its own registration.
    Text(Cow<'static, str>),
}

impl Datum {
    #[inline]
    #[must_use]
    pub fn class<T: Component>() -> Self {
        Self::Class(Class::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&Registry) -> T + Send + Sync + 'static,
    {
        Self::Factory(Factory::new(factory))
    }

    #[inline]
    #[must_use]
    pub fn literal<T: Send + Sync + 'static>(value: T) -> Self {
        Self::Literal(Value::new(value))
    }

    #[inline]
    #[must_use]
    pub fn text(text: impl Into<Cow<'static, str>>) -> Self {
        Self::Text(text.into())
    }

    /// Key the datum provides for itself, if it can key a registration.
    #[must_use]
    pub fn self_key(&self) -> Option<Key> {
        match self {
            Self::Class(class) => Some(Key::Type(*class)),
            Self::Text(text) => Some(Key::Label(text.clone())),
            Self::Factory(_) | Self::Literal(_) => None,
        }
    }

    #[inline]
    #[must_use]
    pub(crate) const fn kind(&self) -> &'static str {
        match self {
            Self::Class(_) => "class",
            Self::Factory(_) => "factory",
            Self::Literal(_) => "literal",
            Self::Text(_) => "text",
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn as_class(&self) -> Option<Class> {
        match self {
            Self::Class(class) => Some(*class),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Self::Class(class) => Value::new(class),
            Self::Factory(factory) => Value::new(factory),
            Self::Literal(value) => value,
            Self::Text(text) => Value::new(String::from(text)),
        }
    }
}

impl From<Class> for Datum {
    fn from(class: Class) -> Self {
        Self::Class(class)
    }
}

impl From<Factory> for Datum {
    fn from(factory: Factory) -> Self {
        Self::Factory(factory)
    }
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&'static str> for Datum {
    fn from(text: &'static str) -> Self {
        Self::Text(Cow::Borrowed(text))
    }
}

impl From<String> for Datum {
    fn from(text: String) -> Self {
        Self::Text(Cow::Owned(text))
    }
}

impl From<Key> for Datum {
    fn from(key: Key) -> Self {
        match key {
            Key::Type(class) => Self::Class(class),
            Key::Label(label) => Self::Text(label),
        }
    }
}

/// Zero-argument (apart from the owning registry) thunk of a store.
///
/// Whether it constructs, invokes or returns the datum is decided once, when it's built.
#[derive(Clone)]
pub(crate) struct Producer(BoxedFactory);

impl Producer {
    #[must_use]
    pub(crate) fn new(datum: Datum, config: &Config) -> Self {
        match datum {
            Datum::Class(class) if config.auto_new => Self(Arc::new(move |registry: &Registry| {
                let value = class.construct(registry);
                debug!(class = class.name(), "Constructed");
                value
            })),
            Datum::Factory(factory) if config.auto_new => Self(Arc::new(move |registry: &Registry| {
                let value = factory.call(registry);
                debug!(provides = value.type_info().name, "Factory invoked");
                value
            })),
            datum => {
                let value = datum.into_value();
                Self(Arc::new(move |_: &Registry| value.clone()))
            }
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn produce(&self, registry: &Registry) -> Value {
        (self.0)(registry)
    }
}
