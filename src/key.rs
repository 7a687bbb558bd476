use alloc::{
    borrow::Cow,
    string::{String, ToString as _},
};
use core::fmt::{self, Display, Formatter};

use crate::{component::Class, Component};

/// Identity of a registration slot.
///
/// Type keys compare by [`core::any::TypeId`], so two types sharing a name never collide.
/// Labels compare by their text.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Key {
    Type(Class),
    Label(Cow<'static, str>),
}

impl Key {
    #[inline]
    #[must_use]
    pub fn of<T: Component>() -> Self {
        Self::Type(Class::of::<T>())
    }

    #[inline]
    #[must_use]
    pub fn label(label: impl Into<Cow<'static, str>>) -> Self {
        Self::Label(label.into())
    }

    /// Canonical string form: the fully qualified type name, or the label itself.
    #[inline]
    #[must_use]
    pub fn normalized(&self) -> Cow<'static, str> {
        match self {
            Self::Type(class) => Cow::Borrowed(class.name()),
            Self::Label(label) => label.clone(),
        }
    }

    #[inline]
    #[must_use]
    pub(crate) fn is_valid(&self) -> bool {
        match self {
            Self::Type(_) => true,
            Self::Label(label) => !label.is_empty(),
        }
    }
}

/// Maps a type-or-label to the canonical string the registry reports for it.
#[inline]
#[must_use]
pub fn normalize(key: impl Into<Key>) -> String {
    key.into().normalized().to_string()
}

impl Display for Key {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized())
    }
}

impl From<Class> for Key {
    fn from(class: Class) -> Self {
        Self::Type(class)
    }
}

impl From<&'static str> for Key {
    fn from(label: &'static str) -> Self {
        Self::Label(Cow::Borrowed(label))
    }
}

impl From<String> for Key {
    fn from(label: String) -> Self {
        Self::Label(Cow::Owned(label))
    }
}

impl From<Cow<'static, str>> for Key {
    fn from(label: Cow<'static, str>) -> Self {
        Self::Label(label)
    }
}

impl From<&Key> for Key {
    fn from(key: &Key) -> Self {
        key.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{normalize, Key};
    use crate::{Class, Component, Registry};

    use alloc::string::ToString as _;

    struct Service;

    impl Component for Service {
        fn construct(_: &Registry) -> Self {
            Self
        }
    }

    mod other {
        use crate::{Component, Registry};

        pub(super) struct Service;

        impl Component for Service {
            fn construct(_: &Registry) -> Self {
                Self
            }
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("label"), "label");
        assert_eq!(normalize(Key::of::<Service>()), Class::of::<Service>().name());
        assert_eq!(Key::label("label").to_string(), "label");
    }

    #[test]
    fn test_same_short_name_distinct() {
        assert_ne!(Key::of::<Service>(), Key::of::<other::Service>());
        assert_ne!(normalize(Key::of::<Service>()), normalize(Key::of::<other::Service>()));
        assert_eq!(Key::of::<Service>(), Key::from(Class::of::<Service>()));
    }

    #[test]
    fn test_validity() {
        assert!(Key::of::<Service>().is_valid());
        assert!(Key::from("a").is_valid());
        assert!(!Key::from("").is_valid());
    }
}
